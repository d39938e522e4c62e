use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::role::Role;
use crate::{entities::user, types::RoleName};

/// Public view of an account. The password hash never leaves the db crate
/// except through [`User::find_credentials_by_email`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: RoleName,
    pub team_leader_id: Option<i64>,
    pub is_active: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

impl User {
    fn from_model(model: user::Model, roles: &HashMap<i64, RoleName>) -> Result<Self, DbErr> {
        let role_name = roles
            .get(&model.role_id)
            .copied()
            .ok_or(DbErr::RecordNotFound("Role not found".to_string()))?;
        Ok(Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role_id: model.role_id,
            role_name,
            team_leader_id: model.team_leader_id,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<user::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let roles = Role::name_map(db).await?;
        models
            .into_iter()
            .map(|model| Self::from_model(model, &roles))
            .collect()
    }

    async fn from_single<C: ConnectionTrait>(db: &C, model: user::Model) -> Result<Self, DbErr> {
        let roles = Role::name_map(db).await?;
        Self::from_model(model, &roles)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        match user::Entity::find_by_id(id).one(db).await? {
            Some(model) => Ok(Some(Self::from_single(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_credentials_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<UserCredentials>, DbErr> {
        let Some(model) = user::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        let password_hash = model.password_hash.clone();
        let user = Self::from_single(db, model).await?;
        Ok(Some(UserCredentials {
            user,
            password_hash,
        }))
    }

    pub async fn find_credentials_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<UserCredentials>, DbErr> {
        let Some(model) = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        let password_hash = model.password_hash.clone();
        let user = Self::from_single(db, model).await?;
        Ok(Some(UserCredentials {
            user,
            password_hash,
        }))
    }

    pub async fn email_exists<C: ConnectionTrait>(db: &C, email: &str) -> Result<bool, DbErr> {
        let id: Option<i64> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Email.eq(email))
            .into_tuple()
            .one(db)
            .await?;
        Ok(id.is_some())
    }

    /// Newest accounts first.
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    pub async fn find_by_team_leader<C: ConnectionTrait>(
        db: &C,
        team_leader_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .filter(user::Column::TeamLeaderId.eq(team_leader_id))
            .order_by_asc(user::Column::Name)
            .order_by_asc(user::Column::Id)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    /// Users holding `role_id` that no team leader has claimed yet.
    pub async fn find_unclaimed_with_role<C: ConnectionTrait>(
        db: &C,
        role_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .filter(user::Column::RoleId.eq(role_id))
            .filter(user::Column::TeamLeaderId.is_null())
            .order_by_asc(user::Column::Name)
            .order_by_asc(user::Column::Id)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    pub async fn names_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashMap<i64, String>, DbErr> {
        let ids: Vec<i64> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .column(user::Column::Name)
            .filter(user::Column::Id.is_in(ids))
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateUser) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = user::ActiveModel {
            name: Set(data.name.clone()),
            email: Set(data.email.clone()),
            password_hash: Set(data.password_hash.clone()),
            role_id: Set(data.role_id),
            team_leader_id: Set(None),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::from_single(db, model).await
    }

    async fn load_active_model<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<user::ActiveModel, DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(record.into())
    }

    async fn save<C: ConnectionTrait>(
        db: &C,
        mut active: user::ActiveModel,
    ) -> Result<Self, DbErr> {
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Self::from_single(db, updated).await
    }

    pub async fn update_profile<C: ConnectionTrait>(
        db: &C,
        id: i64,
        payload: &UpdateProfile,
    ) -> Result<Self, DbErr> {
        let mut active = Self::load_active_model(db, id).await?;
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if let Some(hash) = payload.password_hash.clone() {
            active.password_hash = Set(hash);
        }
        Self::save(db, active).await
    }

    pub async fn set_team_leader<C: ConnectionTrait>(
        db: &C,
        id: i64,
        team_leader_id: Option<i64>,
    ) -> Result<Self, DbErr> {
        let mut active = Self::load_active_model(db, id).await?;
        active.team_leader_id = Set(team_leader_id);
        Self::save(db, active).await
    }

    pub async fn set_role<C: ConnectionTrait>(
        db: &C,
        id: i64,
        role_id: i64,
    ) -> Result<Self, DbErr> {
        let mut active = Self::load_active_model(db, id).await?;
        active.role_id = Set(role_id);
        Self::save(db, active).await
    }

    pub async fn set_active<C: ConnectionTrait>(
        db: &C,
        id: i64,
        is_active: bool,
    ) -> Result<Self, DbErr> {
        let mut active = Self::load_active_model(db, id).await?;
        active.is_active = Set(is_active);
        Self::save(db, active).await
    }

    /// Detaches every member claimed by `team_leader_id`.
    pub async fn release_team<C: ConnectionTrait>(
        db: &C,
        team_leader_id: i64,
    ) -> Result<u64, DbErr> {
        let result = user::Entity::update_many()
            .col_expr(
                user::Column::TeamLeaderId,
                sea_orm::sea_query::Expr::value(Option::<i64>::None),
            )
            .filter(user::Column::TeamLeaderId.eq(team_leader_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
