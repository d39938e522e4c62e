use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{entities::role, types::RoleName};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Role {
    pub id: i64,
    pub name: RoleName,
}

impl Role {
    fn from_model(model: role::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = role::Entity::find()
            .order_by_asc(role::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = role::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        db: &C,
        name: RoleName,
    ) -> Result<Option<Self>, DbErr> {
        let record = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Role id of `name`, failing when the lookup row was never seeded.
    pub async fn id_for<C: ConnectionTrait>(db: &C, name: RoleName) -> Result<i64, DbErr> {
        Self::find_by_name(db, name)
            .await?
            .map(|role| role.id)
            .ok_or_else(|| DbErr::RecordNotFound(format!("Role {name} not found")))
    }

    pub async fn name_map<C: ConnectionTrait>(db: &C) -> Result<HashMap<i64, RoleName>, DbErr> {
        Ok(Self::find_all(db)
            .await?
            .into_iter()
            .map(|role| (role.id, role.name))
            .collect())
    }
}
