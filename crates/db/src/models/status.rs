use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{entities::status, types::TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Status {
    pub id: i64,
    pub name: TaskStatus,
    pub order_index: i32,
}

impl Status {
    fn from_model(model: status::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            order_index: model.order_index,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = status::Entity::find()
            .order_by_asc(status::Column::OrderIndex)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = status::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        db: &C,
        name: TaskStatus,
    ) -> Result<Option<Self>, DbErr> {
        let record = status::Entity::find()
            .filter(status::Column::Name.eq(name))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn id_for<C: ConnectionTrait>(db: &C, name: TaskStatus) -> Result<i64, DbErr> {
        Self::find_by_name(db, name)
            .await?
            .map(|status| status.id)
            .ok_or_else(|| DbErr::RecordNotFound(format!("Status {name} not found")))
    }

    pub async fn name_map<C: ConnectionTrait>(db: &C) -> Result<HashMap<i64, TaskStatus>, DbErr> {
        Ok(Self::find_all(db)
            .await?
            .into_iter()
            .map(|status| (status.id, status.name))
            .collect())
    }
}
