use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{status::Status, user::User};
use crate::{entities::status_log, types::TaskStatus};

/// One status transition of a task. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StatusLog {
    pub id: i64,
    pub task_id: i64,
    pub old_status_id: Option<i64>,
    pub new_status_id: i64,
    pub changed_by: i64,
    pub note: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct StatusLogEntry {
    #[serde(flatten)]
    #[ts(flatten)]
    pub log: StatusLog,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub changed_by_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateStatusLog {
    pub task_id: i64,
    pub old_status_id: Option<i64>,
    pub new_status_id: i64,
    pub changed_by: i64,
    pub note: Option<String>,
}

impl StatusLog {
    fn from_model(model: status_log::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            old_status_id: model.old_status_id,
            new_status_id: model.new_status_id,
            changed_by: model.changed_by,
            note: model.note,
            created_at: model.created_at.into(),
        }
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateStatusLog) -> Result<Self, DbErr> {
        let active = status_log::ActiveModel {
            task_id: Set(data.task_id),
            old_status_id: Set(data.old_status_id),
            new_status_id: Set(data.new_status_id),
            changed_by: Set(data.changed_by),
            note: Set(data.note.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Oldest first.
    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<StatusLogEntry>, DbErr> {
        let records = status_log::Entity::find()
            .filter(status_log::Column::TaskId.eq(task_id))
            .order_by_asc(status_log::Column::CreatedAt)
            .order_by_asc(status_log::Column::Id)
            .all(db)
            .await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let statuses = Status::name_map(db).await?;
        let authors = User::names_by_ids(db, records.iter().map(|r| r.changed_by)).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let log = Self::from_model(record);
                StatusLogEntry {
                    old_status: log.old_status_id.and_then(|id| statuses.get(&id).copied()),
                    new_status: statuses.get(&log.new_status_id).copied(),
                    changed_by_name: authors.get(&log.changed_by).cloned(),
                    log,
                }
            })
            .collect())
    }

    pub async fn count_for_task<C: ConnectionTrait>(db: &C, task_id: i64) -> Result<u64, DbErr> {
        status_log::Entity::find()
            .filter(status_log::Column::TaskId.eq(task_id))
            .count(db)
            .await
    }
}
