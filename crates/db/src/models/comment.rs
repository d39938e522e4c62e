use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::user::User;
use crate::entities::comment;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub author_id: i64,
    pub body: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    #[ts(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
}

impl Comment {
    fn from_model(model: comment::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            author_id: model.author_id,
            body: model.body,
            created_at: model.created_at.into(),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<CommentWithAuthor, DbErr> {
        let active = comment::ActiveModel {
            task_id: Set(task_id),
            author_id: Set(author_id),
            body: Set(body.to_string()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let comment = Self::from_model(active.insert(db).await?);
        let author_name = User::names_by_ids(db, [author_id])
            .await?
            .remove(&author_id);
        Ok(CommentWithAuthor {
            comment,
            author_name,
        })
    }

    /// Oldest first.
    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, DbErr> {
        let records = comment::Entity::find()
            .filter(comment::Column::TaskId.eq(task_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(db)
            .await?;
        let authors = User::names_by_ids(db, records.iter().map(|r| r.author_id)).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let comment = Self::from_model(record);
                CommentWithAuthor {
                    author_name: authors.get(&comment.author_id).cloned(),
                    comment,
                }
            })
            .collect())
    }
}
