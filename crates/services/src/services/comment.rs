use db::models::{
    comment::{Comment, CommentWithAuthor},
    task::Task,
};
use serde::Deserialize;
use ts_rs::TS;

use super::{
    authz::{self, Actor, Operation, ResourceFacts},
    error::{Result, ServiceError},
};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateComment {
    pub body: Option<String>,
}

#[derive(Clone, Default)]
pub struct CommentService;

impl CommentService {
    pub fn new() -> Self {
        Self
    }

    /// Oldest first. Members only see comments on tasks they report or are
    /// assigned to.
    pub async fn list_comments(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        task_id: i64,
    ) -> Result<Vec<CommentWithAuthor>> {
        self.check_visible(pool, actor, task_id).await?;
        Ok(Comment::find_by_task_id(pool, task_id).await?)
    }

    pub async fn add_comment(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        task_id: i64,
        payload: &CreateComment,
    ) -> Result<CommentWithAuthor> {
        let body = payload
            .body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("Missing body"))?;
        self.check_visible(pool, actor, task_id).await?;

        let comment = Comment::create(pool, task_id, actor.id(), body).await?;
        tracing::debug!(task_id, comment_id = comment.comment.id, "Added comment");
        Ok(comment)
    }

    async fn check_visible(&self, pool: &db::DbPool, actor: &Actor, task_id: i64) -> Result<()> {
        let task = Task::find_by_id(pool, task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;
        authz::authorize(
            actor,
            Operation::ViewComments,
            &ResourceFacts::task(task.assignee_id, task.reporter_id),
        )
    }
}
