use db::models::{
    project::Project,
    status::Status,
    status_log::{CreateStatusLog, StatusLog, StatusLogEntry},
    task::{CreateTask, Task, TaskWithDetails, UpdateTask},
    user::User,
};
use db::types::TaskStatus;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{
    authz::{self, Actor, Operation, ResourceFacts},
    error::{Result, ServiceError, rollback},
    validation,
};

/// Fields a team leader or admin may change through `update_task`.
pub const LEADER_EDITABLE_FIELDS: &[&str] = &[
    "title",
    "description",
    "assignee_id",
    "priority",
    "due_date",
    "status_id",
    "parent_task_id",
];

/// Fields the assignee may change on their own task.
pub const ASSIGNEE_EDITABLE_FIELDS: &[&str] = &["description", "due_date"];

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ChangeStatusRequest {
    pub new_status_id: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct StatusChange {
    pub task: TaskWithDetails,
    pub status_log: StatusLog,
}

#[derive(Clone, Default)]
pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_task(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        project_id: i64,
        payload: &CreateTask,
    ) -> Result<Task> {
        authz::require_role(actor, Operation::CreateTask)?;
        let title = validation::task_title(payload.title.as_deref().unwrap_or_default())?;

        if Project::find_by_id(pool, project_id).await?.is_none() {
            return Err(ServiceError::not_found("Project not found"));
        }
        let status_id = match payload.status_id {
            Some(status_id) => Self::ensure_status(pool, status_id).await?,
            None => Status::id_for(pool, TaskStatus::Todo).await?,
        };
        if let Some(assignee_id) = payload.assignee_id {
            Self::ensure_assignee(pool, assignee_id).await?;
        }
        if let Some(parent_id) = payload.parent_task_id {
            Self::ensure_parent(pool, project_id, parent_id, None).await?;
        }

        let task = Task::create(pool, project_id, actor.id(), &title, status_id, payload).await?;
        tracing::info!(
            task_id = task.id,
            project_id,
            user_id = actor.id(),
            "Created task"
        );
        Ok(task)
    }

    /// Due date ascending with undated tasks last, then high priority first.
    pub async fn list_for_project(
        &self,
        pool: &db::DbPool,
        project_id: i64,
    ) -> Result<Vec<TaskWithDetails>> {
        Ok(Task::find_by_project_id(pool, project_id).await?)
    }

    pub async fn list_assigned(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
    ) -> Result<Vec<TaskWithDetails>> {
        Ok(Task::find_by_assignee(pool, actor.id()).await?)
    }

    pub async fn get_task(&self, pool: &db::DbPool, task_id: i64) -> Result<TaskWithDetails> {
        Task::find_details_by_id(pool, task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))
    }

    pub async fn statuses(&self, pool: &db::DbPool) -> Result<Vec<Status>> {
        Ok(Status::find_all(pool).await?)
    }

    /// Applies the fields the caller is allowed to change and silently drops
    /// the rest. A status change here is logged like [`Self::change_status`].
    pub async fn update_task(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        task_id: i64,
        payload: UpdateTask,
    ) -> Result<Task> {
        let task = Self::load(pool, task_id).await?;
        authz::authorize(
            actor,
            Operation::UpdateTask,
            &ResourceFacts::task(task.assignee_id, task.reporter_id),
        )?;

        let allowed = if actor.is_leader_or_admin() {
            LEADER_EDITABLE_FIELDS
        } else {
            ASSIGNEE_EDITABLE_FIELDS
        };
        let mut payload = payload.restricted_to(allowed);
        if payload.is_empty() {
            return Err(ServiceError::validation("No updatable fields provided"));
        }

        if let Some(title) = &payload.title {
            payload.title = Some(validation::task_title(title)?);
        }
        if let Some(status_id) = payload.status_id {
            Self::ensure_status(pool, status_id).await?;
        }
        if let Some(Some(assignee_id)) = payload.assignee_id {
            Self::ensure_assignee(pool, assignee_id).await?;
        }
        if let Some(Some(parent_id)) = payload.parent_task_id {
            Self::ensure_parent(pool, task.project_id, parent_id, Some(task.id)).await?;
        }

        if payload.status_id.is_none() {
            return Ok(Task::update(pool, task.id, &payload).await?);
        }

        let tx = pool.begin().await?;
        match Self::update_with_log(&tx, actor, task.id, &payload).await {
            Ok((updated, log)) => {
                tx.commit().await?;
                if let Some(log) = log {
                    tracing::info!(
                        task_id = updated.id,
                        user_id = actor.id(),
                        old_status_id = ?log.old_status_id,
                        new_status_id = log.new_status_id,
                        "Task status changed by update"
                    );
                }
                Ok(updated)
            }
            Err(err) => Err(rollback(tx, err).await),
        }
    }

    /// Applies the update and logs a transition only when the status read
    /// inside the transaction actually differs from the new one.
    async fn update_with_log(
        tx: &DatabaseTransaction,
        actor: &Actor,
        task_id: i64,
        payload: &UpdateTask,
    ) -> Result<(Task, Option<StatusLog>)> {
        let current = Self::load(tx, task_id).await?;
        let updated = Task::update(tx, task_id, payload).await?;
        if updated.status_id == current.status_id {
            return Ok((updated, None));
        }
        let log = StatusLog::create(
            tx,
            &CreateStatusLog {
                task_id,
                old_status_id: Some(current.status_id),
                new_status_id: updated.status_id,
                changed_by: actor.id(),
                note: None,
            },
        )
        .await?;
        Ok((updated, Some(log)))
    }

    /// Moves the task to a new status and appends the matching log row in one
    /// transaction.
    pub async fn change_status(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        task_id: i64,
        request: &ChangeStatusRequest,
    ) -> Result<StatusChange> {
        let new_status_id = request
            .new_status_id
            .ok_or_else(|| ServiceError::validation("Missing new_status_id"))?;

        let task = Self::load(pool, task_id).await?;
        authz::authorize(
            actor,
            Operation::ChangeTaskStatus,
            &ResourceFacts::task(task.assignee_id, task.reporter_id),
        )?;
        Self::ensure_status(pool, new_status_id).await?;

        let tx = pool.begin().await?;
        let status_log = match Self::transition(
            &tx,
            actor,
            task_id,
            new_status_id,
            request.note.clone(),
        )
        .await
        {
            Ok(log) => {
                tx.commit().await?;
                log
            }
            Err(err) => {
                tracing::error!(task_id, error = %err, "Status change rolled back");
                return Err(rollback(tx, err).await);
            }
        };

        tracing::info!(
            task_id,
            user_id = actor.id(),
            old_status_id = ?status_log.old_status_id,
            new_status_id,
            "Task status changed"
        );
        let task = self.get_task(pool, task_id).await?;
        Ok(StatusChange { task, status_log })
    }

    async fn transition(
        tx: &DatabaseTransaction,
        actor: &Actor,
        task_id: i64,
        new_status_id: i64,
        note: Option<String>,
    ) -> Result<StatusLog> {
        // the old status is read inside the transaction
        let current = Self::load(tx, task_id).await?;
        Task::update_status(tx, task_id, new_status_id).await?;
        let log = StatusLog::create(
            tx,
            &CreateStatusLog {
                task_id,
                old_status_id: Some(current.status_id),
                new_status_id,
                changed_by: actor.id(),
                note: note.filter(|n| !n.trim().is_empty()),
            },
        )
        .await?;
        Ok(log)
    }

    pub async fn status_logs(
        &self,
        pool: &db::DbPool,
        task_id: i64,
    ) -> Result<Vec<StatusLogEntry>> {
        Self::load(pool, task_id).await?;
        Ok(StatusLog::find_by_task_id(pool, task_id).await?)
    }

    pub async fn delete_task(&self, pool: &db::DbPool, actor: &Actor, task_id: i64) -> Result<u64> {
        authz::require_role(actor, Operation::DeleteTask)?;
        let task = Self::load(pool, task_id).await?;

        let tx = pool.begin().await?;
        let rows_affected = match Task::delete(&tx, task.id).await {
            Ok(rows) => rows,
            Err(err) => return Err(rollback(tx, err).await.into()),
        };
        tx.commit().await?;

        tracing::info!(task_id, user_id = actor.id(), "Deleted task");
        Ok(rows_affected)
    }

    async fn load<C: sea_orm::ConnectionTrait>(db: &C, task_id: i64) -> Result<Task> {
        Task::find_by_id(db, task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))
    }

    async fn ensure_status(pool: &db::DbPool, status_id: i64) -> Result<i64> {
        match Status::find_by_id(pool, status_id).await? {
            Some(status) => Ok(status.id),
            None => Err(ServiceError::validation("Invalid status")),
        }
    }

    async fn ensure_assignee(pool: &db::DbPool, assignee_id: i64) -> Result<()> {
        match User::find_by_id(pool, assignee_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::validation("Assignee not found")),
        }
    }

    async fn ensure_parent(
        pool: &db::DbPool,
        project_id: i64,
        parent_id: i64,
        task_id: Option<i64>,
    ) -> Result<()> {
        if task_id == Some(parent_id) {
            return Err(ServiceError::validation("A task cannot be its own parent"));
        }
        match Task::find_by_id(pool, parent_id).await? {
            Some(parent) if parent.project_id == project_id => Ok(()),
            _ => Err(ServiceError::validation(
                "Parent task must belong to the same project",
            )),
        }
    }
}
