use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use super::{project::Project, status::Status, user::User};
use crate::entities::{comment, status_log, task};
pub use crate::types::{TaskPriority, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub reporter_id: i64,
    pub assignee_id: Option<i64>,
    pub status_id: i64,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub parent_task_id: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskWithDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub status_name: Option<TaskStatus>,
    pub assignee_name: Option<String>,
    pub project_name: Option<String>,
}

impl std::ops::Deref for TaskWithDetails {
    type Target = Task;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<i64>,
    pub status_id: Option<i64>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub parent_task_id: Option<i64>,
}

// Present-but-null must stay distinguishable from absent so a caller can
// clear a nullable column.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial update. An outer `None` means the field was not supplied.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTask {
    #[serde(default)]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[ts(optional)]
    pub assignee_id: Option<Option<i64>>,
    #[serde(default)]
    #[ts(optional)]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "present")]
    #[ts(optional)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    #[ts(optional)]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    #[ts(optional)]
    pub parent_task_id: Option<Option<i64>>,
}

impl UpdateTask {
    pub fn supplied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.assignee_id.is_some() {
            fields.push("assignee_id");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.due_date.is_some() {
            fields.push("due_date");
        }
        if self.status_id.is_some() {
            fields.push("status_id");
        }
        if self.parent_task_id.is_some() {
            fields.push("parent_task_id");
        }
        fields
    }

    /// Drops every supplied field not named in `allowed`.
    pub fn restricted_to(self, allowed: &[&str]) -> Self {
        let keep = |name: &str| allowed.contains(&name);
        Self {
            title: self.title.filter(|_| keep("title")),
            description: self.description.filter(|_| keep("description")),
            assignee_id: self.assignee_id.filter(|_| keep("assignee_id")),
            priority: self.priority.filter(|_| keep("priority")),
            due_date: self.due_date.filter(|_| keep("due_date")),
            status_id: self.status_id.filter(|_| keep("status_id")),
            parent_task_id: self.parent_task_id.filter(|_| keep("parent_task_id")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.supplied_fields().is_empty()
    }
}

fn compare_due_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Due date ascending with undated tasks last, then high priority first.
pub fn sort_by_due_date_then_priority(tasks: &mut [TaskWithDetails]) {
    tasks.sort_by(|a, b| {
        compare_due_dates(a.due_date, b.due_date)
            .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub fn sort_by_due_date(tasks: &mut [TaskWithDetails]) {
    tasks.sort_by(|a, b| compare_due_dates(a.due_date, b.due_date).then_with(|| a.id.cmp(&b.id)));
}

impl Task {
    fn from_model(model: task::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            title: model.title,
            description: model.description,
            reporter_id: model.reporter_id,
            assignee_id: model.assignee_id,
            status_id: model.status_id,
            priority: model.priority,
            due_date: model.due_date,
            parent_task_id: model.parent_task_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn with_details<C: ConnectionTrait>(
        db: &C,
        tasks: Vec<Self>,
    ) -> Result<Vec<TaskWithDetails>, DbErr> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let statuses = Status::name_map(db).await?;
        let assignees = User::names_by_ids(db, tasks.iter().filter_map(|t| t.assignee_id)).await?;
        let projects = Project::names_by_ids(db, tasks.iter().map(|t| t.project_id)).await?;

        Ok(tasks
            .into_iter()
            .map(|task| TaskWithDetails {
                status_name: statuses.get(&task.status_id).copied(),
                assignee_name: task.assignee_id.and_then(|id| assignees.get(&id).cloned()),
                project_name: projects.get(&task.project_id).cloned(),
                task,
            })
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_details_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<TaskWithDetails>, DbErr> {
        let Some(task) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        Ok(Self::with_details(db, vec![task]).await?.into_iter().next())
    }

    pub async fn find_by_project_id<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
    ) -> Result<Vec<TaskWithDetails>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_id))
            .all(db)
            .await?;
        let mut tasks =
            Self::with_details(db, records.into_iter().map(Self::from_model).collect()).await?;
        sort_by_due_date_then_priority(&mut tasks);
        Ok(tasks)
    }

    pub async fn find_by_assignee<C: ConnectionTrait>(
        db: &C,
        assignee_id: i64,
    ) -> Result<Vec<TaskWithDetails>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::AssigneeId.eq(assignee_id))
            .all(db)
            .await?;
        let mut tasks =
            Self::with_details(db, records.into_iter().map(Self::from_model).collect()).await?;
        sort_by_due_date(&mut tasks);
        Ok(tasks)
    }

    /// Inserts a task. `status_id` and `priority` are already resolved to
    /// their defaults by the caller.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        reporter_id: i64,
        title: &str,
        status_id: i64,
        data: &CreateTask,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = task::ActiveModel {
            project_id: Set(project_id),
            title: Set(title.to_string()),
            description: Set(data.description.clone()),
            reporter_id: Set(reporter_id),
            assignee_id: Set(data.assignee_id),
            status_id: Set(status_id),
            priority: Set(data.priority.unwrap_or_default()),
            due_date: Set(data.due_date),
            parent_task_id: Set(data.parent_task_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        payload: &UpdateTask,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let mut active: task::ActiveModel = record.into();
        if let Some(title) = payload.title.clone() {
            active.title = Set(title);
        }
        if let Some(description) = payload.description.clone() {
            active.description = Set(description);
        }
        if let Some(assignee_id) = payload.assignee_id {
            active.assignee_id = Set(assignee_id);
        }
        if let Some(priority) = payload.priority {
            active.priority = Set(priority);
        }
        if let Some(due_date) = payload.due_date {
            active.due_date = Set(due_date);
        }
        if let Some(status_id) = payload.status_id {
            active.status_id = Set(status_id);
        }
        if let Some(parent_task_id) = payload.parent_task_id {
            active.parent_task_id = Set(parent_task_id);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: i64,
        status_id: i64,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let mut active: task::ActiveModel = record.into();
        active.status_id = Set(status_id);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Removes comments and status logs belonging to `task_ids`.
    pub async fn delete_dependents<C: ConnectionTrait>(
        db: &C,
        task_ids: &[i64],
    ) -> Result<(), DbErr> {
        if task_ids.is_empty() {
            return Ok(());
        }
        comment::Entity::delete_many()
            .filter(comment::Column::TaskId.is_in(task_ids.iter().copied()))
            .exec(db)
            .await?;
        status_log::Entity::delete_many()
            .filter(status_log::Column::TaskId.is_in(task_ids.iter().copied()))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Deletes the task with its comments and status logs. Subtasks keep
    /// existing with their parent link cleared.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        Self::delete_dependents(db, &[id]).await?;
        task::Entity::update_many()
            .col_expr(
                task::Column::ParentTaskId,
                sea_orm::sea_query::Expr::value(Option::<i64>::None),
            )
            .filter(task::Column::ParentTaskId.eq(id))
            .exec(db)
            .await?;
        let result = task::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, due: Option<&str>, priority: TaskPriority) -> TaskWithDetails {
        let now = Utc::now();
        TaskWithDetails {
            task: Task {
                id,
                project_id: 1,
                title: format!("Task {id}"),
                description: None,
                reporter_id: 1,
                assignee_id: None,
                status_id: 1,
                priority,
                due_date: due.map(|d| d.parse().unwrap()),
                parent_task_id: None,
                created_at: now,
                updated_at: now,
            },
            status_name: None,
            assignee_name: None,
            project_name: None,
        }
    }

    #[test]
    fn project_listing_orders_by_due_date_nulls_last_then_priority() {
        let mut tasks = vec![
            task(1, None, TaskPriority::High),
            task(2, Some("2025-03-01"), TaskPriority::Low),
            task(3, Some("2025-03-01"), TaskPriority::High),
            task(4, Some("2025-01-15"), TaskPriority::Medium),
        ];
        sort_by_due_date_then_priority(&mut tasks);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn update_payload_distinguishes_null_from_absent() {
        let payload: UpdateTask =
            serde_json::from_value(serde_json::json!({ "assignee_id": null, "priority": "high" }))
                .unwrap();
        assert_eq!(payload.assignee_id, Some(None));
        assert_eq!(payload.description, None);
        assert_eq!(payload.supplied_fields(), vec!["assignee_id", "priority"]);
    }

    #[test]
    fn restricting_fields_drops_disallowed_ones() {
        let payload: UpdateTask = serde_json::from_value(serde_json::json!({
            "title": "Renamed",
            "description": "Updated notes",
        }))
        .unwrap();
        let restricted = payload.restricted_to(&["description", "due_date"]);
        assert_eq!(restricted.supplied_fields(), vec!["description"]);
        assert!(restricted.title.is_none());
    }
}
