use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{task::Task, user::User};
use crate::{entities::project, entities::task, types::ProjectStatus};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// A project row as shown in listings, with task progress.
#[derive(Debug, Clone, Serialize, TS)]
pub struct ProjectWithProgress {
    #[serde(flatten)]
    #[ts(flatten)]
    pub project: Project,
    pub owner_name: Option<String>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub progress: f64,
}

impl std::ops::Deref for ProjectWithProgress {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Percentage of done tasks rounded to two decimals; zero for an empty project.
pub fn progress_percent(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let ratio = completed as f64 * 100.0 / total as f64;
    (ratio * 100.0).round() / 100.0
}

impl Project {
    fn from_model(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            owner_id: model.owner_id,
            start_date: model.start_date,
            due_date: model.due_date,
            status: model.status,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Newest first.
    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .order_by_desc(project::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .filter(project::Column::OwnerId.eq(owner_id))
            .order_by_desc(project::Column::CreatedAt)
            .order_by_desc(project::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn names_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashMap<i64, String>, DbErr> {
        let ids: Vec<i64> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = project::Entity::find()
            .select_only()
            .column(project::Column::Id)
            .column(project::Column::Name)
            .filter(project::Column::Id.is_in(ids))
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Attaches owner names and task progress. `done_status_id` identifies
    /// the status that counts as completed.
    pub async fn with_progress<C: ConnectionTrait>(
        db: &C,
        projects: Vec<Self>,
        done_status_id: i64,
    ) -> Result<Vec<ProjectWithProgress>, DbErr> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }
        let project_ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
        let rows: Vec<(i64, i64)> = task::Entity::find()
            .select_only()
            .column(task::Column::ProjectId)
            .column(task::Column::StatusId)
            .filter(task::Column::ProjectId.is_in(project_ids))
            .into_tuple()
            .all(db)
            .await?;

        let mut counts: HashMap<i64, (i64, i64)> = HashMap::new();
        for (project_id, status_id) in rows {
            let entry = counts.entry(project_id).or_default();
            entry.0 += 1;
            if status_id == done_status_id {
                entry.1 += 1;
            }
        }

        let owners = User::names_by_ids(db, projects.iter().map(|p| p.owner_id)).await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let (total_tasks, completed_tasks) =
                    counts.get(&project.id).copied().unwrap_or_default();
                ProjectWithProgress {
                    owner_name: owners.get(&project.owner_id).cloned(),
                    total_tasks,
                    completed_tasks,
                    progress: progress_percent(completed_tasks, total_tasks),
                    project,
                }
            })
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        owner_id: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = project::ActiveModel {
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.clone()),
            owner_id: Set(owner_id),
            start_date: Set(data.start_date),
            due_date: Set(data.due_date),
            status: Set(ProjectStatus::Active),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Tasks under the project whose status is not `done_status_id`.
    pub async fn count_undone_tasks<C: ConnectionTrait>(
        db: &C,
        id: i64,
        done_status_id: i64,
    ) -> Result<u64, DbErr> {
        task::Entity::find()
            .filter(task::Column::ProjectId.eq(id))
            .filter(task::Column::StatusId.ne(done_status_id))
            .count(db)
            .await
    }

    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: i64,
        status: ProjectStatus,
    ) -> Result<Self, DbErr> {
        let record = project::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Removes the project with its tasks and their comments and status logs.
    /// Callers run this inside a transaction so the cascade is all-or-nothing.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let task_ids: Vec<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::Id)
            .filter(task::Column::ProjectId.eq(id))
            .into_tuple()
            .all(db)
            .await?;
        Task::delete_dependents(db, &task_ids).await?;
        task::Entity::delete_many()
            .filter(task::Column::ProjectId.eq(id))
            .exec(db)
            .await?;

        let result = project::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::{
            comment::Comment,
            role::Role,
            status::Status,
            status_log::{CreateStatusLog, StatusLog},
            task::CreateTask,
            user::CreateUser,
        },
        types::{RoleName, TaskStatus},
    };

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn leader(db: &DatabaseConnection) -> User {
        let role_id = Role::id_for(db, RoleName::TeamLeader).await.unwrap();
        User::create(
            db,
            &CreateUser {
                name: "Lena Leader".to_string(),
                email: "lena@example.com".to_string(),
                password_hash: "hash".to_string(),
                role_id,
            },
        )
        .await
        .unwrap()
    }

    fn new_project(name: &str) -> CreateProject {
        CreateProject {
            name: name.to_string(),
            description: None,
            start_date: None,
            due_date: None,
        }
    }

    fn new_task(title: &str) -> CreateTask {
        CreateTask {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn progress_counts_done_tasks_per_project() {
        let db = setup_db().await;
        let owner = leader(&db).await;
        let todo = Status::id_for(&db, TaskStatus::Todo).await.unwrap();
        let done = Status::id_for(&db, TaskStatus::Done).await.unwrap();

        let busy = Project::create(&db, &new_project("Busy"), owner.id)
            .await
            .unwrap();
        let empty = Project::create(&db, &new_project("Empty"), owner.id)
            .await
            .unwrap();
        for (title, status) in [("One", done), ("Two", todo), ("Three", todo)] {
            Task::create(&db, busy.id, owner.id, title, status, &new_task(title))
                .await
                .unwrap();
        }

        let listed = Project::with_progress(&db, Project::find_all(&db).await.unwrap(), done)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, empty.id, "newest project first");
        assert_eq!(listed[0].progress, 0.0);
        assert_eq!(listed[1].total_tasks, 3);
        assert_eq!(listed[1].completed_tasks, 1);
        assert_eq!(listed[1].progress, 33.33);
        assert_eq!(listed[1].owner_name.as_deref(), Some("Lena Leader"));
        assert_eq!(
            Project::count_undone_tasks(&db, busy.id, done)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn delete_cascades_to_tasks_comments_and_logs() {
        let db = setup_db().await;
        let owner = leader(&db).await;
        let todo = Status::id_for(&db, TaskStatus::Todo).await.unwrap();
        let done = Status::id_for(&db, TaskStatus::Done).await.unwrap();

        let project = Project::create(&db, &new_project("Doomed"), owner.id)
            .await
            .unwrap();
        let task = Task::create(
            &db,
            project.id,
            owner.id,
            "Cleanup",
            todo,
            &new_task("Cleanup"),
        )
        .await
        .unwrap();
        Comment::create(&db, task.id, owner.id, "First note")
            .await
            .unwrap();
        StatusLog::create(
            &db,
            &CreateStatusLog {
                task_id: task.id,
                old_status_id: Some(todo),
                new_status_id: done,
                changed_by: owner.id,
                note: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(Project::delete(&db, project.id).await.unwrap(), 1);
        assert!(
            Project::find_by_id(&db, project.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(Task::find_by_id(&db, task.id).await.unwrap().is_none());
        assert!(
            Comment::find_by_task_id(&db, task.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(StatusLog::count_for_task(&db, task.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let db = setup_db().await;
        let first = leader(&db).await;
        let err = User::create(
            &db,
            &CreateUser {
                name: "Other".to_string(),
                email: first.email.clone(),
                password_hash: "hash".to_string(),
                role_id: first.role_id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ));
        assert!(User::email_exists(&db, &first.email).await.unwrap());
    }

    #[test]
    fn progress_is_zero_without_tasks() {
        assert_eq!(progress_percent(0, 0), 0.0);
    }

    #[test]
    fn progress_rounds_to_two_decimals() {
        assert_eq!(progress_percent(1, 3), 33.33);
        assert_eq!(progress_percent(2, 3), 66.67);
        assert_eq!(progress_percent(4, 4), 100.0);
    }
}
