use db::{
    models::{
        project::{CreateProject, Project, ProjectWithProgress},
        status::Status,
    },
    types::{ProjectStatus, RoleName, TaskStatus},
};
use sea_orm::TransactionTrait;

use super::{
    authz::{self, Actor, Operation, ResourceFacts},
    error::{Result, ServiceError, rollback},
};

#[derive(Clone, Default)]
pub struct ProjectService;

impl ProjectService {
    pub fn new() -> Self {
        Self
    }

    /// Leaders and admins see everything; a member sees only the projects
    /// owned by their team leader.
    pub async fn list_projects(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
    ) -> Result<Vec<ProjectWithProgress>> {
        let projects = match actor.role {
            RoleName::Admin | RoleName::TeamLeader => Project::find_all(pool).await?,
            RoleName::TeamMember => match actor.user.team_leader_id {
                Some(leader_id) => Project::find_by_owner(pool, leader_id).await?,
                None => Vec::new(),
            },
        };
        let done = Status::id_for(pool, TaskStatus::Done).await?;
        Ok(Project::with_progress(pool, projects, done).await?)
    }

    pub async fn get_project(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        project_id: i64,
    ) -> Result<ProjectWithProgress> {
        let project = Project::find_by_id(pool, project_id)
            .await?
            .filter(|project| Self::is_visible(actor, project))
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;
        let done = Status::id_for(pool, TaskStatus::Done).await?;
        Project::with_progress(pool, vec![project], done)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found("Project not found"))
    }

    fn is_visible(actor: &Actor, project: &Project) -> bool {
        actor.is_leader_or_admin() || actor.user.team_leader_id == Some(project.owner_id)
    }

    pub async fn create_project(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        payload: &CreateProject,
    ) -> Result<Project> {
        authz::require_role(actor, Operation::CreateProject)?;
        if payload.name.trim().is_empty() {
            return Err(ServiceError::validation("Missing name"));
        }

        let project = Project::create(pool, payload, actor.id()).await?;
        tracing::info!(
            project_id = project.id,
            user_id = actor.id(),
            "Created project"
        );
        Ok(project)
    }

    /// Marks the project completed once every task under it is done.
    pub async fn complete_project(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        project_id: i64,
    ) -> Result<Project> {
        let project = self
            .load_for(pool, actor, project_id, Operation::CompleteProject)
            .await?;

        let done = Status::id_for(pool, TaskStatus::Done).await?;
        let undone = Project::count_undone_tasks(pool, project.id, done).await?;
        if undone > 0 {
            return Err(ServiceError::IncompleteTasks { count: undone });
        }

        let project = Project::set_status(pool, project.id, ProjectStatus::Completed).await?;
        tracing::info!(
            project_id = project.id,
            user_id = actor.id(),
            "Completed project"
        );
        Ok(project)
    }

    /// Deletes the project with all of its tasks, comments and status logs.
    pub async fn delete_project(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        project_id: i64,
    ) -> Result<u64> {
        let project = self
            .load_for(pool, actor, project_id, Operation::DeleteProject)
            .await?;

        let tx = pool.begin().await?;
        let rows_affected = match Project::delete(&tx, project.id).await {
            Ok(rows) => rows,
            Err(err) => return Err(rollback(tx, err).await.into()),
        };
        tx.commit().await?;

        tracing::info!(
            project_id = project.id,
            user_id = actor.id(),
            "Deleted project"
        );
        Ok(rows_affected)
    }

    async fn load_for(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        project_id: i64,
        operation: Operation,
    ) -> Result<Project> {
        authz::require_role(actor, operation)?;
        let project = Project::find_by_id(pool, project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;
        authz::authorize(actor, operation, &ResourceFacts::owned_by(project.owner_id))?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{comment::Comment, status_log::StatusLog, task::Task};

    use super::*;
    use crate::services::test_utils::{claim, seed_project, seed_task, seed_user, setup};

    #[tokio::test]
    async fn members_see_only_their_leaders_projects() {
        let ctx = setup().await;
        let leader = seed_user(&ctx.db, "Lead One", RoleName::TeamLeader).await;
        let other_leader = seed_user(&ctx.db, "Lead Two", RoleName::TeamLeader).await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        let loner = seed_user(&ctx.db, "Loner", RoleName::TeamMember).await;
        let member = claim(&ctx.db, &leader, &member).await;

        let mine = seed_project(&ctx.db, &leader, "Mine").await;
        seed_project(&ctx.db, &other_leader, "Theirs").await;

        let service = ProjectService::new();
        let visible = service.list_projects(&ctx.db, &member).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine.id);
        assert_eq!(visible[0].owner_name.as_deref(), Some("Lead One"));

        assert!(
            service
                .list_projects(&ctx.db, &loner)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            service.list_projects(&ctx.db, &leader).await.unwrap().len(),
            2
        );

        let hidden = other_leader.id();
        let theirs = service
            .list_projects(&ctx.db, &leader)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.owner_id == hidden)
            .unwrap();
        assert!(matches!(
            service.get_project(&ctx.db, &member, theirs.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(service.get_project(&ctx.db, &member, mine.id).await.is_ok());
    }

    #[tokio::test]
    async fn create_requires_leader_role_and_a_name() {
        let ctx = setup().await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        let service = ProjectService::new();

        let payload = CreateProject {
            name: "  Launch  ".to_string(),
            description: Some("Ship it".to_string()),
            start_date: None,
            due_date: None,
        };
        assert!(matches!(
            service.create_project(&ctx.db, &member, &payload).await,
            Err(ServiceError::Forbidden(_))
        ));

        let project = service
            .create_project(&ctx.db, &leader, &payload)
            .await
            .unwrap();
        assert_eq!(project.name, "Launch");
        assert_eq!(project.owner_id, leader.id());
        assert_eq!(project.status, ProjectStatus::Active);

        let blank = CreateProject {
            name: "   ".to_string(),
            ..payload
        };
        assert!(matches!(
            service.create_project(&ctx.db, &leader, &blank).await,
            Err(ServiceError::Validation(msg)) if msg == "Missing name"
        ));
    }

    #[tokio::test]
    async fn complete_reports_exact_undone_count() {
        let ctx = setup().await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let project = seed_project(&ctx.db, &leader, "Alpha").await;
        let task = seed_task(&ctx.db, &project, &leader, None).await;
        let service = ProjectService::new();

        assert!(matches!(
            service.complete_project(&ctx.db, &leader, project.id).await,
            Err(ServiceError::IncompleteTasks { count: 1 })
        ));

        let done = Status::id_for(&ctx.db, TaskStatus::Done).await.unwrap();
        Task::update_status(&ctx.db, task.id, done).await.unwrap();
        let completed = service
            .complete_project(&ctx.db, &leader, project.id)
            .await
            .unwrap();
        assert_eq!(completed.status, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn empty_project_completes() {
        let ctx = setup().await;
        let admin = seed_user(&ctx.db, "Admin", RoleName::Admin).await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let project = seed_project(&ctx.db, &leader, "Empty").await;

        let completed = ProjectService::new()
            .complete_project(&ctx.db, &admin, project.id)
            .await
            .unwrap();
        assert_eq!(completed.status, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_delete() {
        let ctx = setup().await;
        let owner = seed_user(&ctx.db, "Owner", RoleName::TeamLeader).await;
        let stranger = seed_user(&ctx.db, "Stranger", RoleName::TeamLeader).await;
        let project = seed_project(&ctx.db, &owner, "Doomed").await;
        let task = seed_task(&ctx.db, &project, &owner, None).await;
        Comment::create(&ctx.db, task.id, owner.id(), "first")
            .await
            .unwrap();
        let service = ProjectService::new();

        assert!(matches!(
            service.delete_project(&ctx.db, &stranger, project.id).await,
            Err(ServiceError::Forbidden(msg)) if msg == "Only owner or admin can delete project"
        ));
        assert!(matches!(
            service.delete_project(&ctx.db, &owner, 9999).await,
            Err(ServiceError::NotFound(_))
        ));

        assert_eq!(
            service
                .delete_project(&ctx.db, &owner, project.id)
                .await
                .unwrap(),
            1
        );
        assert!(Task::find_by_id(&ctx.db, task.id).await.unwrap().is_none());
        assert!(
            Comment::find_by_task_id(&ctx.db, task.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            StatusLog::count_for_task(&ctx.db, task.id).await.unwrap(),
            0
        );
    }
}
