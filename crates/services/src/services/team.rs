use db::{
    models::{role::Role, user::User},
    types::RoleName,
};

use super::{
    authz::{self, Actor, Operation},
    error::{Result, ServiceError},
};

/// Team leaders claiming and releasing team members.
#[derive(Clone, Default)]
pub struct TeamService;

impl TeamService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_members(&self, pool: &db::DbPool, actor: &Actor) -> Result<Vec<User>> {
        authz::require_role(actor, Operation::ManageTeam)?;
        Ok(User::find_by_team_leader(pool, actor.id()).await?)
    }

    /// Team members nobody has claimed yet.
    pub async fn list_available(&self, pool: &db::DbPool, actor: &Actor) -> Result<Vec<User>> {
        authz::require_role(actor, Operation::ManageTeam)?;
        let member_role = Role::id_for(pool, RoleName::TeamMember).await?;
        Ok(User::find_unclaimed_with_role(pool, member_role).await?)
    }

    /// Claims a team member for the calling leader. A member already in
    /// another team is moved over.
    pub async fn add_member(&self, pool: &db::DbPool, actor: &Actor, user_id: i64) -> Result<User> {
        authz::require_role(actor, Operation::ManageTeam)?;
        let target = User::find_by_id(pool, user_id)
            .await?
            .filter(|user| user.role_name == RoleName::TeamMember)
            .ok_or_else(|| ServiceError::not_found("User not found or invalid role"))?;

        let user = User::set_team_leader(pool, target.id, Some(actor.id())).await?;
        tracing::info!(
            user_id = user.id,
            team_leader_id = actor.id(),
            "Added team member"
        );
        Ok(user)
    }

    pub async fn remove_member(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        user_id: i64,
    ) -> Result<User> {
        authz::require_role(actor, Operation::ManageTeam)?;
        let target = User::find_by_id(pool, user_id)
            .await?
            .filter(|user| user.team_leader_id == Some(actor.id()))
            .ok_or_else(|| ServiceError::not_found("User not found or not in your team"))?;

        let user = User::set_team_leader(pool, target.id, None).await?;
        tracing::info!(
            user_id = user.id,
            team_leader_id = actor.id(),
            "Removed team member"
        );
        Ok(user)
    }
}
