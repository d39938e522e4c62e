use std::str::FromStr;

use db::{
    models::{
        role::Role,
        user::{UpdateProfile, User},
    },
    types::RoleName,
};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::Deserialize;
use ts_rs::TS;

use super::{
    authz::{self, Actor, Operation, ResourceFacts},
    error::{Result, ServiceError, rollback},
    password::{hash_password_async, verify_password_async},
    validation,
};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ChangeRoleRequest {
    pub role_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SetActiveRequest {
    pub is_active: Option<bool>,
}

/// Account lookups, profile edits and the admin-only account controls.
#[derive(Clone, Default)]
pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        Self
    }

    /// Every account, newest first.
    pub async fn list_users(&self, pool: &db::DbPool, actor: &Actor) -> Result<Vec<User>> {
        authz::require_role(actor, Operation::ListUsers)?;
        Ok(User::find_all(pool).await?)
    }

    pub async fn get_user(&self, pool: &db::DbPool, user_id: i64) -> Result<User> {
        User::find_by_id(pool, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Renames the account and/or changes its password. A password change
    /// must present the account's current password.
    pub async fn update_profile(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        user_id: i64,
        request: &UpdateProfileRequest,
    ) -> Result<User> {
        authz::authorize(
            actor,
            Operation::UpdateProfile,
            &ResourceFacts::user(user_id),
        )?;

        let mut changes = UpdateProfile::default();
        if let Some(name) = &request.name {
            changes.name = Some(validation::person_name(name)?);
        }

        let new_password = request.new_password.as_deref().filter(|p| !p.is_empty());
        if let Some(new_password) = new_password {
            let current = request
                .current_password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ServiceError::validation("Current password required"))?;
            validation::password(new_password)?;

            let credentials = User::find_credentials_by_id(pool, user_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("User not found"))?;
            let matches =
                verify_password_async(current.to_string(), credentials.password_hash).await?;
            if !matches {
                tracing::warn!(user_id, actor_id = actor.id(), "Rejected password change");
                return Err(ServiceError::Unauthorized(
                    "Invalid current password".to_string(),
                ));
            }
            changes.password_hash = Some(hash_password_async(new_password.to_string()).await?);
        }

        if changes.name.is_none() && changes.password_hash.is_none() {
            return self.get_user(pool, user_id).await;
        }
        if User::find_by_id(pool, user_id).await?.is_none() {
            return Err(ServiceError::not_found("User not found"));
        }

        let user = User::update_profile(pool, user_id, &changes).await?;
        tracing::info!(
            user_id,
            actor_id = actor.id(),
            password_changed = changes.password_hash.is_some(),
            "Updated profile"
        );
        Ok(user)
    }

    /// Moves an account to another role. Leaving the team leader role frees
    /// that leader's members; leaving the team member role drops the
    /// account's own team link.
    pub async fn change_role(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        user_id: i64,
        request: &ChangeRoleRequest,
    ) -> Result<User> {
        authz::require_role(actor, Operation::ChangeRole)?;
        let raw = request
            .role_name
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ServiceError::validation("Missing role_name"))?;
        let role = RoleName::from_str(raw).map_err(|_| ServiceError::validation("Invalid role"))?;

        let target = self.get_user(pool, user_id).await?;
        let role_id = Role::id_for(pool, role).await?;

        let tx = pool.begin().await?;
        match Self::apply_role(&tx, &target, role, role_id).await {
            Ok(user) => {
                tx.commit().await?;
                tracing::info!(
                    user_id,
                    actor_id = actor.id(),
                    from = %target.role_name,
                    to = %role,
                    "Changed user role"
                );
                Ok(user)
            }
            Err(err) => Err(rollback(tx, err).await),
        }
    }

    async fn apply_role(
        tx: &DatabaseTransaction,
        target: &User,
        role: RoleName,
        role_id: i64,
    ) -> Result<User> {
        if target.role_name == RoleName::TeamLeader && role != RoleName::TeamLeader {
            let released = User::release_team(tx, target.id).await?;
            if released > 0 {
                tracing::info!(
                    team_leader_id = target.id,
                    released,
                    "Released team members"
                );
            }
        }
        if role != RoleName::TeamMember && target.team_leader_id.is_some() {
            User::set_team_leader(tx, target.id, None).await?;
        }
        Ok(User::set_role(tx, target.id, role_id).await?)
    }

    pub async fn set_active(
        &self,
        pool: &db::DbPool,
        actor: &Actor,
        user_id: i64,
        request: &SetActiveRequest,
    ) -> Result<User> {
        authz::require_role(actor, Operation::SetActive)?;
        let is_active = request
            .is_active
            .ok_or_else(|| ServiceError::validation("Missing is_active"))?;
        self.get_user(pool, user_id).await?;

        let user = User::set_active(pool, user_id, is_active).await?;
        tracing::info!(
            user_id,
            actor_id = actor.id(),
            is_active,
            "Changed account status"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        password::hash_password,
        test_utils::{claim, seed_user, setup},
    };

    #[tokio::test]
    async fn listing_users_is_admin_only() {
        let ctx = setup().await;
        let admin = seed_user(&ctx.db, "Admin", RoleName::Admin).await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let service = UserService::new();

        let users = service.list_users(&ctx.db, &admin).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, leader.id());
        assert!(matches!(
            service.list_users(&ctx.db, &leader).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn profile_rename_rules() {
        let ctx = setup().await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        let other = seed_user(&ctx.db, "Other", RoleName::TeamMember).await;
        let service = UserService::new();

        let rename = |name: &str| UpdateProfileRequest {
            name: Some(name.to_string()),
            ..Default::default()
        };

        let user = service
            .update_profile(&ctx.db, &member, member.id(), &rename(" New Name "))
            .await
            .unwrap();
        assert_eq!(user.name, "New Name");
        assert!(matches!(
            service.update_profile(&ctx.db, &member, member.id(), &rename("  ")).await,
            Err(ServiceError::Validation(msg)) if msg == "Name cannot be blank"
        ));
        assert!(matches!(
            service.update_profile(&ctx.db, &member, member.id(), &rename("N4me")).await,
            Err(ServiceError::Validation(msg)) if msg == "Name may only contain letters and spaces"
        ));
        assert!(matches!(
            service
                .update_profile(&ctx.db, &other, member.id(), &rename("Hijack"))
                .await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn password_change_checks_current_password() {
        let ctx = setup().await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        User::update_profile(
            &ctx.db,
            member.id(),
            &UpdateProfile {
                name: None,
                password_hash: Some(hash_password("original1").unwrap()),
            },
        )
        .await
        .unwrap();
        let service = UserService::new();

        let missing_current = UpdateProfileRequest {
            new_password: Some("brandnew1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&ctx.db, &member, member.id(), &missing_current).await,
            Err(ServiceError::Validation(msg)) if msg == "Current password required"
        ));

        let wrong_current = UpdateProfileRequest {
            current_password: Some("guess".to_string()),
            new_password: Some("brandnew1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&ctx.db, &member, member.id(), &wrong_current).await,
            Err(ServiceError::Unauthorized(msg)) if msg == "Invalid current password"
        ));

        let good = UpdateProfileRequest {
            current_password: Some("original1".to_string()),
            new_password: Some("brandnew1".to_string()),
            ..Default::default()
        };
        service
            .update_profile(&ctx.db, &member, member.id(), &good)
            .await
            .unwrap();
        let stored = User::find_credentials_by_id(&ctx.db, member.id())
            .await
            .unwrap()
            .unwrap();
        assert!(
            crate::services::password::verify_password("brandnew1", &stored.password_hash).unwrap()
        );
    }

    #[tokio::test]
    async fn demoting_a_leader_releases_the_team() {
        let ctx = setup().await;
        let admin = seed_user(&ctx.db, "Admin", RoleName::Admin).await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        claim(&ctx.db, &leader, &member).await;
        let service = UserService::new();

        let request = ChangeRoleRequest {
            role_name: Some("team_member".to_string()),
        };
        let demoted = service
            .change_role(&ctx.db, &admin, leader.id(), &request)
            .await
            .unwrap();
        assert_eq!(demoted.role_name, RoleName::TeamMember);

        let freed = service.get_user(&ctx.db, member.id()).await.unwrap();
        assert_eq!(freed.team_leader_id, None);
    }

    #[tokio::test]
    async fn promoting_a_member_drops_their_team_link() {
        let ctx = setup().await;
        let admin = seed_user(&ctx.db, "Admin", RoleName::Admin).await;
        let leader = seed_user(&ctx.db, "Lead", RoleName::TeamLeader).await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        claim(&ctx.db, &leader, &member).await;

        let promoted = UserService::new()
            .change_role(
                &ctx.db,
                &admin,
                member.id(),
                &ChangeRoleRequest {
                    role_name: Some("team_leader".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role_name, RoleName::TeamLeader);
        assert_eq!(promoted.team_leader_id, None);
    }

    #[tokio::test]
    async fn role_and_active_input_is_validated() {
        let ctx = setup().await;
        let admin = seed_user(&ctx.db, "Admin", RoleName::Admin).await;
        let member = seed_user(&ctx.db, "Member", RoleName::TeamMember).await;
        let service = UserService::new();

        assert!(matches!(
            service
                .change_role(
                    &ctx.db,
                    &admin,
                    member.id(),
                    &ChangeRoleRequest {
                        role_name: Some("overlord".to_string())
                    }
                )
                .await,
            Err(ServiceError::Validation(msg)) if msg == "Invalid role"
        ));
        assert!(matches!(
            service
                .set_active(&ctx.db, &admin, member.id(), &SetActiveRequest::default())
                .await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service
                .set_active(
                    &ctx.db,
                    &member,
                    admin.id(),
                    &SetActiveRequest {
                        is_active: Some(false)
                    }
                )
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        let disabled = service
            .set_active(
                &ctx.db,
                &admin,
                member.id(),
                &SetActiveRequest {
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!disabled.is_active);
        assert!(matches!(
            service
                .set_active(
                    &ctx.db,
                    &admin,
                    9999,
                    &SetActiveRequest {
                        is_active: Some(true)
                    }
                )
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
