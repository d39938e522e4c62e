use db::{
    SqlErr,
    models::{
        role::Role,
        user::{CreateUser, User},
    },
    types::RoleName,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils_jwt::TokenCodec;

use super::{
    authz::Actor,
    error::{Result, ServiceError},
    login_throttle::{LoginThrottle, retry_after_secs},
    password::{hash_password_async, verify_password_async},
    validation,
};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn required(field: &Option<String>) -> Result<&str> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ServiceError::validation("Missing fields")),
    }
}

/// Credential checks, token issue and verification, and login throttling.
#[derive(Clone, Debug)]
pub struct AuthService {
    tokens: TokenCodec,
    throttle: LoginThrottle,
}

impl AuthService {
    pub fn new(tokens: TokenCodec, throttle: LoginThrottle) -> Self {
        Self { tokens, throttle }
    }

    /// Self-service sign-up. New accounts are always team members.
    pub async fn register(
        &self,
        db: &DatabaseConnection,
        request: &RegisterRequest,
    ) -> Result<AuthResponse> {
        let name = required(&request.name)?;
        let email = required(&request.email)?;
        let password = required(&request.password)?;

        let name = validation::person_name(name)?;
        let email = validation::email(email)?;
        validation::password(password)?;

        if User::email_exists(db, &email).await? {
            return Err(ServiceError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_password_async(password.to_string()).await?;
        let role_id = Role::id_for(db, RoleName::TeamMember).await?;
        let user = User::create(
            db,
            &CreateUser {
                name,
                email,
                password_hash,
                role_id,
            },
        )
        .await
        .map_err(|err| match err.sql_err() {
            // lost a race with a concurrent registration
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::Conflict("Email already exists".to_string())
            }
            _ => ServiceError::Database(err),
        })?;

        tracing::info!(user_id = user.id, email = %user.email, "Registered new user");
        let token = self.tokens.issue(user.id)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn login(
        &self,
        db: &DatabaseConnection,
        request: &LoginRequest,
        client_ip: &str,
    ) -> Result<AuthResponse> {
        let email = required(&request.email)?.trim().to_lowercase();
        let password = required(&request.password)?;

        if let Err(remaining) = self.throttle.check(&email, client_ip).await {
            let retry_after_secs = retry_after_secs(remaining);
            tracing::warn!(
                email = %email,
                ip = %client_ip,
                retry_after_secs,
                "Rejected login while locked out"
            );
            return Err(ServiceError::RateLimited { retry_after_secs });
        }

        let credentials = User::find_credentials_by_email(db, &email).await?;
        let verified = match &credentials {
            Some(credentials) => {
                verify_password_async(password.to_string(), credentials.password_hash.clone())
                    .await?
            }
            None => false,
        };

        let Some(credentials) = credentials.filter(|_| verified) else {
            return Err(self.failed_login(&email, client_ip).await);
        };

        if !credentials.user.is_active {
            tracing::warn!(
                user_id = credentials.user.id,
                "Login attempt on disabled account"
            );
            return Err(ServiceError::forbidden("Account is disabled"));
        }

        self.throttle.record_success(&email, client_ip).await;
        let token = self.tokens.issue(credentials.user.id)?;
        tracing::info!(user_id = credentials.user.id, "User logged in");
        Ok(AuthResponse {
            token,
            user: credentials.user,
        })
    }

    /// Drops throttle entries that no longer hold a lock or recent failures.
    pub async fn prune_login_attempts(&self) -> usize {
        self.throttle.prune().await
    }

    async fn failed_login(&self, email: &str, client_ip: &str) -> ServiceError {
        match self.throttle.record_failure(email, client_ip).await {
            Some(window) => {
                tracing::warn!(
                    email = %email,
                    ip = %client_ip,
                    lockout_secs = window.as_secs(),
                    "Too many failed logins, locking email and address"
                );
                ServiceError::RateLimited {
                    retry_after_secs: retry_after_secs(window),
                }
            }
            None => {
                tracing::warn!(email = %email, ip = %client_ip, "Failed login attempt");
                ServiceError::Unauthorized("Invalid credentials".to_string())
            }
        }
    }

    /// Resolves a bearer token to the user it names.
    pub async fn verify(&self, db: &DatabaseConnection, token: &str) -> Result<User> {
        let user_id = self.tokens.verify_user_id(token).map_err(|err| {
            tracing::debug!(error = %err, "Rejected bearer token");
            ServiceError::Unauthorized("Invalid token".to_string())
        })?;
        User::find_by_id(db, user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))
    }

    /// Like [`AuthService::verify`], with the role read fresh from the store.
    pub async fn resolve_actor(&self, db: &DatabaseConnection, token: &str) -> Result<Actor> {
        self.verify(db, token).await.map(Actor::new)
    }
}
