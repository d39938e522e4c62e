use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use secrecy::ExposeSecret;
use services::services::{
    auth::AuthService, comment::CommentService, config::Config, login_throttle::LoginThrottle,
    project::ProjectService, task::TaskService, team::TeamService, user::UserService,
};
use utils_jwt::TokenCodec;

const LOGIN_PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    auth: AuthService,
    projects: ProjectService,
    tasks: TaskService,
    team: TeamService,
    users: UserService,
    comments: CommentService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        Self::from_config(Config::from_env()).await
    }

    fn config(&self) -> &Arc<Config> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn projects(&self) -> &ProjectService {
        &self.projects
    }

    fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    fn team(&self) -> &TeamService {
        &self.team
    }

    fn users(&self) -> &UserService {
        &self.users
    }

    fn comments(&self) -> &CommentService {
        &self.comments
    }
}

impl LocalDeployment {
    /// Connects to `config.database_url`, applies migrations and wires the
    /// services. Login attempts are tracked in process memory.
    pub async fn from_config(config: Config) -> Result<Self, DeploymentError> {
        let auth = Self::build_auth(&config)?;
        let db = DBService::new(&config.database_url).await?;
        tracing::info!(
            max_attempts = config.login.max_attempts,
            lockout_secs = config.login.lockout.as_secs(),
            token_ttl_secs = config.jwt_expires_in.as_secs(),
            "Deployment ready"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            auth,
            projects: ProjectService::new(),
            tasks: TaskService::new(),
            team: TeamService::new(),
            users: UserService::new(),
            comments: CommentService::new(),
        })
    }

    /// Periodically drops login throttle entries that have gone idle.
    pub fn spawn_login_prune(&self) -> tokio::task::JoinHandle<()> {
        let auth = self.auth.clone();
        let mut prune_interval = tokio::time::interval(LOGIN_PRUNE_INTERVAL);
        tokio::spawn(async move {
            loop {
                prune_interval.tick().await;
                let removed = auth.prune_login_attempts().await;
                if removed > 0 {
                    tracing::debug!(removed, "Pruned idle login attempts");
                }
            }
        })
    }

    fn build_auth(config: &Config) -> Result<AuthService, DeploymentError> {
        let ttl = chrono::Duration::from_std(config.jwt_expires_in)
            .map_err(|e| DeploymentError::Config(format!("JWT_EXPIRES_IN: {e}")))?;
        let tokens = TokenCodec::new(config.jwt_secret.expose_secret().as_bytes(), ttl);
        Ok(AuthService::new(
            tokens,
            LoginThrottle::in_memory(&config.login),
        ))
    }
}

#[cfg(test)]
mod tests {
    use services::services::config::Config;
    use test_support::TestDb;

    use super::*;

    #[tokio::test]
    async fn from_config_migrates_and_seeds_lookups() {
        let test_db = TestDb::new().unwrap();
        let config = Config {
            database_url: test_db.url(),
            ..Config::default()
        };

        let deployment = LocalDeployment::from_config(config).await.unwrap();
        let statuses = deployment
            .tasks()
            .statuses(&deployment.db().pool)
            .await
            .unwrap();
        assert_eq!(statuses.len(), 5);
        assert_eq!(deployment.config().port, 4000);
    }

    #[tokio::test]
    async fn login_prune_runs_until_aborted() {
        let test_db = TestDb::new().unwrap();
        let config = Config {
            database_url: test_db.url(),
            ..Config::default()
        };
        let deployment = LocalDeployment::from_config(config).await.unwrap();

        let handle = deployment.spawn_login_prune();
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn unreachable_database_is_a_deployment_error() {
        let config = Config {
            database_url: "sqlite:///definitely/missing/dir/db.sqlite".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            LocalDeployment::from_config(config).await,
            Err(DeploymentError::Database(_))
        ));
    }
}
