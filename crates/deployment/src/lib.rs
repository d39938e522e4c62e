use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    auth::AuthService, comment::CommentService, config::Config, project::ProjectService,
    task::TaskService, team::TeamService, user::UserService,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs, bundled behind one cheaply cloned
/// handle.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<Config>;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    fn projects(&self) -> &ProjectService;

    fn tasks(&self) -> &TaskService;

    fn team(&self) -> &TeamService;

    fn users(&self) -> &UserService;

    fn comments(&self) -> &CommentService;
}
