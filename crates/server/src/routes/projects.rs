use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, put},
};
use db::models::project::{CreateProject, Project, ProjectWithProgress};
use deployment::Deployment;
use serde::Serialize;
use services::services::authz::Actor;
use ts_rs::TS;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

#[derive(Debug, Serialize, TS)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ProjectWithProgress>>, ApiError> {
    let projects = deployment
        .projects()
        .list_projects(&deployment.db().pool, &actor)
        .await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
) -> Result<Json<ProjectWithProgress>, ApiError> {
    let project = deployment
        .projects()
        .get_project(&deployment.db().pool, &actor, project.id)
        .await?;
    Ok(Json(project))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(payload) = payload?;
    let project = deployment
        .projects()
        .create_project(&deployment.db().pool, &actor, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn complete_project(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
) -> Result<Json<Project>, ApiError> {
    let project = deployment
        .projects()
        .complete_project(&deployment.db().pool, &actor, project.id)
        .await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
) -> Result<Json<MessageResponse>, ApiError> {
    deployment
        .projects()
        .delete_project(&deployment.db().pool, &actor, project.id)
        .await?;
    Ok(Json(MessageResponse::new("Project deleted successfully")))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route("/", get(get_project).delete(delete_project))
        .route("/complete", put(complete_project))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", inner)
}
