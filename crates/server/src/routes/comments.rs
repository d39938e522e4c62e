use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use db::models::{comment::CommentWithAuthor, task::Task};
use deployment::Deployment;
use services::services::{authz::Actor, comment::CreateComment};

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_comments(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    let comments = deployment
        .comments()
        .list_comments(&deployment.db().pool, &actor, task.id)
        .await?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    payload: Result<Json<CreateComment>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentWithAuthor>), ApiError> {
    let Json(payload) = payload?;
    let comment = deployment
        .comments()
        .add_comment(&deployment.db().pool, &actor, task.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Mounted beneath a task router that has already loaded the [`Task`].
pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/comments", get(get_comments).post(add_comment))
}
