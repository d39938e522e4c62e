use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, put},
};
use db::models::user::User;
use deployment::Deployment;
use services::services::{
    authz::Actor,
    user::{ChangeRoleRequest, SetActiveRequest, UpdateProfileRequest},
};

use crate::{DeploymentImpl, error::ApiError, middleware::parse_model_id};

fn user_id(raw_id: &str) -> Result<i64, ApiError> {
    parse_model_id("User", raw_id)
}

pub async fn get_users(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = deployment
        .users()
        .list_users(&deployment.db().pool, &actor)
        .await?;
    Ok(Json(users))
}

pub async fn get_team_members(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<User>>, ApiError> {
    let members = deployment
        .team()
        .list_members(&deployment.db().pool, &actor)
        .await?;
    Ok(Json(members))
}

pub async fn get_available_members(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<User>>, ApiError> {
    let available = deployment
        .team()
        .list_available(&deployment.db().pool, &actor)
        .await?;
    Ok(Json(available))
}

pub async fn get_user(
    State(deployment): State<DeploymentImpl>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = deployment
        .users()
        .get_user(&deployment.db().pool, user_id(&raw_id)?)
        .await?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let user_id = user_id(&raw_id)?;
    let Json(payload) = payload?;
    let user = deployment
        .users()
        .update_profile(&deployment.db().pool, &actor, user_id, &payload)
        .await?;
    Ok(Json(user))
}

pub async fn add_team_member(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = deployment
        .team()
        .add_member(&deployment.db().pool, &actor, user_id(&raw_id)?)
        .await?;
    Ok(Json(user))
}

pub async fn remove_team_member(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = deployment
        .team()
        .remove_member(&deployment.db().pool, &actor, user_id(&raw_id)?)
        .await?;
    Ok(Json(user))
}

pub async fn change_role(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Path(raw_id): Path<String>,
    payload: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let user_id = user_id(&raw_id)?;
    let Json(payload) = payload?;
    let user = deployment
        .users()
        .change_role(&deployment.db().pool, &actor, user_id, &payload)
        .await?;
    Ok(Json(user))
}

pub async fn set_active(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Path(raw_id): Path<String>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let user_id = user_id(&raw_id)?;
    let Json(payload) = payload?;
    let user = deployment
        .users()
        .set_active(&deployment.db().pool, &actor, user_id, &payload)
        .await?;
    Ok(Json(user))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_users))
        .route("/team/members", get(get_team_members))
        .route("/available", get(get_available_members))
        .route("/{user_id}", get(get_user).put(update_profile))
        .route(
            "/{user_id}/team",
            put(add_team_member).delete(remove_team_member),
        )
        .route("/{user_id}/role", put(change_role))
        .route("/{user_id}/active", put(set_active));

    Router::new().nest("/users", inner)
}
