use std::net::SocketAddr;

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, State, rejection::JsonRejection},
    routing::post,
};
use deployment::Deployment;
use services::services::auth::{AuthResponse, LoginRequest, RegisterRequest};

use crate::{DeploymentImpl, error::ApiError};

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let response = deployment
        .auth()
        .register(&deployment.db().pool, &payload)
        .await?;
    Ok(Json(response))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let client_ip = connect_info
        .map(|Extension(ConnectInfo(addr))| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let response = deployment
        .auth()
        .login(&deployment.db().pool, &payload, &client_ip)
        .await?;
    Ok(Json(response))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));

    Router::new().nest("/auth", inner)
}
