use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use db::models::{
    project::Project,
    status::Status,
    status_log::StatusLogEntry,
    task::{CreateTask, Task, TaskWithDetails, UpdateTask},
};
use deployment::Deployment;
use services::services::{
    authz::Actor,
    task::{ChangeStatusRequest, StatusChange},
};

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{load_project_middleware, load_task_middleware},
    routes::{comments, projects::MessageResponse},
};

pub async fn get_statuses(
    State(deployment): State<DeploymentImpl>,
) -> Result<Json<Vec<Status>>, ApiError> {
    let statuses = deployment.tasks().statuses(&deployment.db().pool).await?;
    Ok(Json(statuses))
}

pub async fn get_assigned_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<TaskWithDetails>>, ApiError> {
    let tasks = deployment
        .tasks()
        .list_assigned(&deployment.db().pool, &actor)
        .await?;
    Ok(Json(tasks))
}

pub async fn get_project_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(project): Extension<Project>,
) -> Result<Json<Vec<TaskWithDetails>>, ApiError> {
    let tasks = deployment
        .tasks()
        .list_for_project(&deployment.db().pool, project.id)
        .await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(project): Extension<Project>,
    payload: Result<Json<CreateTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(payload) = payload?;
    let task = deployment
        .tasks()
        .create_task(&deployment.db().pool, &actor, project.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Extension(task): Extension<Task>,
) -> Result<Json<TaskWithDetails>, ApiError> {
    let task = deployment
        .tasks()
        .get_task(&deployment.db().pool, task.id)
        .await?;
    Ok(Json(task))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    payload: Result<Json<UpdateTask>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(payload) = payload?;
    let task = deployment
        .tasks()
        .update_task(&deployment.db().pool, &actor, task.id, payload)
        .await?;
    Ok(Json(task))
}

pub async fn change_status(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
    payload: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Json<StatusChange>, ApiError> {
    let Json(payload) = payload?;
    let change = deployment
        .tasks()
        .change_status(&deployment.db().pool, &actor, task.id, &payload)
        .await?;
    Ok(Json(change))
}

pub async fn get_status_logs(
    State(deployment): State<DeploymentImpl>,
    Extension(task): Extension<Task>,
) -> Result<Json<Vec<StatusLogEntry>>, ApiError> {
    let logs = deployment
        .tasks()
        .status_logs(&deployment.db().pool, task.id)
        .await?;
    Ok(Json(logs))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(actor): Extension<Actor>,
    Extension(task): Extension<Task>,
) -> Result<Json<MessageResponse>, ApiError> {
    deployment
        .tasks()
        .delete_task(&deployment.db().pool, &actor, task.id)
        .await?;
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/status", post(change_status))
        .route("/status_logs", get(get_status_logs))
        .merge(comments::router())
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware::<DeploymentImpl>));

    let project_tasks_router = Router::new()
        .route("/", get(get_project_tasks).post(create_task))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/statuses", get(get_statuses))
        .route("/assigned", get(get_assigned_tasks))
        .nest("/projects/{project_id}/tasks", project_tasks_router)
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
