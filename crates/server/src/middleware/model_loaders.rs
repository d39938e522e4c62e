use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{project::Project, task::Task},
};
use deployment::Deployment;

use crate::error::ApiError;

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

/// Path ids are positive integers; anything else is a 400 rather than axum's
/// plain-text path rejection.
pub fn parse_model_id(model_name: &'static str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {} ID", model_name.to_lowercase())))
}

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!("{model_name} {model_id} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("Failed to fetch {model_name}")))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_error(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_project_middleware<S>(
    State(deployment): State<S>,
    Path(raw_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let project_id = parse_model_id("Project", &raw_id)?;
    load_request_extension(
        request,
        next,
        "Project",
        project_id,
        Project::find_by_id(&deployment.db_service().pool, project_id),
    )
    .await
}

pub async fn load_task_middleware<S>(
    State(deployment): State<S>,
    Path(raw_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let task_id = parse_model_id("Task", &raw_id)?;
    load_request_extension(
        request,
        next,
        "Task",
        task_id,
        Task::find_by_id(&deployment.db_service().pool, task_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::{fetch_model_or_error, parse_model_id};
    use crate::error::ApiError;

    #[test]
    fn parse_model_id_rejects_non_numeric_ids() {
        assert_eq!(parse_model_id("Task", "42").unwrap(), 42);
        let err = parse_model_id("Task", "abc").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg == "Invalid task ID"));
        assert!(parse_model_id("Project", "0").is_err());
        assert!(parse_model_id("Project", "-3").is_err());
    }

    #[tokio::test]
    async fn fetch_model_or_error_returns_not_found_on_missing_model() {
        let result =
            fetch_model_or_error::<String, &'static str, _>("Project", 7, async { Ok(None) }).await;

        assert!(matches!(result, Err(ApiError::NotFound(ref msg)) if msg == "Project not found"));
    }

    #[tokio::test]
    async fn fetch_model_or_error_returns_internal_error_on_fetch_failure() {
        let result = fetch_model_or_error::<String, &'static str, _>("Project", 7, async {
            Err("db unavailable")
        })
        .await;

        assert!(matches!(result, Err(ApiError::Internal(_))));
    }
}
