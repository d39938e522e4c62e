use std::fmt::Display;

use db::DbErr;
use sea_orm::DatabaseTransaction;
use thiserror::Error;
use utils_jwt::JwtError;

use super::password::PasswordError;

/// Failure taxonomy shared by every domain service. Each variant maps to a
/// single HTTP status at the API edge.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Too many failed login attempts. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(
        "Cannot complete project with {count} undone task{}. All tasks must be completed first.",
        plural_suffix(.count)
    )]
    IncompleteTasks { count: u64 },
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn plural_suffix(count: &u64) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Rolls `tx` back and hands `err` back to the caller. A failing rollback is
/// only logged so the error that aborted the transaction is the one reported.
pub(crate) async fn rollback<E: Display>(tx: DatabaseTransaction, err: E) -> E {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(
            error = %err,
            rollback_error = %rollback_err,
            "Transaction rollback failed"
        );
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_tasks_message_counts_tasks() {
        assert_eq!(
            ServiceError::IncompleteTasks { count: 1 }.to_string(),
            "Cannot complete project with 1 undone task. All tasks must be completed first."
        );
        assert_eq!(
            ServiceError::IncompleteTasks { count: 3 }.to_string(),
            "Cannot complete project with 3 undone tasks. All tasks must be completed first."
        );
    }
}
