pub mod auth;
pub mod authz;
pub mod comment;
pub mod config;
pub mod error;
pub mod login_throttle;
pub mod password;
pub mod project;
pub mod task;
pub mod team;
pub mod user;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_utils;
