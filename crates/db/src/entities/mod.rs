pub mod comment;
pub mod project;
pub mod role;
pub mod status;
pub mod status_log;
pub mod task;
pub mod user;
