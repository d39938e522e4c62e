use std::{fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        db::types::RoleName::decl(),
        db::types::TaskStatus::decl(),
        db::types::TaskPriority::decl(),
        db::types::ProjectStatus::decl(),
        db::models::user::User::decl(),
        db::models::role::Role::decl(),
        db::models::status::Status::decl(),
        db::models::project::Project::decl(),
        db::models::project::ProjectWithProgress::decl(),
        db::models::project::CreateProject::decl(),
        db::models::task::Task::decl(),
        db::models::task::TaskWithDetails::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::status_log::StatusLog::decl(),
        db::models::status_log::StatusLogEntry::decl(),
        db::models::comment::Comment::decl(),
        db::models::comment::CommentWithAuthor::decl(),
        services::services::auth::RegisterRequest::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::AuthResponse::decl(),
        services::services::task::ChangeStatusRequest::decl(),
        services::services::task::StatusChange::decl(),
        services::services::comment::CreateComment::decl(),
        services::services::user::UpdateProfileRequest::decl(),
        services::services::user::ChangeRoleRequest::decl(),
        services::services::user::SetActiveRequest::decl(),
        server::routes::health::HealthResponse::decl(),
        server::routes::projects::MessageResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            let trimmed = decl.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit it manually.\n\n{body}\n"
    )
}

fn main() -> anyhow::Result<()> {
    let check_mode = std::env::args().any(|arg| arg == "--check");
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date.");
            return Ok(());
        }
        eprintln!("shared/types.ts is out of date. Run `cargo run --bin generate_types`.");
        std::process::exit(1);
    }

    fs::create_dir_all(&shared_path)?;
    fs::write(&types_path, generated)?;
    println!("Wrote {}", types_path.display());
    Ok(())
}
