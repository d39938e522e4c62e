use chrono::NaiveDate;
use db::{
    models::{
        project::{CreateProject, Project},
        role::Role,
        task::{CreateTask, Task},
        user::{CreateUser, User},
    },
    types::RoleName,
};
use sea_orm::DatabaseConnection;
use test_support::TestDb;

use super::authz::Actor;

/// Keeps the temp dir alive for as long as the connection is in use.
pub(crate) struct TestContext {
    _test_db: TestDb,
    pub db: DatabaseConnection,
}

pub(crate) async fn setup() -> TestContext {
    let test_db = TestDb::new().expect("create temp dir");
    let db = test_db.connect().await.expect("connect and migrate");
    TestContext {
        _test_db: test_db,
        db,
    }
}

pub(crate) async fn seed_user(db: &DatabaseConnection, name: &str, role: RoleName) -> Actor {
    let role_id = Role::id_for(db, role).await.expect("seeded role");
    let user = User::create(
        db,
        &CreateUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            password_hash: "not-a-real-hash".to_string(),
            role_id,
        },
    )
    .await
    .expect("insert user");
    Actor::new(user)
}

pub(crate) async fn claim(db: &DatabaseConnection, leader: &Actor, member: &Actor) -> Actor {
    let user = User::set_team_leader(db, member.id(), Some(leader.id()))
        .await
        .expect("claim member");
    Actor::new(user)
}

pub(crate) async fn seed_project(db: &DatabaseConnection, owner: &Actor, name: &str) -> Project {
    Project::create(
        db,
        &CreateProject {
            name: name.to_string(),
            description: None,
            start_date: None,
            due_date: NaiveDate::from_ymd_opt(2030, 1, 1),
        },
        owner.id(),
    )
    .await
    .expect("insert project")
}

pub(crate) async fn seed_task(
    db: &DatabaseConnection,
    project: &Project,
    reporter: &Actor,
    assignee: Option<&Actor>,
) -> Task {
    let todo = db::models::status::Status::id_for(db, db::types::TaskStatus::Todo)
        .await
        .expect("seeded status");
    Task::create(
        db,
        project.id,
        reporter.id(),
        "Seeded task",
        todo,
        &CreateTask {
            assignee_id: assignee.map(Actor::id),
            ..Default::default()
        },
    )
    .await
    .expect("insert task")
}
