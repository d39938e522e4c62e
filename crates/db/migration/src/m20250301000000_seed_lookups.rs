use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Ids are fixed so clients can hard-code role and status references.
const SEED_ROLES: &str = "INSERT INTO roles (id, name) VALUES \
     (1, 'admin'), \
     (2, 'team_leader'), \
     (3, 'team_member');";

const SEED_STATUSES: &str = "INSERT INTO statuses (id, name, order_index) VALUES \
     (1, 'todo', 1), \
     (2, 'in_progress', 2), \
     (3, 'review', 3), \
     (4, 'blocked', 4), \
     (5, 'done', 5);";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(SEED_ROLES).await?;
        conn.execute_unprepared(SEED_STATUSES).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared("DELETE FROM statuses WHERE id BETWEEN 1 AND 5;")
            .await?;
        conn.execute_unprepared("DELETE FROM roles WHERE id BETWEEN 1 AND 3;")
            .await?;
        Ok(())
    }
}
