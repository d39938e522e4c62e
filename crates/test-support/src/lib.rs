//! Throwaway SQLite databases for tests that need more than one connection.

use std::path::{Path, PathBuf};

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

/// A file-backed database that is removed when dropped.
pub struct TestDb {
    dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("tasker-test-").tempdir()?;
        let path = dir.path().join("db.sqlite");
        Ok(Self { dir, path })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.to_string_lossy())
    }

    /// Opens a pool against the file and applies every migration.
    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect(self.url()).await?;
        db_migration::Migrator::up(&db, None).await?;
        Ok(db)
    }
}
