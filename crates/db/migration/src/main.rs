use sea_orm_migration::cli;

#[tokio::main]
async fn main() {
    // DATABASE_URL may live in the same .env file the server reads.
    dotenv::dotenv().ok();
    cli::run_cli(db_migration::Migrator).await;
}
