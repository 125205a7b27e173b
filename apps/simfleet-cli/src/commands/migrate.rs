//! Apply database migrations

use simfleet_db::DbPool;

use crate::config::AppConfig;
use crate::error::CliResult;
use crate::output::print_success;

/// Execute the migrate command
pub async fn execute(config: AppConfig) -> CliResult<()> {
    let pool = DbPool::connect_with(&config.database_url, config.database_max_connections).await?;
    simfleet_db::run_migrations(&pool).await?;

    print_success("Database schema is up to date");
    Ok(())
}
