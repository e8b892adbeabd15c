// Migration orchestrator. Migrations are embedded in the binary so a plain
// container image can bring an empty database up to the current schema.

pub mod diesel;

use crate::db::DieselPool;
use std::error::Error;
use tracing::info;

/// Whether embedded migrations should run at startup. Deployments that manage
/// the schema externally set DISABLE_EMBEDDED_MIGRATIONS=true.
pub fn should_run_migrations() -> bool {
    !crate::app_config::config().disable_embedded_migrations
}

/// Run every pending migration, returning how many were applied.
pub async fn run_all_migrations(
    diesel_pool: &DieselPool,
) -> Result<usize, Box<dyn Error + Send + Sync>> {
    info!("[MIGRATIONS] Starting migration process...");

    let applied = diesel::run_migrations(diesel_pool).await?;

    if applied > 0 {
        info!("[MIGRATIONS] ✓ Applied {} migrations", applied);
    } else {
        info!("[MIGRATIONS] ✓ Schema up to date");
    }

    Ok(applied)
}
