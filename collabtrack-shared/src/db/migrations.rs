/// Schema migrations
///
/// Migrations live in `migrations/` at the workspace root as reversible
/// `{version}_{name}.up.sql` / `.down.sql` pairs and are embedded into the
/// binary at compile time by `sqlx::migrate!`.
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::db::pool::{create_pool, DatabaseConfig};
/// use collabtrack_shared::db::migrations::{run_migrations, get_migration_status};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::with_url("postgresql://localhost/collabtrack")).await?;
/// run_migrations(&pool).await?;
///
/// let status = get_migration_status(&pool).await?;
/// println!("Schema version {:?}", status.latest_version);
/// # Ok(())
/// # }
/// ```

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};

/// The CollabTrack schema, embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Where the database stands relative to the embedded schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,

    pub latest_version: Option<i64>,

    /// Embedded versions not yet applied, ascending
    pub pending_versions: Vec<i64>,

    pub is_up_to_date: bool,
}

/// Versions of the embedded up-migrations, ascending
pub fn embedded_versions() -> Vec<i64> {
    MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect()
}

/// Brings the schema up to date; already-applied migrations are skipped
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let embedded = embedded_versions();
    tracing::info!(embedded = embedded.len(), latest = ?embedded.last(), "Applying schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Schema migration failed");
        e
    })?;

    tracing::info!("Schema is up to date");
    Ok(())
}

/// Compares `_sqlx_migrations` with the embedded migrations
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let tracked: bool =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await?;

    let applied: Vec<i64> = if tracked {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    let pending_versions: Vec<i64> = embedded_versions()
        .into_iter()
        .filter(|version| !applied.contains(version))
        .collect();

    let status = MigrationStatus {
        applied_migrations: applied.len(),
        latest_version: applied.last().copied(),
        is_up_to_date: tracked && pending_versions.is_empty(),
        pending_versions,
    };

    tracing::debug!(?status, "Read migration status");
    Ok(status)
}

/// Creates the database named in `database_url` when it is missing
///
/// Used by tests and local setups; production databases are provisioned
/// separately.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    tracing::info!("Creating missing database");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_ordered() {
        let versions = embedded_versions();

        assert_eq!(versions.len(), 4);
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }
}
