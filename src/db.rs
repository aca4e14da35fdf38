use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("hushzone_db")]
pub struct HushzoneDb(sqlx::PgPool);

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies pending migrations; idempotent, run once at ignition.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
