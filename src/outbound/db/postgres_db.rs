use crate::configuration::DatabaseSettings;
use crate::domain::repository::RepositoryError;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod credential_repo;
mod history_repo;
mod inbound_repo;
mod log_repo;
mod outbound_repo;

#[derive(Clone, Debug)]
pub struct PostgresDb {
    pool: Option<PgPool>,
}

impl PostgresDb {
    /// Connects lazily. Without a database url every read is empty and every
    /// write of messages or logs is skipped.
    pub fn new(configuration: &DatabaseSettings) -> Result<PostgresDb, anyhow::Error> {
        let pool = configuration
            .connect_options()
            .context("Invalid database url")?
            .map(|options| {
                PgPoolOptions::new()
                    .max_connections(configuration.max_connections)
                    .acquire_timeout(std::time::Duration::from_secs(2))
                    .connect_lazy_with(options)
            });
        if pool.is_none() {
            tracing::warn!("No database configured, persistence is disabled");
        }
        Ok(PostgresDb { pool })
    }

    pub fn disabled() -> PostgresDb {
        PostgresDb { pool: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> Result<&PgPool, RepositoryError> {
        self.pool.as_ref().ok_or(RepositoryError::Disabled)
    }

    /// Applies the embedded migrations. A failure is logged and startup goes on.
    #[tracing::instrument(name = "Run database migrations", skip(self))]
    pub async fn migrate(&self) {
        let Some(pool) = &self.pool else {
            return;
        };
        match sqlx::migrate!("./migrations").run(pool).await {
            Ok(()) => tracing::info!("Database migrations applied"),
            Err(e) => tracing::warn!(error.cause_chain = ?e, "Failed to apply database migrations"),
        }
    }
}
