//! Database connection pool, migrations, and health check.
//!
//! One Postgres pool shared by the order store and the pgmq broker. The pool
//! is constructed explicitly and handed to each component; nothing here is a
//! process-wide singleton.

pub mod orders;
pub mod pgmq;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use orders::PgOrderStore;
pub use pgmq::PgmqBroker;

/// Database handle. Owns the connection pool shared across all modules.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Order store over this pool.
    pub fn order_store(&self) -> PgOrderStore {
        PgOrderStore::new(self.pool.clone())
    }

    /// Broker for the named pgmq queue over this pool. Creates the queue if
    /// it does not exist yet.
    pub async fn broker(&self, queue_name: &str) -> Result<PgmqBroker> {
        let broker = PgmqBroker::new(self.pool.clone(), queue_name)?;
        broker.create().await?;
        Ok(broker)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
