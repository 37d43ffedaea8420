// db/db.rs
use sqlx::{Pool, Postgres};

use super::error::StoreError;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("size", &self.pool.size())
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("✅ Database migrations applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/20240601000000_job_lifecycle.sql");

    #[test]
    fn user_ids_do_not_require_a_profile() {
        assert!(!SCHEMA.contains("REFERENCES profiles"));
        assert!(SCHEMA.contains("job_id UUID NOT NULL REFERENCES jobs(id)"));
    }
}
