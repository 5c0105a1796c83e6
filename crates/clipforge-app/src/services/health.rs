//! [`HealthProbe`] backed by a lightweight database round trip.

use clipforge_api::HealthProbe;
use clipforge_core::{DomainError, DomainResult};
use clipforge_data::Database;

pub(crate) struct HealthProbeService {
    database: Database,
}

impl HealthProbeService {
    pub(crate) const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait::async_trait]
impl HealthProbe for HealthProbeService {
    async fn check(&self) -> DomainResult<()> {
        sqlx::query("SELECT 1")
            .execute(self.database.pool())
            .await
            .map(|_| ())
            .map_err(|error| DomainError::PersistenceFailure(error.to_string()))
    }
}
