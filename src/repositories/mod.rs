use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{promo_config, promo_program, promo_transaction};
use crate::errors::ServiceError;
use crate::services::eligibility::EligibilityCriteria;

pub mod config_repository;
pub mod program_repository;
pub mod transaction_repository;

pub use config_repository::{NewConfig, SeaOrmConfigRepository};
pub use program_repository::{NewProgram, SeaOrmProgramRepository};
pub use transaction_repository::{NewTransaction, SeaOrmTransactionRepository};

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Storage for programs. Soft-deleted rows are invisible to every read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    async fn create(&self, program: NewProgram) -> Result<promo_program::Model, ServiceError>;

    async fn find_all(&self) -> Result<Vec<promo_program::Model>, ServiceError>;

    async fn find_by_code(
        &self,
        code_key: &str,
    ) -> Result<Option<promo_program::Model>, ServiceError>;

    /// Marks the program deleted. `None` when no live program has that code.
    async fn soft_delete(
        &self,
        code_key: &str,
    ) -> Result<Option<promo_program::Model>, ServiceError>;
}

/// Storage for eligibility configs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn create(&self, config: NewConfig) -> Result<promo_config::Model, ServiceError>;

    async fn find_all(&self) -> Result<Vec<promo_config::Model>, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<promo_config::Model>, ServiceError>;

    /// First config matching `criteria`, oldest first.
    async fn find_eligible(
        &self,
        criteria: &EligibilityCriteria,
    ) -> Result<Option<promo_config::Model>, ServiceError>;
}

/// Insert-only storage for processed transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Fails with `Conflict` when `transaction_id` already exists.
    async fn create(
        &self,
        transaction: NewTransaction,
    ) -> Result<promo_transaction::Model, ServiceError>;

    async fn count_by_promo_code(&self, promo_code: &str) -> Result<i64, ServiceError>;
}
