pub mod common;
pub mod configs;
pub mod health;
pub mod programs;
pub mod transactions;

use crate::config::PromoRules;
use crate::db::DbPool;
use crate::repositories::{
    ConfigRepository, ProgramRepository, SeaOrmConfigRepository, SeaOrmProgramRepository,
    SeaOrmTransactionRepository, TransactionRepository,
};
use crate::services::{
    ConfigService, EligibilityResolver, ProgramService, PromoEngine, QuotaCalculator,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub programs: Arc<ProgramService>,
    pub configs: Arc<ConfigService>,
    pub engine: Arc<PromoEngine>,
    pub quota: Arc<QuotaCalculator>,
}

impl AppServices {
    /// Wires the sea-orm repositories into every service.
    pub fn new(db_pool: Arc<DbPool>, rules: &PromoRules) -> Self {
        let programs: Arc<dyn ProgramRepository> =
            Arc::new(SeaOrmProgramRepository::new(db_pool.clone()));
        let configs: Arc<dyn ConfigRepository> =
            Arc::new(SeaOrmConfigRepository::new(db_pool.clone()));
        let transactions: Arc<dyn TransactionRepository> =
            Arc::new(SeaOrmTransactionRepository::new(db_pool));

        Self::from_repositories(programs, configs, transactions, rules)
    }

    pub fn from_repositories(
        programs: Arc<dyn ProgramRepository>,
        configs: Arc<dyn ConfigRepository>,
        transactions: Arc<dyn TransactionRepository>,
        rules: &PromoRules,
    ) -> Self {
        let resolver = EligibilityResolver::new(configs.clone(), rules);

        Self {
            programs: Arc::new(ProgramService::new(programs.clone())),
            configs: Arc::new(ConfigService::new(
                programs.clone(),
                configs,
                resolver.clone(),
                rules,
            )),
            engine: Arc::new(PromoEngine::new(
                programs.clone(),
                transactions.clone(),
                resolver,
                rules,
            )),
            quota: Arc::new(QuotaCalculator::new(programs, transactions)),
        }
    }
}
