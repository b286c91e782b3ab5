use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PromoRules;
use crate::entities::promo_config::Model as ConfigModel;
use crate::errors::ServiceError;
use crate::repositories::{ConfigRepository, NewConfig, ProgramRepository};
use crate::services::eligibility::EligibilityResolver;
use crate::services::promo_engine::{clamp_quantity, PROGRAM_NOT_FOUND};

pub const CONFIG_NOT_FOUND: &str = "Config does not exist";

/// Config creation input, keyed by the owning program's code.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateConfig {
    pub code_key: String,
    pub quantity: i32,
    pub min_trx: Decimal,
    pub max_trx: Option<Decimal>,
    pub prosentase: Decimal,
}

/// Config administration plus the read-only eligibility preview.
#[derive(Clone)]
pub struct ConfigService {
    programs: Arc<dyn ProgramRepository>,
    configs: Arc<dyn ConfigRepository>,
    resolver: EligibilityResolver,
    max_quantity_tier: i32,
}

impl ConfigService {
    pub fn new(
        programs: Arc<dyn ProgramRepository>,
        configs: Arc<dyn ConfigRepository>,
        resolver: EligibilityResolver,
        rules: &PromoRules,
    ) -> Self {
        Self {
            programs,
            configs,
            resolver,
            max_quantity_tier: rules.max_quantity_tier,
        }
    }

    pub async fn create_config(&self, input: CreateConfig) -> Result<ConfigModel, ServiceError> {
        if let Some(max_trx) = input.max_trx {
            if max_trx < input.min_trx {
                return Err(ServiceError::ValidationError(
                    "max_trx must not be below min_trx".into(),
                ));
            }
        }

        let program = self
            .programs
            .find_by_code(&input.code_key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PROGRAM_NOT_FOUND.to_string()))?;

        self.configs
            .create(NewConfig {
                program_id: program.id,
                quantity: input.quantity,
                min_trx: input.min_trx,
                max_trx: input.max_trx,
                prosentase: input.prosentase,
            })
            .await
    }

    pub async fn list_configs(&self) -> Result<Vec<ConfigModel>, ServiceError> {
        self.configs.find_all().await
    }

    pub async fn get_config(&self, id: Uuid) -> Result<ConfigModel, ServiceError> {
        self.configs
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(CONFIG_NOT_FOUND.to_string()))
    }

    /// The config a transaction with these values would get, without storing
    /// anything. Quantity is clamped the same way as during processing.
    pub async fn eligible_config(
        &self,
        quantity: i32,
        act_trx: Decimal,
        transaction_time: DateTime<Utc>,
        promo_code: &str,
    ) -> Result<Option<ConfigModel>, ServiceError> {
        let quantity = clamp_quantity(quantity, self.max_quantity_tier);
        self.resolver
            .resolve(quantity, act_trx, transaction_time, promo_code)
            .await
    }
}
