use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::config::PromoRules;
use crate::entities::promo_config::Model as ConfigModel;
use crate::errors::ServiceError;
use crate::repositories::ConfigRepository;

/// Upper-bound rule on `max_trx` for a given transaction amount.
///
/// Below the threshold a config must carry a `max_trx` strictly greater than
/// the amount. At or above it, only configs without a `max_trx` qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpperBound {
    Below(Decimal),
    Open,
}

impl UpperBound {
    pub fn for_amount(act_trx: Decimal, threshold: Decimal) -> Self {
        if act_trx < threshold {
            UpperBound::Below(act_trx)
        } else {
            UpperBound::Open
        }
    }

    /// Whether a config's `max_trx` satisfies this bound.
    pub fn admits(&self, max_trx: Option<Decimal>) -> bool {
        match (self, max_trx) {
            (UpperBound::Below(amount), Some(max)) => max > *amount,
            (UpperBound::Below(_), None) => false,
            (UpperBound::Open, max) => max.is_none(),
        }
    }
}

/// Everything a config lookup is filtered on.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityCriteria {
    pub quantity: i32,
    pub act_trx: Decimal,
    pub transaction_time: DateTime<Utc>,
    pub promo_code: String,
    pub upper_bound: UpperBound,
}

impl EligibilityCriteria {
    /// In-memory form of the repository predicate, minus program scope.
    pub fn matches_config(&self, config: &ConfigModel) -> bool {
        config.deleted_at.is_none()
            && config.quantity == self.quantity
            && config.min_trx <= self.act_trx
            && self.upper_bound.admits(config.max_trx)
    }
}

/// Picks the single config that applies to a transaction, if any.
#[derive(Clone)]
pub struct EligibilityResolver {
    configs: Arc<dyn ConfigRepository>,
    max_trx_threshold: Decimal,
}

impl EligibilityResolver {
    pub fn new(configs: Arc<dyn ConfigRepository>, rules: &PromoRules) -> Self {
        Self {
            configs,
            max_trx_threshold: rules.max_trx_threshold,
        }
    }

    pub fn criteria(
        &self,
        quantity: i32,
        act_trx: Decimal,
        transaction_time: DateTime<Utc>,
        promo_code: &str,
    ) -> EligibilityCriteria {
        EligibilityCriteria {
            quantity,
            act_trx,
            transaction_time,
            promo_code: promo_code.to_string(),
            upper_bound: UpperBound::for_amount(act_trx, self.max_trx_threshold),
        }
    }

    /// Returns the first matching config. No match is `Ok(None)`.
    pub async fn resolve(
        &self,
        quantity: i32,
        act_trx: Decimal,
        transaction_time: DateTime<Utc>,
        promo_code: &str,
    ) -> Result<Option<ConfigModel>, ServiceError> {
        let criteria = self.criteria(quantity, act_trx, transaction_time, promo_code);
        let config = self.configs.find_eligible(&criteria).await?;

        debug!(
            promo_code,
            quantity,
            act_trx = %act_trx,
            matched = config.as_ref().map(|c| c.id.to_string()),
            "eligibility resolved"
        );

        Ok(config)
    }
}
