use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::PromoRules;
use crate::entities::promo_transaction::Model as TransactionModel;
use crate::errors::ServiceError;
use crate::repositories::{NewTransaction, ProgramRepository, TransactionRepository};
use crate::services::eligibility::EligibilityResolver;

pub const PROGRAM_NOT_FOUND: &str = "Program does not exist";

/// A submitted commercial transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessTransaction {
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub promo_code: String,
    pub transaction_time: DateTime<Utc>,
    pub act_trx: Decimal,
    pub quantity_origin: i32,
}

/// Caps a requested quantity at the top tier.
pub fn clamp_quantity(quantity_origin: i32, max_quantity_tier: i32) -> i32 {
    quantity_origin.min(max_quantity_tier)
}

/// `prosentase` percent of `act_trx`, rounded half away from zero.
pub fn compute_point(prosentase: Decimal, act_trx: Decimal) -> Result<i64, ServiceError> {
    let raw = prosentase
        .checked_mul(act_trx)
        .ok_or_else(|| ServiceError::ValidationError("act_trx is too large".into()))?
        / Decimal::ONE_HUNDRED;

    raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError("point does not fit in 64 bits".into()))
}

/// Scores a transaction against its program's configs and records the result.
#[derive(Clone)]
pub struct PromoEngine {
    programs: Arc<dyn ProgramRepository>,
    transactions: Arc<dyn TransactionRepository>,
    resolver: EligibilityResolver,
    max_quantity_tier: i32,
}

impl PromoEngine {
    pub fn new(
        programs: Arc<dyn ProgramRepository>,
        transactions: Arc<dyn TransactionRepository>,
        resolver: EligibilityResolver,
        rules: &PromoRules,
    ) -> Self {
        Self {
            programs,
            transactions,
            resolver,
            max_quantity_tier: rules.max_quantity_tier,
        }
    }

    /// Clamp, check the program, resolve a config, compute and store.
    ///
    /// A missing program fails with `NotFound` before anything is written.
    /// A transaction that matches no config is still stored, with zero
    /// `prosentase` and `point`.
    #[instrument(skip(self, request), fields(transaction_id = %request.transaction_id, promo_code = %request.promo_code))]
    pub async fn process(
        &self,
        request: ProcessTransaction,
    ) -> Result<TransactionModel, ServiceError> {
        let quantity = clamp_quantity(request.quantity_origin, self.max_quantity_tier);

        if self
            .programs
            .find_by_code(&request.promo_code)
            .await?
            .is_none()
        {
            warn!("transaction references unknown program");
            counter!("promo_engine.program_not_found", 1);
            return Err(ServiceError::NotFound(PROGRAM_NOT_FOUND.to_string()));
        }

        let config = self
            .resolver
            .resolve(
                quantity,
                request.act_trx,
                request.transaction_time,
                &request.promo_code,
            )
            .await?;

        let (prosentase, point) = match &config {
            Some(config) => (
                config.prosentase,
                compute_point(config.prosentase, request.act_trx)?,
            ),
            None => (Decimal::ZERO, 0),
        };

        let stored = self
            .transactions
            .create(NewTransaction {
                transaction_id: request.transaction_id,
                transaction_time: request.transaction_time,
                customer_id: request.customer_id,
                promo_code: request.promo_code,
                quantity_origin: request.quantity_origin,
                quantity,
                act_trx: request.act_trx,
                prosentase,
                point,
            })
            .await?;

        if config.is_some() {
            counter!("promo_engine.transactions_rewarded", 1);
        } else {
            counter!("promo_engine.transactions_unrewarded", 1);
        }
        info!(quantity, prosentase = %prosentase, point, "transaction processed");

        Ok(stored)
    }
}
