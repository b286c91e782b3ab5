use crate::{
    entities::{promo_config, promo_transaction},
    errors::ServiceError,
    handlers::common::{
        validate_input, validate_not_blank, validate_positive_decimal, ApiResponse, ApiResult,
    },
    services::{promo_engine::ProcessTransaction, quota::RemainingQuota},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const ELIGIBLE_CONFIG_NOT_FOUND: &str = "Eligible config does not exist";

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "transaction_time": "2023-01-10T00:00:00Z",
    "quantity": 2,
    "act_trx": "100000",
    "promo_code": "PROMO1"
}))]
pub struct EligibleConfigRequest {
    pub transaction_time: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom = "validate_positive_decimal")]
    pub act_trx: Decimal,
    #[validate(length(min = 1), custom = "validate_not_blank")]
    pub promo_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "transaction_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
    "transaction_time": "2023-01-10T00:00:00Z",
    "customer_id": "123e4567-e89b-12d3-a456-426614174000",
    "quantity_origin": 2,
    "act_trx": "100000",
    "promo_code": "PROMO1"
}))]
pub struct CreateTransactionRequest {
    /// Caller-supplied id; submitting it twice is a conflict
    pub transaction_id: Uuid,
    pub transaction_time: DateTime<Utc>,
    pub customer_id: Uuid,
    /// Quantity before clamping to the top tier
    #[validate(range(min = 1))]
    pub quantity_origin: i32,
    #[validate(custom = "validate_positive_decimal")]
    pub act_trx: Decimal,
    #[validate(length(min = 1), custom = "validate_not_blank")]
    pub promo_code: String,
}

impl From<CreateTransactionRequest> for ProcessTransaction {
    fn from(req: CreateTransactionRequest) -> Self {
        ProcessTransaction {
            transaction_id: req.transaction_id,
            customer_id: req.customer_id,
            promo_code: req.promo_code,
            transaction_time: req.transaction_time,
            act_trx: req.act_trx,
            quantity_origin: req.quantity_origin,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/eligible",
    request_body = EligibleConfigRequest,
    responses(
        (status = 200, description = "Eligible config found", body = ApiResponse<promo_config::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "No config applies", body = crate::errors::ErrorResponse)
    ),
    tag = "transaction"
)]
pub async fn eligible_config(
    State(state): State<AppState>,
    Json(payload): Json<EligibleConfigRequest>,
) -> ApiResult<promo_config::Model> {
    validate_input(&payload)?;

    let config = state
        .services
        .configs
        .eligible_config(
            payload.quantity,
            payload.act_trx,
            payload.transaction_time,
            &payload.promo_code,
        )
        .await?
        .ok_or_else(|| ServiceError::NotFound(ELIGIBLE_CONFIG_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::ok("Get eligible promo successfully", config))
}

#[utoipa::path(
    get,
    path = "/api/v1/remain/{code}",
    params(
        ("code" = String, Path, description = "Program code")
    ),
    responses(
        (status = 200, description = "Remaining quota", body = ApiResponse<RemainingQuota>),
        (status = 404, description = "Program not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transaction"
)]
pub async fn remaining_quota(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<RemainingQuota> {
    let remaining = state.services.quota.remaining(&code).await?;
    Ok(ApiResponse::ok("Get remain quota successfully", remaining))
}

#[utoipa::path(
    post,
    path = "/api/v1/transaction",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction written", body = ApiResponse<promo_transaction::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Program not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transaction already written", body = crate::errors::ErrorResponse)
    ),
    tag = "transaction"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransactionRequest>,
) -> ApiResult<promo_transaction::Model> {
    validate_input(&payload)?;

    let transaction = state.services.engine.process(payload.into()).await?;
    Ok(ApiResponse::created(
        "Write transaction successfully",
        transaction,
    ))
}

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/eligible", post(eligible_config))
        .route("/remain/:code", get(remaining_quota))
        .route("/transaction", post(create_transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_request_rejects_non_positive_amount() {
        let req = CreateTransactionRequest {
            transaction_id: Uuid::new_v4(),
            transaction_time: Utc::now(),
            customer_id: Uuid::new_v4(),
            quantity_origin: 2,
            act_trx: dec!(0),
            promo_code: "PROMO1".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn eligible_request_rejects_blank_code() {
        let req = EligibleConfigRequest {
            transaction_time: Utc::now(),
            quantity: 1,
            act_trx: dec!(10),
            promo_code: " ".into(),
        };
        assert!(req.validate().is_err());
    }
}
