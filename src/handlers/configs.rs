use crate::{
    entities::promo_config,
    handlers::common::{
        validate_input, validate_non_negative_decimal, validate_not_blank, validate_percentage,
        validate_positive_decimal, ApiResponse, ApiResult,
    },
    services::configs::CreateConfig,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_trx_range"))]
#[schema(example = json!({
    "code_key": "PROMO1",
    "quantity": 2,
    "min_trx": "50000",
    "max_trx": "200000",
    "prosentase": "5"
}))]
pub struct CreateConfigRequest {
    /// Code of the owning program
    #[validate(length(min = 1), custom = "validate_not_blank")]
    pub code_key: String,
    /// Quantity tier the config applies to
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative_decimal")]
    pub min_trx: Decimal,
    /// Omit for the open-ended top tier
    #[serde(default)]
    #[validate(custom = "validate_positive_decimal")]
    pub max_trx: Option<Decimal>,
    /// Discount percentage
    #[validate(custom = "validate_percentage")]
    pub prosentase: Decimal,
}

fn validate_trx_range(req: &CreateConfigRequest) -> Result<(), ValidationError> {
    match req.max_trx {
        Some(max) if max < req.min_trx => {
            let mut err = ValidationError::new("trx_range");
            err.message = Some("max_trx must not be below min_trx".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl From<CreateConfigRequest> for CreateConfig {
    fn from(req: CreateConfigRequest) -> Self {
        CreateConfig {
            code_key: req.code_key,
            quantity: req.quantity,
            min_trx: req.min_trx,
            max_trx: req.max_trx,
            prosentase: req.prosentase,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/config",
    responses(
        (status = 200, description = "Configs listed", body = ApiResponse<Vec<promo_config::Model>>)
    ),
    tag = "config"
)]
pub async fn list_configs(State(state): State<AppState>) -> ApiResult<Vec<promo_config::Model>> {
    let configs = state.services.configs.list_configs().await?;
    Ok(ApiResponse::ok("Get promo config successfully", configs))
}

#[utoipa::path(
    post,
    path = "/api/v1/config",
    request_body = CreateConfigRequest,
    responses(
        (status = 201, description = "Config created", body = ApiResponse<promo_config::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Program not found", body = crate::errors::ErrorResponse)
    ),
    tag = "config"
)]
pub async fn create_config(
    State(state): State<AppState>,
    Json(payload): Json<CreateConfigRequest>,
) -> ApiResult<promo_config::Model> {
    validate_input(&payload)?;

    let config = state.services.configs.create_config(payload.into()).await?;
    Ok(ApiResponse::created("Create promo config successfully", config))
}

#[utoipa::path(
    get,
    path = "/api/v1/config/{id}",
    params(
        ("id" = Uuid, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Config fetched", body = ApiResponse<promo_config::Model>),
        (status = 404, description = "Config not found", body = crate::errors::ErrorResponse)
    ),
    tag = "config"
)]
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<promo_config::Model> {
    let config = state.services.configs.get_config(id).await?;
    Ok(ApiResponse::ok("Get promo config successfully", config))
}

pub fn config_routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(list_configs).post(create_config))
        .route("/config/:id", get(get_config))
}
