use crate::{
    entities::promo_program,
    handlers::common::{validate_input, validate_not_blank, ApiResponse, ApiResult},
    repositories::NewProgram,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_program_window"))]
#[schema(example = json!({
    "code_key": "PROMO1",
    "quota": 100,
    "period_start": "2023-01-01T00:00:00Z",
    "period_end": "2023-01-31T23:59:59Z"
}))]
pub struct CreateProgramRequest {
    /// Unique promo code
    #[validate(length(min = 1, max = 64), custom = "validate_not_blank")]
    pub code_key: String,
    /// Number of transactions the program covers
    #[validate(range(min = 0))]
    pub quota: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

fn validate_program_window(req: &CreateProgramRequest) -> Result<(), ValidationError> {
    if req.period_start > req.period_end {
        let mut err = ValidationError::new("period_window");
        err.message = Some("period_start must not be after period_end".into());
        return Err(err);
    }
    Ok(())
}

impl From<CreateProgramRequest> for NewProgram {
    fn from(req: CreateProgramRequest) -> Self {
        NewProgram {
            code_key: req.code_key.trim().to_string(),
            quota: req.quota,
            period_start: req.period_start,
            period_end: req.period_end,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/program",
    responses(
        (status = 200, description = "Programs listed", body = ApiResponse<Vec<promo_program::Model>>)
    ),
    tag = "program"
)]
pub async fn list_programs(State(state): State<AppState>) -> ApiResult<Vec<promo_program::Model>> {
    let programs = state.services.programs.list_programs().await?;
    Ok(ApiResponse::ok("Get promo program successfully", programs))
}

#[utoipa::path(
    post,
    path = "/api/v1/program",
    request_body = CreateProgramRequest,
    responses(
        (status = 201, description = "Program created", body = ApiResponse<promo_program::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "program"
)]
pub async fn create_program(
    State(state): State<AppState>,
    Json(payload): Json<CreateProgramRequest>,
) -> ApiResult<promo_program::Model> {
    validate_input(&payload)?;

    let program = state
        .services
        .programs
        .create_program(payload.into())
        .await?;
    Ok(ApiResponse::created("Create program successfully", program))
}

#[utoipa::path(
    get,
    path = "/api/v1/program/{code_key}",
    params(
        ("code_key" = String, Path, description = "Program code")
    ),
    responses(
        (status = 200, description = "Program fetched", body = ApiResponse<promo_program::Model>),
        (status = 404, description = "Program not found", body = crate::errors::ErrorResponse)
    ),
    tag = "program"
)]
pub async fn get_program(
    State(state): State<AppState>,
    Path(code_key): Path<String>,
) -> ApiResult<promo_program::Model> {
    let program = state.services.programs.get_program(&code_key).await?;
    Ok(ApiResponse::ok("Get program successfully", program))
}

#[utoipa::path(
    delete,
    path = "/api/v1/program/{code_key}",
    params(
        ("code_key" = String, Path, description = "Program code")
    ),
    responses(
        (status = 200, description = "Program soft deleted", body = ApiResponse<promo_program::Model>),
        (status = 404, description = "Program not found", body = crate::errors::ErrorResponse)
    ),
    tag = "program"
)]
pub async fn delete_program(
    State(state): State<AppState>,
    Path(code_key): Path<String>,
) -> ApiResult<promo_program::Model> {
    let program = state.services.programs.delete_program(&code_key).await?;
    Ok(ApiResponse::ok("Delete program successfully", program))
}

pub fn program_routes() -> Router<AppState> {
    Router::new()
        .route("/program", get(list_programs).post(create_program))
        .route("/program/:code_key", get(get_program).delete(delete_program))
}
