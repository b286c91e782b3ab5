use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Promo Service API",
        version = "1.0.0",
        description = r#"
# Promo Service API

Administers promo programs and their eligibility configs, and scores
transactions against them.

## Flow

1. `POST /api/v1/program` creates a program with a quota and a validity window.
2. `POST /api/v1/config` attaches quantity/amount tiers to a program.
3. `POST /api/v1/transaction` resolves the tier for a transaction, computes the
   point value and stores the outcome. Transactions that match no tier are
   stored with zero points.
4. `GET /api/v1/remain/{code}` reports how much of the quota is left.

## Responses

Successful responses use the envelope `{status_code, message, data}`. Errors
return `{error, message, request_id, timestamp}` with the matching HTTP status.
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::handlers::programs::list_programs,
        crate::handlers::programs::create_program,
        crate::handlers::programs::get_program,
        crate::handlers::programs::delete_program,
        crate::handlers::configs::list_configs,
        crate::handlers::configs::create_config,
        crate::handlers::configs::get_config,
        crate::handlers::transactions::eligible_config,
        crate::handlers::transactions::remaining_quota,
        crate::handlers::transactions::create_transaction,
    ),
    components(
        schemas(
            crate::entities::promo_program::Model,
            crate::entities::promo_config::Model,
            crate::entities::promo_transaction::Model,
            crate::handlers::programs::CreateProgramRequest,
            crate::handlers::configs::CreateConfigRequest,
            crate::handlers::transactions::EligibleConfigRequest,
            crate::handlers::transactions::CreateTransactionRequest,
            crate::services::quota::RemainingQuota,
            crate::handlers::common::ResponseMeta,
            crate::errors::ErrorResponse
        )
    ),
    tags(
        (name = "program", description = "Promo program administration"),
        (name = "config", description = "Eligibility config administration"),
        (name = "transaction", description = "Eligibility, quota and transaction scoring")
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
