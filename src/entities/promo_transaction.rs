use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Outcome of one submitted commercial transaction.
///
/// Rows are insert-only; `transaction_id` is supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "promo_transaction")]
#[schema(as = Transaction)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: Uuid,
    /// When the commercial transaction happened (matched against the program window)
    pub transaction_time: DateTime<Utc>,
    #[sea_orm(indexed)]
    pub customer_id: Uuid,
    pub promo_code: String,
    /// Quantity as requested by the caller
    pub quantity_origin: i32,
    /// Quantity after clamping to the top tier
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub act_trx: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub prosentase: Decimal,
    pub point: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }

        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
