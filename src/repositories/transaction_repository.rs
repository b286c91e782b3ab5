use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::entities::promo_transaction::{
    ActiveModel as TransactionActiveModel, Column, Entity as PromoTransaction,
    Model as TransactionModel,
};
use crate::errors::ServiceError;
use crate::repositories::{Repository, TransactionRepository};

use super::BaseRepository;

/// A fully computed transaction outcome, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub transaction_id: Uuid,
    pub transaction_time: DateTime<Utc>,
    pub customer_id: Uuid,
    pub promo_code: String,
    pub quantity_origin: i32,
    pub quantity: i32,
    pub act_trx: Decimal,
    pub prosentase: Decimal,
    pub point: i64,
}

/// sea-orm backed transaction storage
#[derive(Debug, Clone)]
pub struct SeaOrmTransactionRepository {
    base: BaseRepository,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn create(&self, transaction: NewTransaction) -> Result<TransactionModel, ServiceError> {
        let transaction_id = transaction.transaction_id;
        let active = TransactionActiveModel {
            transaction_id: Set(transaction.transaction_id),
            transaction_time: Set(transaction.transaction_time),
            customer_id: Set(transaction.customer_id),
            promo_code: Set(transaction.promo_code),
            quantity_origin: Set(transaction.quantity_origin),
            quantity: Set(transaction.quantity),
            act_trx: Set(transaction.act_trx),
            prosentase: Set(transaction.prosentase),
            point: Set(transaction.point),
            ..Default::default()
        };

        let created = active.insert(self.base.get_db()).await.map_err(|e| {
            ServiceError::from_insert_error(
                e,
                format!("Transaction {} already exists", transaction_id),
            )
        })?;

        info!(
            transaction_id = %created.transaction_id,
            promo_code = %created.promo_code,
            point = created.point,
            "transaction stored"
        );
        Ok(created)
    }

    async fn count_by_promo_code(&self, promo_code: &str) -> Result<i64, ServiceError> {
        let total = PromoTransaction::find()
            .filter(Column::PromoCode.eq(promo_code))
            .count(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)?;

        i64::try_from(total)
            .map_err(|_| ServiceError::InternalError("transaction count overflow".into()))
    }
}

impl Repository for SeaOrmTransactionRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
