use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Condition, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::promo_config::{
    self, ActiveModel as ConfigActiveModel, Column, Entity as PromoConfig, Model as ConfigModel,
};
use crate::entities::promo_program;
use crate::errors::ServiceError;
use crate::repositories::{ConfigRepository, Repository};
use crate::services::eligibility::{EligibilityCriteria, UpperBound};

use super::BaseRepository;

/// Fields required to attach a config to an existing program.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConfig {
    pub program_id: Uuid,
    pub quantity: i32,
    pub min_trx: Decimal,
    pub max_trx: Option<Decimal>,
    pub prosentase: Decimal,
}

/// sea-orm backed config storage
#[derive(Debug, Clone)]
pub struct SeaOrmConfigRepository {
    base: BaseRepository,
}

impl SeaOrmConfigRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

/// Translates the criteria into a single `WHERE` over `promo_config` joined
/// with its program.
pub(crate) fn eligibility_condition(criteria: &EligibilityCriteria) -> Condition {
    let base = Condition::all()
        .add(Column::Quantity.eq(criteria.quantity))
        .add(Column::MinTrx.lte(criteria.act_trx))
        .add(Column::DeletedAt.is_null())
        .add(promo_program::Column::CodeKey.eq(criteria.promo_code.as_str()))
        .add(promo_program::Column::PeriodStart.lte(criteria.transaction_time))
        .add(promo_program::Column::PeriodEnd.gte(criteria.transaction_time))
        .add(promo_program::Column::DeletedAt.is_null());

    match criteria.upper_bound {
        UpperBound::Below(amount) => base
            .add(Column::MaxTrx.is_not_null())
            .add(Column::MaxTrx.gt(amount)),
        UpperBound::Open => base.add(Column::MaxTrx.is_null()),
    }
}

#[async_trait]
impl ConfigRepository for SeaOrmConfigRepository {
    async fn create(&self, config: NewConfig) -> Result<ConfigModel, ServiceError> {
        let active = ConfigActiveModel {
            id: Set(Uuid::new_v4()),
            quantity: Set(config.quantity),
            min_trx: Set(config.min_trx),
            max_trx: Set(config.max_trx),
            prosentase: Set(config.prosentase),
            program_id: Set(config.program_id),
            deleted_at: Set(None),
            ..Default::default()
        };

        let created = active
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)?;

        info!(
            config_id = %created.id,
            program_id = %created.program_id,
            quantity = created.quantity,
            "config created"
        );
        Ok(created)
    }

    async fn find_all(&self) -> Result<Vec<ConfigModel>, ServiceError> {
        PromoConfig::find()
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ConfigModel>, ServiceError> {
        PromoConfig::find_by_id(id)
            .filter(Column::DeletedAt.is_null())
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_eligible(
        &self,
        criteria: &EligibilityCriteria,
    ) -> Result<Option<ConfigModel>, ServiceError> {
        debug!(
            promo_code = %criteria.promo_code,
            quantity = criteria.quantity,
            act_trx = %criteria.act_trx,
            upper_bound = ?criteria.upper_bound,
            "querying eligible config"
        );

        PromoConfig::find()
            .join(JoinType::InnerJoin, promo_config::Relation::Program.def())
            .filter(eligibility_condition(criteria))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }
}

impl Repository for SeaOrmConfigRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
