use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::promo_program::{
    ActiveModel as ProgramActiveModel, Column, Entity as PromoProgram, Model as ProgramModel,
};
use crate::errors::ServiceError;
use crate::repositories::{ProgramRepository, Repository};

use super::BaseRepository;

/// Fields required to create a program.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProgram {
    pub code_key: String,
    pub quota: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// sea-orm backed program storage
#[derive(Debug, Clone)]
pub struct SeaOrmProgramRepository {
    base: BaseRepository,
}

impl SeaOrmProgramRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ProgramRepository for SeaOrmProgramRepository {
    async fn create(&self, program: NewProgram) -> Result<ProgramModel, ServiceError> {
        let active = ProgramActiveModel {
            id: Set(Uuid::new_v4()),
            code_key: Set(program.code_key.clone()),
            quota: Set(program.quota),
            period_start: Set(program.period_start),
            period_end: Set(program.period_end),
            deleted_at: Set(None),
            ..Default::default()
        };

        let created = active.insert(self.base.get_db()).await.map_err(|e| {
            ServiceError::from_insert_error(e, format!("Program {} already exists", program.code_key))
        })?;

        info!(program_id = %created.id, code_key = %created.code_key, "program created");
        Ok(created)
    }

    async fn find_all(&self) -> Result<Vec<ProgramModel>, ServiceError> {
        PromoProgram::find()
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_by_code(&self, code_key: &str) -> Result<Option<ProgramModel>, ServiceError> {
        debug!(code_key, "looking up program");
        PromoProgram::find()
            .filter(Column::CodeKey.eq(code_key))
            .filter(Column::DeletedAt.is_null())
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn soft_delete(&self, code_key: &str) -> Result<Option<ProgramModel>, ServiceError> {
        let Some(existing) = self.find_by_code(code_key).await? else {
            return Ok(None);
        };

        let mut active: ProgramActiveModel = existing.into();
        active.deleted_at = Set(Some(Utc::now()));

        let deleted = active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)?;

        info!(program_id = %deleted.id, code_key, "program soft deleted");
        Ok(Some(deleted))
    }
}

impl Repository for SeaOrmProgramRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
