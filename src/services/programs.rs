use std::sync::Arc;
use tracing::info;

use crate::entities::promo_program::Model as ProgramModel;
use crate::errors::ServiceError;
use crate::repositories::{NewProgram, ProgramRepository};
use crate::services::promo_engine::PROGRAM_NOT_FOUND;

/// Program administration.
#[derive(Clone)]
pub struct ProgramService {
    programs: Arc<dyn ProgramRepository>,
}

impl ProgramService {
    pub fn new(programs: Arc<dyn ProgramRepository>) -> Self {
        Self { programs }
    }

    pub async fn create_program(&self, program: NewProgram) -> Result<ProgramModel, ServiceError> {
        if program.code_key.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "code_key must not be empty".into(),
            ));
        }
        if program.period_start > program.period_end {
            return Err(ServiceError::ValidationError(
                "period_start must not be after period_end".into(),
            ));
        }

        self.programs.create(program).await
    }

    pub async fn list_programs(&self) -> Result<Vec<ProgramModel>, ServiceError> {
        self.programs.find_all().await
    }

    pub async fn get_program(&self, code_key: &str) -> Result<ProgramModel, ServiceError> {
        self.programs
            .find_by_code(code_key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PROGRAM_NOT_FOUND.to_string()))
    }

    /// Soft-deletes the program; its configs and transactions stay in place.
    pub async fn delete_program(&self, code_key: &str) -> Result<ProgramModel, ServiceError> {
        let deleted = self
            .programs
            .soft_delete(code_key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PROGRAM_NOT_FOUND.to_string()))?;

        info!(code_key, "program deleted");
        Ok(deleted)
    }
}
