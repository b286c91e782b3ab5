use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::repositories::{ProgramRepository, TransactionRepository};
use crate::services::promo_engine::PROGRAM_NOT_FOUND;

/// Quota usage of one program. `remain` goes negative once the quota is overrun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RemainingQuota {
    pub program_id: Uuid,
    pub quota: i64,
    pub total: i64,
    pub remain: i64,
}

#[derive(Clone)]
pub struct QuotaCalculator {
    programs: Arc<dyn ProgramRepository>,
    transactions: Arc<dyn TransactionRepository>,
}

impl QuotaCalculator {
    pub fn new(
        programs: Arc<dyn ProgramRepository>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            programs,
            transactions,
        }
    }

    /// Counts at read time; nothing is reserved, so concurrent writers can
    /// push `remain` below zero.
    pub async fn remaining(&self, promo_code: &str) -> Result<RemainingQuota, ServiceError> {
        let (program, total) = futures::join!(
            self.programs.find_by_code(promo_code),
            self.transactions.count_by_promo_code(promo_code),
        );

        // An unknown program wins over a failed count
        let program =
            program?.ok_or_else(|| ServiceError::NotFound(PROGRAM_NOT_FOUND.to_string()))?;
        let total = total?;

        let quota = i64::from(program.quota);
        let remaining = RemainingQuota {
            program_id: program.id,
            quota,
            total,
            remain: quota - total,
        };

        debug!(promo_code, quota, total, remain = remaining.remain, "quota computed");
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::promo_program;
    use crate::repositories::{MockProgramRepository, MockTransactionRepository};
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn program(quota: i32) -> promo_program::Model {
        promo_program::Model {
            id: Uuid::new_v4(),
            code_key: "PROMO1".into(),
            quota,
            period_start: Utc::now(),
            period_end: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn calculator(quota: Option<i32>, total: i64) -> QuotaCalculator {
        let mut programs = MockProgramRepository::new();
        programs
            .expect_find_by_code()
            .returning(move |_| Ok(quota.map(program)));

        let mut transactions = MockTransactionRepository::new();
        transactions
            .expect_count_by_promo_code()
            .returning(move |_| Ok(total));

        QuotaCalculator::new(Arc::new(programs), Arc::new(transactions))
    }

    #[tokio::test]
    async fn remain_is_quota_minus_total() {
        let result = calculator(Some(100), 4).remaining("PROMO1").await.unwrap();
        assert_eq!(result.quota, 100);
        assert_eq!(result.total, 4);
        assert_eq!(result.remain, 96);
    }

    #[tokio::test]
    async fn remain_can_go_negative() {
        let result = calculator(Some(2), 5).remaining("PROMO1").await.unwrap();
        assert_eq!(result.remain, -3);
    }

    #[tokio::test]
    async fn unknown_program_is_not_found() {
        let err = calculator(None, 0).remaining("NOPE").await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "Program does not exist");
    }

    #[tokio::test]
    async fn count_failure_propagates() {
        let mut programs = MockProgramRepository::new();
        programs
            .expect_find_by_code()
            .returning(|_| Ok(Some(program(10))));
        let mut transactions = MockTransactionRepository::new();
        transactions
            .expect_count_by_promo_code()
            .returning(|_| Err(ServiceError::db_error("connection reset")));

        let err = QuotaCalculator::new(Arc::new(programs), Arc::new(transactions))
            .remaining("PROMO1")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::DatabaseError(_));
    }

    #[tokio::test]
    async fn unknown_program_is_not_found_even_when_count_fails() {
        let mut programs = MockProgramRepository::new();
        programs.expect_find_by_code().returning(|_| Ok(None));
        let mut transactions = MockTransactionRepository::new();
        transactions
            .expect_count_by_promo_code()
            .returning(|_| Err(ServiceError::db_error("connection reset")));

        let err = QuotaCalculator::new(Arc::new(programs), Arc::new(transactions))
            .remaining("NOPE")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg == "Program does not exist");
    }
}
