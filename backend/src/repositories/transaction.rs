//! Transaction management utilities for repositories.

use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

use crate::error::AppError;

/// Begin a new database transaction.
///
/// On success the transaction is finished with [`commit_transaction`]. Dropping
/// it without committing rolls it back.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, AppError> {
    db.begin()
        .await
        .map_err(|e| AppError::Internal(e.into()))
}

/// Commit a transaction.
pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.commit().await.map_err(|e| AppError::Internal(e.into()))
}

/// Returns true when the error is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation()
    )
}
