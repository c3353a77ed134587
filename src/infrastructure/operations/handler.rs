use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::orchestration::{OperationOutput, OperationType, Payload};
use crate::domain::DomainError;

/// Executes one operation type against its remote collaborator
#[async_trait]
pub trait OperationHandler: Send + Sync + Debug {
    fn operation(&self) -> OperationType;

    /// Single remote call for one payload
    async fn execute(&self, payload: &Payload) -> Result<OperationOutput, DomainError>;

    /// One remote call for every payload; results are positional.
    ///
    /// Any failure, including a result count that differs from the input
    /// count, fails the whole batch.
    async fn execute_batch(&self, payloads: &[Payload]) -> Result<Vec<OperationOutput>, DomainError>;
}

/// Checks that a payload belongs to the handler's operation
pub(crate) fn expect_operation(
    operation: OperationType,
    payload: &Payload,
) -> Result<(), DomainError> {
    if payload.operation() != operation {
        return Err(wrong_payload(operation, payload));
    }
    Ok(())
}

pub(crate) fn wrong_payload(operation: OperationType, payload: &Payload) -> DomainError {
    DomainError::validation(format!(
        "{} handler cannot execute a {} payload",
        operation,
        payload.operation()
    ))
}

/// Whole-batch failure for a positional result count mismatch
pub(crate) fn count_mismatch(expected: usize, received: usize) -> DomainError {
    DomainError::batch(format!(
        "Expected {} results, received {}",
        expected, received
    ))
}
