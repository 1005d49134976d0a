use async_trait::async_trait;
use thiserror::Error;

use voicepay_core::balance::{AccountNumber, BalanceRecord};
use voicepay_core::errors::ApplicationError;

pub mod customer;
pub mod memory;

pub use customer::SqlBalanceRepository;
pub use memory::InMemoryBalanceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Read-only view of the external account store.
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Every row stored under `account_number`, in storage order.
    async fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<BalanceRecord>, RepositoryError>;
}
