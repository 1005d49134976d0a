use tokio::sync::RwLock;

use voicepay_core::balance::{AccountNumber, BalanceRecord};

use super::{BalanceRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryBalanceRepository {
    records: RwLock<Vec<BalanceRecord>>,
}

impl InMemoryBalanceRepository {
    pub fn with_records(records: Vec<BalanceRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }

    /// Appends without deduplicating, so duplicate accounts can be modelled.
    pub async fn insert(&self, record: BalanceRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait::async_trait]
impl BalanceRepository for InMemoryBalanceRepository {
    async fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<BalanceRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| &record.account_number == account_number)
            .cloned()
            .collect())
    }
}
