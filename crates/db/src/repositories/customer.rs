use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;
use voicepay_core::balance::{AccountNumber, BalanceRecord};

use super::{BalanceRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBalanceRepository {
    pool: DbPool,
}

impl SqlBalanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BalanceRepository for SqlBalanceRepository {
    async fn find_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<BalanceRecord>, RepositoryError> {
        // Cast both columns: the store may hold them as INTEGER/REAL.
        let rows = sqlx::query(
            "SELECT CAST(account_number AS TEXT) AS account_number,
                    CAST(balance AS TEXT) AS balance
             FROM customer
             WHERE CAST(account_number AS TEXT) = ?1
             ORDER BY rowid",
        )
        .bind(account_number.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<BalanceRecord, RepositoryError> {
                let account: String = row.try_get("account_number")?;
                let raw_balance: String = row.try_get("balance")?;
                let balance = parse_balance(&raw_balance)?;
                Ok(BalanceRecord { account_number: AccountNumber(account), balance })
            })
            .collect()
    }
}

fn parse_balance(raw: &str) -> Result<Decimal, RepositoryError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|error| RepositoryError::Decode(format!("balance `{raw}`: {error}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use voicepay_core::balance::{AccountNumber, BalanceLookup};

    use super::SqlBalanceRepository;
    use crate::repositories::{BalanceRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn insert(pool: &DbPool, account: &str, balance: &str) {
        sqlx::query(
            "INSERT INTO customer (account_number, balance) VALUES (?1, CAST(?2 AS NUMERIC))",
        )
        .bind(account)
        .bind(balance)
        .execute(pool)
        .await
        .expect("insert customer");
    }

    fn account(value: &str) -> AccountNumber {
        AccountNumber(value.to_string())
    }

    #[tokio::test]
    async fn finds_single_row_and_renders_two_decimals() {
        let pool = migrated_pool().await;
        insert(&pool, "1001", "42.50").await;
        let repository = SqlBalanceRepository::new(pool);

        let records =
            repository.find_by_account_number(&account("1001")).await.expect("lookup balance");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].balance, Decimal::new(425, 1));
        assert_eq!(
            BalanceLookup::from_records(&records).response_text(),
            "Your current balance is $42.50."
        );
    }

    #[tokio::test]
    async fn unknown_account_returns_no_rows() {
        let pool = migrated_pool().await;
        insert(&pool, "1001", "42.50").await;
        let repository = SqlBalanceRepository::new(pool);

        let records =
            repository.find_by_account_number(&account("9999")).await.expect("lookup balance");

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn duplicate_rows_are_all_returned_in_storage_order() {
        let pool = migrated_pool().await;
        insert(&pool, "1001", "42.50").await;
        insert(&pool, "1001", "10").await;
        let repository = SqlBalanceRepository::new(pool);

        let records =
            repository.find_by_account_number(&account("1001")).await.expect("lookup balance");

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].balance, Decimal::new(10, 0));
        assert_eq!(
            BalanceLookup::from_records(&records),
            BalanceLookup::Ambiguous { matches: 2 }
        );
    }

    #[tokio::test]
    async fn integer_account_numbers_still_match() {
        let pool = migrated_pool().await;
        sqlx::query("INSERT INTO customer (account_number, balance) VALUES (1003, 128.75)")
            .execute(&pool)
            .await
            .expect("insert numeric row");
        let repository = SqlBalanceRepository::new(pool);

        let records =
            repository.find_by_account_number(&account("1003")).await.expect("lookup balance");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].balance, Decimal::new(12875, 2));
    }

    #[tokio::test]
    async fn missing_table_is_a_database_error() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        let repository = SqlBalanceRepository::new(pool);

        let result = repository.find_by_account_number(&account("1001")).await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[test]
    fn unparseable_balance_is_a_decode_error() {
        assert!(matches!(super::parse_balance("lots"), Err(RepositoryError::Decode(_))));
        assert_eq!(super::parse_balance(" 0 ").expect("zero"), Decimal::ZERO);
    }
}
