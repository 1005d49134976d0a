use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{Executor, Row};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_ACCOUNTS: &[SeedAccountContract] = &[
    SeedAccountContract {
        account_number: "1001",
        first_name: "Ada",
        last_name: "Lovelace",
        balance: "42.50",
        label: "account-1001",
    },
    SeedAccountContract {
        account_number: "1002",
        first_name: "Grace",
        last_name: "Hopper",
        balance: "0.00",
        label: "account-1002",
    },
    SeedAccountContract {
        account_number: "1003",
        first_name: "Alan",
        last_name: "Turing",
        balance: "128.75",
        label: "account-1003",
    },
];

struct SeedAccountContract {
    account_number: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    balance: &'static str,
    label: &'static str,
}

/// Demo accounts for local runs against a scratch `customer` table.
///
/// Loading is idempotent: an account already present is left untouched.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_accounts.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let before = Self::seeded_row_count(pool).await?;

        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let after = Self::seeded_row_count(pool).await?;
        let accounts_seeded = SEED_ACCOUNTS
            .iter()
            .map(|account| SeededAccount {
                account_number: account.account_number,
                first_name: account.first_name,
                last_name: account.last_name,
                balance: account.balance,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { accounts_seeded, rows_inserted: (after - before).max(0) as u64 })
    }

    /// Checks every demo account exists exactly once with its seeded balance.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_ACCOUNTS.len());

        for account in SEED_ACCOUNTS {
            let rows = sqlx::query(
                "SELECT CAST(balance AS TEXT) AS balance FROM customer
                 WHERE CAST(account_number AS TEXT) = ?1",
            )
            .bind(account.account_number)
            .fetch_all(pool)
            .await?;

            let expected = Decimal::from_str(account.balance)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let matches = match rows.as_slice() {
                [row] => {
                    let raw: String = row.try_get("balance")?;
                    Decimal::from_str(raw.trim()).map(|actual| actual == expected).unwrap_or(false)
                }
                _ => false,
            };
            checks.push((account.label, matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let ids = SEED_ACCOUNTS
            .iter()
            .map(|account| format!("'{}'", account.account_number))
            .collect::<Vec<_>>()
            .join(",");
        sqlx::query(&format!("DELETE FROM customer WHERE account_number IN ({ids})"))
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn seeded_row_count(pool: &DbPool) -> Result<i64, RepositoryError> {
        let ids = SEED_ACCOUNTS
            .iter()
            .map(|account| format!("'{}'", account.account_number))
            .collect::<Vec<_>>()
            .join(",");
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM customer WHERE account_number IN ({ids})"
        ))
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub accounts_seeded: Vec<SeededAccount>,
    pub rows_inserted: u64,
}

#[derive(Debug)]
pub struct SeededAccount {
    pub account_number: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub balance: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
