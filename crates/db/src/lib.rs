pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, customer_table_present, ping, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    BalanceRepository, InMemoryBalanceRepository, RepositoryError, SqlBalanceRepository,
};
