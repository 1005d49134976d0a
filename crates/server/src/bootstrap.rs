use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;
use voicepay_core::audit::{AuditSink, TracingAuditSink};
use voicepay_core::capture::CaptureVault;
use voicepay_core::config::{AppConfig, ConfigError, LoadOptions};
use voicepay_core::payment::SimulatedPaymentProcessor;
use voicepay_db::{connect_with_settings, migrations, DbPool, SqlBalanceRepository};

use crate::health;
use crate::webhooks::{self, WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub vault: Arc<CaptureVault>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        base_url = %config.agent.public_base_url,
        "starting application bootstrap"
    );
    config.validate()?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    if config.database.run_migrations {
        migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
        info!(
            event_name = "system.bootstrap.migrations_applied",
            correlation_id = "bootstrap",
            "database migrations applied"
        );
    }

    let vault = Arc::new(CaptureVault::new(Duration::from_secs(config.capture.ttl_secs)));
    Ok(Application { config, db_pool, vault, audit: Arc::new(TracingAuditSink) })
}

impl Application {
    /// Full HTTP surface: webhooks, health, request tracing.
    pub fn router(&self) -> Result<Router, BootstrapError> {
        let state = WebhookState::new(
            self.config.agent_descriptor()?,
            self.config.capture.clone(),
            self.vault.clone(),
            Arc::new(SqlBalanceRepository::new(self.db_pool.clone())),
            Arc::new(SimulatedPaymentProcessor),
            self.audit.clone(),
        );

        Ok(webhooks::router(state)
            .merge(health::router(self.db_pool.clone()))
            .layer(TraceLayer::new_for_http()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use voicepay_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_public_base_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                public_base_url: Some(String::new()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = match result {
            Ok(_) => panic!("bootstrap should fail without a base url"),
            Err(error) => error.to_string(),
        };
        assert!(message.contains("agent.public_base_url"));
    }

    #[tokio::test]
    async fn bootstrap_runs_migrations_when_enabled() {
        let dir = TempDir::new().expect("temp dir");
        let app = bootstrap(valid_overrides(&scratch_database_url(&dir), true))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'customer'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query schema");
        assert_eq!(table_count, 1);
        assert!(app.vault.is_empty());
        app.router().expect("router should build from validated config");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_leaves_external_store_untouched_by_default() {
        let dir = TempDir::new().expect("temp dir");
        let app = bootstrap(valid_overrides(&scratch_database_url(&dir), false))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&app.db_pool)
                .await
                .expect("query schema");
        assert_eq!(table_count, 0);

        app.db_pool.close().await;
    }

    fn scratch_database_url(dir: &TempDir) -> String {
        format!("sqlite://{}?mode=rwc", dir.path().join("customer.db").display())
    }

    fn valid_overrides(database_url: &str, run_migrations: bool) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                public_base_url: Some("https://voicepay.example.com/".to_string()),
                run_migrations: Some(run_migrations),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
