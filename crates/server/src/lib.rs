pub mod bootstrap;
pub mod health;
pub mod webhooks;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use webhooks::{router, WebhookState};
