use std::sync::Arc;

use courtside_agent::{build_llm_client, AgentDeps, AgentRuntime, RuntimeSettings};
use courtside_core::audit::TracingAuditSink;
use courtside_core::clock::SystemClock;
use courtside_core::config::{AppConfig, ConfigError, LoadOptions};
use courtside_db::{connect_with_settings, migrations, DbPool};
use courtside_whatsapp::{MessageSender, NoopSender, TwilioSender};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: Arc<AgentRuntime>,
    pub sender: Arc<dyn MessageSender>,
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
        "starting application bootstrap"
    );

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

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let settings = RuntimeSettings::from_config(&config)?;
    let deps = AgentDeps::from_pool(
        db_pool.clone(),
        build_llm_client(&config.llm),
        Arc::new(SystemClock),
        Arc::new(TracingAuditSink),
    );
    let agent_runtime = Arc::new(AgentRuntime::new(deps, settings));

    Ok(Application { sender: build_sender(&config), config, db_pool, agent_runtime })
}

fn build_sender(config: &AppConfig) -> Arc<dyn MessageSender> {
    if !config.whatsapp.is_configured() {
        info!(
            event_name = "system.bootstrap.whatsapp_noop",
            correlation_id = "bootstrap",
            "twilio credentials absent; replies will only be logged"
        );
        return Arc::new(NoopSender);
    }

    match TwilioSender::from_config(&config.whatsapp) {
        Ok(sender) => {
            info!(
                event_name = "system.bootstrap.whatsapp_configured",
                correlation_id = "bootstrap",
                "twilio whatsapp sender ready"
            );
            Arc::new(sender)
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.whatsapp_failed",
                correlation_id = "bootstrap",
                error = %error,
                "twilio sender could not be built; falling back to no-op sender"
            );
            Arc::new(NoopSender)
        }
    }
}
