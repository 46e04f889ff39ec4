use anyhow::Context;
use mailgate::configuration::get_configuration;
use mailgate::domain::credentials::{models::StaticCredentials, service::CredentialResolver};
use mailgate::domain::history::service::History;
use mailgate::domain::inbound::service::WebhookHandler;
use mailgate::domain::outbound::service::Dispatcher;
use mailgate::domain::registry::DomainRegistry;
use mailgate::domain::tasks::BackgroundTasks;
use mailgate::inbound::http::Application;
use mailgate::outbound::db::postgres_db::PostgresDb;
use mailgate::outbound::provider::resend_client::ResendClient;
use mailgate::outbound::telemetry::init_logger;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration().context("Failed to read configuration")?;
    init_logger("mailgate", &configuration.log_level(), std::io::stdout)?;

    let db = Arc::new(PostgresDb::new(&configuration.database)?);
    if configuration.database.run_migrations {
        db.migrate().await;
    }
    let provider = Arc::new(ResendClient::new(&configuration.email_client)?);

    let registry = Arc::new(DomainRegistry::from_settings(&configuration.domains));
    let static_credentials = StaticCredentials::from_settings(&configuration.email_client);
    if static_credentials.is_empty() {
        tracing::warn!("No default or per-domain API key configured");
    }
    let credentials = CredentialResolver::new(
        Arc::clone(&db),
        Arc::new(static_credentials),
        Arc::clone(&registry),
        configuration.credentials.ttl(),
    );

    let tasks = BackgroundTasks::new();
    let dispatcher = Dispatcher::new(
        Arc::clone(&db),
        Arc::clone(&provider),
        credentials.clone(),
        Arc::clone(&registry),
    );
    let webhook_handler = WebhookHandler::new(
        Arc::clone(&db),
        provider,
        credentials.clone(),
        registry,
        tasks.clone(),
        configuration.inbound.fetch_policy(),
    );
    let history = History::new(db);

    let application = Application::build(
        credentials,
        dispatcher,
        webhook_handler,
        history,
        tasks,
        configuration.application,
        configuration.webhook,
    )
    .await?;
    tracing::info!(port = application.port(), "mailgate listening");

    application.run_until_stopped().await?;
    Ok(())
}
