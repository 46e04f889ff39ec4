use crate::configuration::{ApplicationSettings, WebhookSettings};
use crate::domain::credentials::ports::CredentialService;
use crate::domain::history::ports::HistoryService;
use crate::domain::inbound::ports::InboundService;
use crate::domain::outbound::ports::DispatchService;
use crate::domain::tasks::BackgroundTasks;
use crate::inbound::http::auth::{basic::AdminCredentials, webhook_signature::WebhookVerifier};
use crate::inbound::http::errors::AppError;
use crate::inbound::http::state::{
    SharedCredentialState, SharedDispatchState, SharedHistoryState, SharedInboundState,
};
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub mod auth;
pub mod errors;
mod handlers;
pub mod routes;
pub mod state;

/// Base64 inflates attachments by a third; the body must fit a full-size
/// payload so oversized attachments reach validation.
const JSON_BODY_LIMIT: usize = 32 * 1024 * 1024;

pub struct Application {
    port: u16,
    server: Server,
    tasks: BackgroundTasks,
}

struct AppStates<CS, DS, IS, HS>
where
    CS: CredentialService,
    DS: DispatchService,
    IS: InboundService,
    HS: HistoryService,
{
    credential: SharedCredentialState<CS>,
    dispatch: SharedDispatchState<DS>,
    inbound: SharedInboundState<IS>,
    history: SharedHistoryState<HS>,
}

fn run<CS, DS, IS, HS>(
    listener: TcpListener,
    states: AppStates<CS, DS, IS, HS>,
    admin: AdminCredentials,
    verifier: WebhookVerifier,
) -> Result<Server, std::io::Error>
where
    CS: CredentialService,
    DS: DispatchService,
    IS: InboundService,
    HS: HistoryService,
{
    let credential_state = web::Data::new(states.credential);
    let dispatch_state = web::Data::new(states.dispatch);
    let inbound_state = web::Data::new(states.inbound);
    let history_state = web::Data::new(states.history);
    let admin = web::Data::new(admin);
    let verifier = web::Data::new(verifier);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_BODY_LIMIT)
                    .error_handler(|err, _req| {
                        AppError::ValidationError(err.to_string()).into()
                    }),
            )
            .app_data(web::PayloadConfig::new(JSON_BODY_LIMIT))
            .app_data(credential_state.clone())
            .app_data(dispatch_state.clone())
            .app_data(inbound_state.clone())
            .app_data(history_state.clone())
            .app_data(admin.clone())
            .app_data(verifier.clone())
            .configure(routes::configure::<CS, DS, IS, HS>)
    })
    .listen(listener)?
    .run();

    Ok(server)
}

impl Application {
    pub async fn build<CS, DS, IS, HS>(
        credential_service: CS,
        dispatch_service: DS,
        inbound_service: IS,
        history_service: HS,
        tasks: BackgroundTasks,
        configuration: ApplicationSettings,
        webhook: WebhookSettings,
    ) -> Result<Self, std::io::Error>
    where
        CS: CredentialService,
        DS: DispatchService,
        IS: InboundService,
        HS: HistoryService,
    {
        let address = format!("{}:{}", configuration.host, configuration.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let admin = AdminCredentials::from_settings(&configuration);
        if admin.is_open() {
            tracing::warn!("No admin password configured, admin routes are unauthenticated");
        }
        let verifier = WebhookVerifier::from_settings(&webhook);
        if !verifier.is_enabled() {
            tracing::warn!("No webhook signing secret configured, signatures are not checked");
        }

        let states = AppStates {
            credential: SharedCredentialState::new(credential_service),
            dispatch: SharedDispatchState::new(dispatch_service),
            inbound: SharedInboundState::new(inbound_service),
            history: SharedHistoryState::new(history_service),
        };
        let server = run(listener, states, admin, verifier)?;

        Ok(Self {
            port,
            server,
            tasks,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until the server stops, then waits for outstanding content
    /// fetches.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let outcome = self.server.await;
        tracing::info!(pending = self.tasks.pending(), "Draining background tasks");
        self.tasks.drain().await;
        outcome
    }
}
