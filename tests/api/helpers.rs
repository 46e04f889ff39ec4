use mailgate::configuration::{get_configuration, Settings};
use mailgate::domain::credentials::{models::StaticCredentials, service::CredentialResolver};
use mailgate::domain::history::service::History;
use mailgate::domain::inbound::service::WebhookHandler;
use mailgate::domain::outbound::service::Dispatcher;
use mailgate::domain::registry::DomainRegistry;
use mailgate::domain::tasks::BackgroundTasks;
use mailgate::inbound::http::auth::webhook_signature::WebhookVerifier;
use mailgate::inbound::http::Application;
use mailgate::outbound::db::memory_db::MemoryDb;
use mailgate::outbound::provider::resend_client::ResendClient;
use mailgate::outbound::telemetry::init_logger;
use once_cell::sync::Lazy;
use secrecy::Secret;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const ADMIN_USERNAME: &str = "admin";

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info";
    let subscriber_name = "test";
    let initialised = if std::env::var("TEST_LOG").is_ok() {
        init_logger(subscriber_name, default_filter_level, std::io::stdout)
    } else {
        init_logger(subscriber_name, default_filter_level, std::io::sink)
    };
    initialised.expect("Failed to initialise test logging");
});

pub struct TestApp {
    pub address: String,
    pub db: MemoryDb,
    pub email_server: MockServer,
    pub tasks: BackgroundTasks,
    pub verifier: WebhookVerifier,
    pub admin_password: Option<String>,
    api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_send(&self, body: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/send", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_send_batch(&self, body: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/send-batch", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Signs the payload when the app has a signing secret.
    pub async fn post_webhook(&self, payload: &serde_json::Value) -> reqwest::Response {
        let body = serde_json::to_vec(payload).unwrap();
        let id = format!("msg_{}", uuid::Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut request = self
            .api_client
            .post(&format!("{}/webhook", &self.address))
            .header("Content-Type", "application/json");
        if let Some(signature) = self.verifier.sign(&id, &timestamp, &body) {
            request = request
                .header("svix-id", id)
                .header("svix-timestamp", timestamp)
                .header("svix-signature", signature);
        }
        request
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_unsigned_webhook(&self, payload: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/webhook", &self.address))
            .json(payload)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.api_client
            .post(&format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .api_client
            .request(method, format!("{}{}", &self.address, path));
        match &self.admin_password {
            Some(password) => request.basic_auth(ADMIN_USERNAME, Some(password)),
            None => request,
        }
    }

    pub fn anonymous(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.api_client
            .request(method, format!("{}{}", &self.address, path))
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Serves `foo.com` and `bar.io`. Only `foo.com` has a key of its own, the
/// default key covers the rest. Persistence is the in-memory store.
pub async fn spawn_app_with<F>(customise: F) -> TestApp
where
    F: FnOnce(&mut Settings),
{
    Lazy::force(&TRACING);
    let email_server = MockServer::start().await;
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration");
        c.application.host = "127.0.0.1".into();
        c.application.port = 0;
        c.application.admin_username = ADMIN_USERNAME.into();
        c.application.admin_password = None;
        c.database.url = None;
        c.email_client.base_url = email_server.uri();
        c.email_client.default_api_key = Some(Secret::new("re_default".into()));
        c.email_client.domain_api_keys = Some("foo.com:re_foo".into());
        c.domains.list = Some("foo.com,bar.io".into());
        c.domains.senders = None;
        c.inbound.fetch_backoff_milliseconds = 0;
        c.webhook.signing_secret = None;
        customise(&mut c);
        c
    };

    let db = MemoryDb::new();
    let repo = Arc::new(db.clone());
    let provider = Arc::new(
        ResendClient::new(&configuration.email_client).expect("Failed to build provider client"),
    );
    let registry = Arc::new(DomainRegistry::from_settings(&configuration.domains));
    let credentials = CredentialResolver::new(
        Arc::clone(&repo),
        Arc::new(StaticCredentials::from_settings(&configuration.email_client)),
        Arc::clone(&registry),
        configuration.credentials.ttl(),
    );
    let tasks = BackgroundTasks::new();
    let dispatcher = Dispatcher::new(
        Arc::clone(&repo),
        Arc::clone(&provider),
        credentials.clone(),
        Arc::clone(&registry),
    );
    let webhook_handler = WebhookHandler::new(
        Arc::clone(&repo),
        provider,
        credentials.clone(),
        registry,
        tasks.clone(),
        configuration.inbound.fetch_policy(),
    );
    let history = History::new(repo);

    let verifier = WebhookVerifier::from_settings(&configuration.webhook);
    let admin_password = configuration
        .application
        .admin_password
        .as_ref()
        .map(|p| secrecy::ExposeSecret::expose_secret(p).clone());

    let application = Application::build(
        credentials,
        dispatcher,
        webhook_handler,
        history,
        tasks.clone(),
        configuration.application.clone(),
        configuration.webhook.clone(),
    )
    .await
    .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", application.port());
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address,
        db,
        email_server,
        tasks,
        verifier,
        admin_password,
        api_client: reqwest::Client::new(),
    }
}

/// Answers every provider send with a new `msg_<n>` id.
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl Respond for SequentialIds {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": format!("msg_{}", n) }))
    }
}
