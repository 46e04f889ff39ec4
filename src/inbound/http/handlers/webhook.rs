use crate::{
    domain::inbound::ports::InboundService,
    inbound::http::{
        auth::webhook_signature::WebhookVerifier, errors::AppError, state::SharedInboundState,
    },
};
use actix_web::{web, HttpRequest, HttpResponse};

/// Provider notifications. The body is kept raw until the signature has
/// been checked.
#[tracing::instrument(name = "Receiving a provider notification", skip_all)]
pub async fn webhook<IS: InboundService>(
    request: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<WebhookVerifier>,
    state: web::Data<SharedInboundState<IS>>,
) -> Result<HttpResponse, AppError> {
    verifier.verify(request.headers(), &body, chrono::Utc::now().timestamp())?;

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid JSON payload: {}", e)))?;
    let outcome = state.inbound_service().handle_webhook(payload).await?;
    tracing::info!(outcome = ?outcome, "Notification handled");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}
