use crate::{
    domain::outbound::{models::email::SendEmailRequest, ports::DispatchService},
    inbound::http::{errors::AppError, state::SharedDispatchState},
};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct BatchRequest {
    #[serde(default)]
    pub emails: Vec<SendEmailRequest>,
}

#[tracing::instrument(
    name = "Sending an email",
    skip(request, state),
    fields(domain = ?request.domain)
)]
pub async fn send<DS: DispatchService>(
    request: web::Json<SendEmailRequest>,
    state: web::Data<SharedDispatchState<DS>>,
) -> Result<HttpResponse, AppError> {
    let outcome = state.dispatch_service().send(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "id": outcome.id,
        "domain": outcome.domain,
        "from": outcome.from,
    })))
}

#[tracing::instrument(
    name = "Sending an email batch",
    skip(request, state),
    fields(batch_size = request.emails.len())
)]
pub async fn send_batch<DS: DispatchService>(
    request: web::Json<BatchRequest>,
    state: web::Data<SharedDispatchState<DS>>,
) -> Result<HttpResponse, AppError> {
    let results = state
        .dispatch_service()
        .send_batch(request.into_inner().emails)
        .await?;
    let sent = results.iter().filter(|r| r.success).count();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "results": results,
        "sent": sent,
        "failed": results.len() - sent,
    })))
}
