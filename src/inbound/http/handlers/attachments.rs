use crate::{
    domain::inbound::ports::InboundService,
    inbound::http::{errors::AppError, state::SharedInboundState},
};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};

#[tracing::instrument(name = "Manual content refetch", skip(state))]
pub async fn refetch_received<IS: InboundService>(
    path: web::Path<String>,
    state: web::Data<SharedInboundState<IS>>,
) -> Result<HttpResponse, AppError> {
    let message = state.inbound_service().refetch(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "email": message,
        "state": message.state(),
    })))
}

pub async fn list_attachments<IS: InboundService>(
    path: web::Path<String>,
    state: web::Data<SharedInboundState<IS>>,
) -> Result<HttpResponse, AppError> {
    let attachments = state
        .inbound_service()
        .attachments(&path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "attachments": attachments })))
}

#[tracing::instrument(name = "Proxying an attachment download", skip(state))]
pub async fn download_attachment<IS: InboundService>(
    path: web::Path<(String, String)>,
    state: web::Data<SharedInboundState<IS>>,
) -> Result<HttpResponse, AppError> {
    let (id, attachment_id) = path.into_inner();
    let download = state
        .inbound_service()
        .download_attachment(&id, &attachment_id)
        .await?;

    let filename = download.filename.unwrap_or(attachment_id);
    Ok(HttpResponse::Ok()
        .content_type(download.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(download.bytes))
}
