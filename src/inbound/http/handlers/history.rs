use crate::{
    domain::{
        history::{
            models::{HistoryParams, HistoryQuery},
            ports::HistoryService,
        },
        inbound::models::message::{InboundMessage, InboundState},
    },
    inbound::http::{errors::AppError, state::SharedHistoryState},
};
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct ReceivedView<'a> {
    #[serde(flatten)]
    message: &'a InboundMessage,
    state: InboundState,
}

impl<'a> From<&'a InboundMessage> for ReceivedView<'a> {
    fn from(message: &'a InboundMessage) -> Self {
        Self {
            message,
            state: message.state(),
        }
    }
}

pub async fn list_sent<HS: HistoryService>(
    params: web::Query<HistoryParams>,
    state: web::Data<SharedHistoryState<HS>>,
) -> HttpResponse {
    let query = HistoryQuery::from(params.into_inner());
    let (limit, offset) = (query.limit, query.offset);
    let emails = state.history_service().list_sent(query).await;

    HttpResponse::Ok().json(serde_json::json!({
        "emails": emails,
        "limit": limit,
        "offset": offset,
    }))
}

pub async fn list_received<HS: HistoryService>(
    params: web::Query<HistoryParams>,
    state: web::Data<SharedHistoryState<HS>>,
) -> HttpResponse {
    let query = HistoryQuery::from(params.into_inner());
    let (limit, offset) = (query.limit, query.offset);
    let emails = state.history_service().list_received(query).await;
    let emails: Vec<ReceivedView> = emails.iter().map(ReceivedView::from).collect();

    HttpResponse::Ok().json(serde_json::json!({
        "emails": emails,
        "limit": limit,
        "offset": offset,
    }))
}

pub async fn get_received<HS: HistoryService>(
    path: web::Path<String>,
    state: web::Data<SharedHistoryState<HS>>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let message = state
        .history_service()
        .get_received(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("received email {}", id)))?;

    Ok(HttpResponse::Ok().json(ReceivedView::from(&message)))
}

pub async fn stats<HS: HistoryService>(state: web::Data<SharedHistoryState<HS>>) -> HttpResponse {
    HttpResponse::Ok().json(state.history_service().stats().await)
}
