use crate::{
    domain::credentials::ports::CredentialService,
    inbound::http::state::SharedCredentialState,
};
use actix_web::{web, HttpResponse};

pub async fn list_domains<CS: CredentialService>(
    state: web::Data<SharedCredentialState<CS>>,
) -> HttpResponse {
    let domains = state.credential_service().configured_domains().await;
    let primary = domains.first().map(|d| d.domain.clone());

    HttpResponse::Ok().json(serde_json::json!({
        "primary": primary,
        "domains": domains,
    }))
}
