use crate::{
    domain::credentials::{
        models::{CredentialUpdateRequest, NewCredentialRequest},
        ports::CredentialService,
    },
    inbound::http::{
        auth::basic::AdminCredentials, errors::AppError, state::SharedCredentialState,
    },
};
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn list_api_keys<CS: CredentialService>(
    request: HttpRequest,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    let keys = state.credential_service().list().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "api_keys": keys })))
}

#[tracing::instrument(
    name = "Storing an API key",
    skip(request, body, admin, state),
    fields(domain = %body.domain)
)]
pub async fn create_api_key<CS: CredentialService>(
    request: HttpRequest,
    body: web::Json<NewCredentialRequest>,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    let summary = state.credential_service().create(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(summary))
}

#[tracing::instrument(name = "Updating an API key", skip(request, body, admin, state))]
pub async fn update_api_key<CS: CredentialService>(
    request: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CredentialUpdateRequest>,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    let summary = state
        .credential_service()
        .update(&path.into_inner(), body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(summary))
}

#[tracing::instrument(name = "Deactivating an API key", skip(request, admin, state))]
pub async fn deactivate_api_key<CS: CredentialService>(
    request: HttpRequest,
    path: web::Path<String>,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    let summary = state
        .credential_service()
        .deactivate(&path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(summary))
}

#[tracing::instrument(name = "Deleting an API key", skip(request, admin, state))]
pub async fn delete_api_key<CS: CredentialService>(
    request: HttpRequest,
    path: web::Path<String>,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    state
        .credential_service()
        .delete(&path.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

pub async fn invalidate_api_keys<CS: CredentialService>(
    request: HttpRequest,
    admin: web::Data<AdminCredentials>,
    state: web::Data<SharedCredentialState<CS>>,
) -> Result<HttpResponse, AppError> {
    admin.authorize(&request)?;
    state.credential_service().invalidate();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "invalidated": true })))
}
