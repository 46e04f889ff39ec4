use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PostgresDb;
use crate::domain::credentials::{
    models::{ApiKey, CredentialRecord, CredentialUpdate, NewCredential},
    ports::CredentialRepository,
};
use crate::domain::registry::DomainName;
use crate::domain::repository::RepositoryError;

const CREDENTIAL_COLUMNS: &str =
    "id, domain, api_key, description, active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: uuid::Uuid,
    domain: String,
    api_key: String,
    description: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for CredentialRecord {
    type Error = RepositoryError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(CredentialRecord {
            id: row.id,
            domain: DomainName::parse(&row.domain).map_err(RepositoryError::InvalidRecord)?,
            api_key: ApiKey::new(row.api_key),
            description: row.description,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CredentialRepository for PostgresDb {
    #[tracing::instrument(name = "Load active API keys", skip(self))]
    async fn load_active_keys(&self) -> Result<Vec<(DomainName, ApiKey)>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT domain, api_key FROM api_keys WHERE active = TRUE")
                .fetch_all(pool)
                .await
                .context("Failed to load active API keys")?;

        Ok(rows
            .into_iter()
            .filter_map(|(domain, key)| match DomainName::parse(&domain) {
                Ok(domain) => Some((domain, ApiKey::new(key))),
                Err(e) => {
                    tracing::warn!("Skipping stored API key: {}", e);
                    None
                }
            })
            .collect())
    }

    #[tracing::instrument(name = "List stored API keys", skip(self))]
    async fn list_credentials(&self) -> Result<Vec<CredentialRecord>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows: Vec<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {} FROM api_keys ORDER BY domain",
            CREDENTIAL_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list API keys")?;

        rows.into_iter().map(CredentialRecord::try_from).collect()
    }

    #[tracing::instrument(name = "Upsert API key", skip(self, credential), fields(domain = %credential.domain))]
    async fn upsert_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RepositoryError> {
        let row: CredentialRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO api_keys (id, domain, api_key, description, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, now(), now())
            ON CONFLICT (domain) DO UPDATE
            SET api_key = EXCLUDED.api_key,
                description = COALESCE(EXCLUDED.description, api_keys.description),
                active = TRUE,
                updated_at = now()
            RETURNING {}
            "#,
            CREDENTIAL_COLUMNS
        ))
        .bind(uuid::Uuid::new_v4())
        .bind(credential.domain.as_str())
        .bind(credential.api_key.expose())
        .bind(credential.description.as_deref())
        .fetch_one(self.pool()?)
        .await
        .context("Failed to store the API key")?;

        row.try_into()
    }

    #[tracing::instrument(name = "Update API key", skip(self, update))]
    async fn update_credential(
        &self,
        domain: &DomainName,
        update: &CredentialUpdate,
    ) -> Result<CredentialRecord, RepositoryError> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            r#"
            UPDATE api_keys
            SET api_key = COALESCE($2, api_key),
                description = COALESCE($3, description),
                active = COALESCE($4, active),
                updated_at = now()
            WHERE domain = $1
            RETURNING {}
            "#,
            CREDENTIAL_COLUMNS
        ))
        .bind(domain.as_str())
        .bind(update.api_key.as_ref().map(ApiKey::expose))
        .bind(update.description.as_deref())
        .bind(update.active)
        .fetch_optional(self.pool()?)
        .await
        .context("Failed to update the API key")?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    #[tracing::instrument(name = "Delete API key", skip(self))]
    async fn delete_credential(&self, domain: &DomainName) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE domain = $1")
            .bind(domain.as_str())
            .execute(self.pool()?)
            .await
            .context("Failed to delete the API key")?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
