//! Hosted PostgREST backend (Supabase).
//!
//! Each collection lives in its own table and is read with a single
//! `GET /rest/v1/{table}?select=*&order=created_at.desc`. Row-level
//! security decides what the caller sees, so an optional user access token
//! is sent as the bearer credential instead of the anon key.

use super::{DataSource, EntityWriter, SourceError};
use crate::models::{Client, Invoice, Project, Snapshot, Task};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const PROJECTS_TABLE: &str = "projects";
const TASKS_TABLE: &str = "tasks";
const CLIENTS_TABLE: &str = "clients";
const INVOICES_TABLE: &str = "invoices";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon (or service) key, sent as `apikey`.
    pub api_key: String,
    /// Signed-in user's JWT, if any.
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

/// Reads and writes the four tables of a Supabase project.
pub struct SupabaseSource {
    client: HttpClient,
    config: SupabaseConfig,
}

impl SupabaseSource {
    /// Create a source with its own HTTP client.
    pub fn new(config: SupabaseConfig) -> Result<Self, SourceError> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(SourceError::Client)?;

        Ok(Self::with_client(config, client))
    }

    /// Create a source on top of an existing HTTP client.
    pub fn with_client(mut config: SupabaseConfig, client: HttpClient) -> Self {
        config.url = config.url.trim_end_matches('/').to_string();
        info!("Using Supabase backend at {}", config.url);
        Self { client, config }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.config.url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}?select=*&order=created_at.desc", self.rest_url(), table)
    }

    fn bearer(&self) -> &str {
        self.config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key)
    }

    /// Request with the credentials every PostgREST call carries.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
            .header("Accept", "application/json")
    }

    /// Send `request` and return the body of a 2xx response.
    async fn send(&self, table: &str, request: RequestBuilder) -> Result<String, SourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(table, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(table, e))?;

        if !status.is_success() {
            return Err(SourceError::Status {
                table: table.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    async fn fetch_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, SourceError> {
        let url = self.table_url(table);
        debug!("GET {}", url);

        let body = self.send(table, self.request(Method::GET, &url)).await?;
        let rows: Vec<T> = decode_rows(table, &body)?;

        debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Request for the row with `id`, filtered the PostgREST way (`id=eq.<id>`).
    fn row_request(&self, method: Method, table: &str, id: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.rest_url(), table);
        debug!("{} {}?id=eq.{}", method, url, id);
        self.request(method, &url)
            .query(&[("id", format!("eq.{}", id))])
    }

    fn request_error(&self, table: &str, error: reqwest::Error) -> SourceError {
        if error.is_timeout() {
            SourceError::Timeout {
                table: table.to_string(),
                seconds: self.config.timeout_seconds,
            }
        } else {
            SourceError::Http {
                table: table.to_string(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl DataSource for SupabaseSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        let (projects, tasks, clients, invoices) = futures::try_join!(
            self.fetch_table::<Project>(PROJECTS_TABLE),
            self.fetch_table::<Task>(TASKS_TABLE),
            self.fetch_table::<Client>(CLIENTS_TABLE),
            self.fetch_table::<Invoice>(INVOICES_TABLE),
        )?;

        Ok(Snapshot {
            projects,
            tasks,
            clients,
            invoices,
        })
    }

    fn describe(&self) -> String {
        format!("Supabase at {}", self.config.url)
    }

    fn is_remote(&self) -> bool {
        true
    }
}

#[async_trait]
impl EntityWriter for SupabaseSource {
    async fn insert(&self, table: &str, row: Value) -> Result<Value, SourceError> {
        let url = format!("{}/{}", self.rest_url(), table);
        debug!("POST {}", url);

        let request = self
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(&row);
        let body = self.send(table, request).await?;

        decode_rows::<Value>(table, &body)?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::EmptyResponse {
                table: table.to_string(),
            })
    }

    async fn update(&self, table: &str, id: &str, changes: Value) -> Result<Value, SourceError> {
        let request = self
            .row_request(Method::PATCH, table, id)
            .header("Prefer", "return=representation")
            .json(&changes);
        let body = self.send(table, request).await?;

        decode_rows::<Value>(table, &body)?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), SourceError> {
        self.send(table, self.row_request(Method::DELETE, table, id))
            .await?;
        Ok(())
    }
}

fn decode_rows<T: DeserializeOwned>(table: &str, body: &str) -> Result<Vec<T>, SourceError> {
    serde_json::from_str(body).map_err(|source| SourceError::Decode {
        what: format!("{} rows", table),
        source,
    })
}

/// Pull the human-readable message out of a PostgREST error body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("msg")))
        .and_then(|m| m.as_str());

    match message {
        Some(m) => m.to_string(),
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}
