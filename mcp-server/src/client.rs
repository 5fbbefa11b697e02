//! HTTP client for the MemberPool API
//!
//! Every call asks for `text/plain` so the API answers with markdown that can
//! be handed straight back to the model.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::Serialize;

/// HTTP client for communicating with the MemberPool API
#[derive(Clone)]
pub struct MemberPoolClient {
    client: reqwest::Client,
    base_url: String,
}

impl MemberPoolClient {
    /// Create a new client from environment variables
    ///
    /// Required env vars:
    /// - MEMBERPOOL_ADMIN_KEY: the API's ADMIN_API_KEY
    /// - MEMBERPOOL_API_URL: Base URL of the API (default http://localhost:8080)
    pub fn from_env() -> Result<Self> {
        let admin_key = std::env::var("MEMBERPOOL_ADMIN_KEY")
            .context("MEMBERPOOL_ADMIN_KEY not set. Use the ADMIN_API_KEY the API runs with.")?;
        let base_url = std::env::var("MEMBERPOOL_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        Self::new(&base_url, &admin_key)
    }

    /// Create a new client with explicit configuration
    pub fn new(base_url: &str, admin_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", admin_key))
                .context("Invalid admin key format")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List members, optionally filtered by status and a search term
    pub async fn roster(&self, status: Option<&str>, search: Option<&str>) -> Result<String> {
        let mut query = Vec::new();
        if let Some(status) = status {
            query.push(("status", status));
        }
        if let Some(search) = search {
            query.push(("search", search));
        }
        self.get_text("/members", &query).await
    }

    pub async fn member(&self, id: &str) -> Result<String> {
        self.get_text(&format!("/members/{}", id), &[]).await
    }

    pub async fn add_member(&self, name: &str, email: &str, balance: &str) -> Result<String> {
        self.post_text(
            "/members",
            &CreateMemberRequest {
                name: name.to_string(),
                email: email.to_string(),
                balance: balance.to_string(),
            },
        )
        .await
    }

    /// Expire a member (charges every other active member)
    pub async fn expire(&self, id: &str) -> Result<String> {
        self.post_text(&format!("/members/{}/expire", id), &serde_json::json!({}))
            .await
    }

    /// Revert an expired member (refunds the members charged)
    pub async fn revert(&self, id: &str) -> Result<String> {
        self.post_text(&format!("/members/{}/revert", id), &serde_json::json!({}))
            .await
    }

    /// Upload CSV content as a bulk import
    pub async fn import_csv(&self, csv: &str) -> Result<String> {
        let part = Part::text(csv.to_string())
            .file_name("members.csv")
            .mime_str("text/csv")
            .context("Invalid upload content type")?;
        let form = Form::new().part("csv_file", part);

        let url = format!("{}/members/import", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to POST /members/import")?;

        handle_text_response(response).await
    }

    /// Download the error report of a rejected import
    pub async fn import_errors(&self, report_id: &str) -> Result<String> {
        self.get_text(&format!("/members/import/reports/{}", report_id), &[])
            .await
    }

    // --- Internal helpers ---

    async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?;

        handle_text_response(response).await
    }

    async fn post_text<T: Serialize>(&self, path: &str, body: &T) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to POST {}", path))?;

        handle_text_response(response).await
    }
}

async fn handle_text_response(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        anyhow::bail!("API error ({}): {}", status, body);
    }

    Ok(body)
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct CreateMemberRequest {
    name: String,
    email: String,
    /// Sent as a string so no precision is lost
    balance: String,
}
