use crate::{
    config::Config,
    error::{AppError, Result},
    models::NotificationRow,
    services::google_auth::{api_error, AccessTokenSource},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Destination for finished notification rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append_row(&self, row: &NotificationRow) -> Result<AppendOutcome>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendOutcome {
    pub updated_range: Option<String>,
    pub updated_rows: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendValuesResponse {
    #[serde(default)]
    updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    updated_range: Option<String>,
    updated_rows: Option<i64>,
}

/// Google Sheets v4 客户端，只负责追加行
#[derive(Clone)]
pub struct SheetsClient {
    http_client: Client,
    auth: Arc<dyn AccessTokenSource>,
    base_url: String,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    pub fn new(http_client: Client, auth: Arc<dyn AccessTokenSource>, config: &Config) -> Self {
        Self {
            http_client,
            auth,
            base_url: config.sheets_api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.append_range(),
        }
    }

    pub fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(&self.range)
        )
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn append_row(&self, row: &NotificationRow) -> Result<AppendOutcome> {
        let token = self.auth.access_token().await?;
        let url = self.append_url();

        debug!("Appending notification row to {} ({})", self.spreadsheet_id, self.range);

        let response = self
            .http_client
            .post(&url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token)
            .json(&json!({ "values": [row.to_values()] }))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Sheets API: {}", e);
                AppError::external(format!("Failed to reach Google Sheets: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error("Sheets append", response).await);
        }

        let body: AppendValuesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Sheets append response: {}", e);
            AppError::external("Invalid response from Google Sheets")
        })?;

        let outcome = match body.updates {
            Some(updates) => AppendOutcome {
                updated_range: updates.updated_range,
                updated_rows: updates.updated_rows,
            },
            None => AppendOutcome::default(),
        };

        info!(
            "Notification row appended: range={}",
            outcome.updated_range.as_deref().unwrap_or("unknown")
        );

        Ok(outcome)
    }
}
