use crate::{
    config::Config,
    error::{AppError, Result},
    models::Attachment,
    services::google_auth::{api_error, AccessTokenSource},
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Publishes a file somewhere and returns a link anyone can open.
#[async_trait]
pub trait FileHost: Send + Sync {
    async fn publish(&self, attachment: &Attachment) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileLink {
    web_view_link: Option<String>,
}

/// Google Drive v3 客户端：上传、公开分享、获取链接
#[derive(Clone)]
pub struct DriveClient {
    http_client: Client,
    auth: Arc<dyn AccessTokenSource>,
    base_url: String,
}

impl DriveClient {
    pub fn new(http_client: Client, auth: Arc<dyn AccessTokenSource>, config: &Config) -> Self {
        Self {
            http_client,
            auth,
            base_url: config.drive_api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn create_file(&self, token: &str, attachment: &Attachment) -> Result<String> {
        let boundary = format!("notification-manager-{}", Uuid::new_v4().simple());
        let metadata = serde_json::to_vec(&json!({
            "name": attachment.file_name,
            "mimeType": attachment.content_type,
        }))?;
        let body = multipart_related_body(&boundary, &metadata, &attachment.content_type, &attachment.data);

        let response = self
            .http_client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Drive upload endpoint: {}", e);
                AppError::external(format!("Failed to reach Google Drive: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error("Drive upload", response).await);
        }

        let created: CreatedFile = response.json().await.map_err(|e| {
            error!("Failed to parse Drive upload response: {}", e);
            AppError::external("Invalid response from Google Drive")
        })?;

        Ok(created.id)
    }

    async fn share_publicly(&self, token: &str, file_id: &str) -> Result<()> {
        let response = self
            .http_client
            .post(format!(
                "{}/drive/v3/files/{}/permissions",
                self.base_url,
                urlencoding::encode(file_id)
            ))
            .bearer_auth(token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await
            .map_err(|e| AppError::external(format!("Failed to reach Google Drive: {}", e)))?;

        if !response.status().is_success() {
            return Err(api_error("Drive permission", response).await);
        }
        Ok(())
    }

    async fn web_view_link(&self, token: &str, file_id: &str) -> Result<String> {
        let response = self
            .http_client
            .get(format!(
                "{}/drive/v3/files/{}",
                self.base_url,
                urlencoding::encode(file_id)
            ))
            .query(&[("fields", "webViewLink")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::external(format!("Failed to reach Google Drive: {}", e)))?;

        if !response.status().is_success() {
            return Err(api_error("Drive metadata", response).await);
        }

        let link: FileLink = response.json().await.map_err(|e| {
            error!("Failed to parse Drive metadata response: {}", e);
            AppError::external("Invalid response from Google Drive")
        })?;

        link.web_view_link
            .ok_or_else(|| AppError::external(format!("Drive returned no link for file {}", file_id)))
    }
}

#[async_trait]
impl FileHost for DriveClient {
    async fn publish(&self, attachment: &Attachment) -> Result<String> {
        let token = self.auth.access_token().await?;

        debug!("Uploading {:?} to Drive", attachment);
        let file_id = self.create_file(&token, attachment).await?;
        self.share_publicly(&token, &file_id).await?;
        let link = self.web_view_link(&token, &file_id).await?;

        info!("Published {} to Drive as {}", attachment.file_name, file_id);
        Ok(link)
    }
}

/// Builds a `multipart/related` body: JSON metadata part, then the media part.
pub fn multipart_related_body(boundary: &str, metadata: &[u8], content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
