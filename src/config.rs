use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};

pub const DEFAULT_RECIPIENT_OPTIONS: &str =
    "Employee Master Data,Zummey,SafeBox Energy,Admin Master Data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Google credentials
    pub credentials_file: String,
    pub google_token_uri: Option<String>,
    pub sheets_api_base: String,
    pub drive_api_base: String,
    pub request_timeout_secs: u64,

    // Spreadsheet target
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub sheet_range: String,

    // Form settings
    pub recipient_options: Vec<String>,
    pub max_upload_size: usize,

    // Message signature
    pub signature_name: String,
    pub signature_organization: String,

    // Page chrome
    pub app_title: String,
    pub logo_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 8501,
            environment: "development".to_string(),
            log_level: "notification_manager=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),

            credentials_file: "credentials.json".to_string(),
            google_token_uri: None,
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            request_timeout_secs: 30,

            spreadsheet_id: String::new(),
            sheet_name: "Notification Manager".to_string(),
            sheet_range: "A:E".to_string(),

            recipient_options: parse_list(DEFAULT_RECIPIENT_OPTIONS),
            max_upload_size: 25 * 1024 * 1024,

            signature_name: "Peace Ekeinde".to_string(),
            signature_organization: "Safebox Technologies".to_string(),

            app_title: "SAFEBOX NOTIFICATION SYSTEM".to_string(),
            logo_url: "https://via.placeholder.com/300x100.png?text=Company+Logo".to_string(),
        }
    }
}

impl Config {
    /// 以默认值为基础，用环境变量覆盖
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            server_host: var_or("SERVER_HOST", defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            environment: var_or("ENVIRONMENT", defaults.environment),
            log_level: var_or("LOG_LEVEL", defaults.log_level),
            log_format: var_or("LOG_FORMAT", defaults.log_format),

            credentials_file: var_or("GOOGLE_CREDENTIALS_FILE", defaults.credentials_file),
            google_token_uri: env::var("GOOGLE_TOKEN_URI").ok(),
            sheets_api_base: var_or("SHEETS_API_BASE", defaults.sheets_api_base),
            drive_api_base: var_or("DRIVE_API_BASE", defaults.drive_api_base),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,

            spreadsheet_id: var_or("SPREADSHEET_ID", defaults.spreadsheet_id),
            sheet_name: var_or("SHEET_NAME", defaults.sheet_name),
            sheet_range: var_or("SHEET_RANGE", defaults.sheet_range),

            recipient_options: match env::var("RECIPIENT_OPTIONS") {
                Ok(raw) => parse_list(&raw),
                Err(_) => defaults.recipient_options,
            },
            max_upload_size: parse_var("MAX_UPLOAD_SIZE", defaults.max_upload_size)?,

            signature_name: var_or("SIGNATURE_NAME", defaults.signature_name),
            signature_organization: var_or("SIGNATURE_ORGANIZATION", defaults.signature_organization),

            app_title: var_or("APP_TITLE", defaults.app_title),
            logo_url: var_or("LOGO_URL", defaults.logo_url),
        })
    }

    /// 启动前检查必须由部署方提供的配置
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            anyhow::bail!("SPREADSHEET_ID must be set");
        }
        if self.recipient_options.is_empty() {
            anyhow::bail!("RECIPIENT_OPTIONS must list at least one recipient sheet");
        }
        if self.sheet_name.trim().is_empty() {
            anyhow::bail!("SHEET_NAME must not be empty");
        }
        Ok(())
    }

    /// A1 notation for the append target, e.g. `Notification Manager!A:E`.
    pub fn append_range(&self) -> String {
        format!("{}!{}", self.sheet_name, self.sheet_range)
    }
}

fn var_or(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
