use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_manager::{
    config::Config,
    routes,
    services::{DriveClient, GoogleAuth, NotificationService, ServiceAccountKey, SheetsClient},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Notification Manager ({})...", config.environment);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    // 服务账号凭据，缺失时直接退出
    let key = ServiceAccountKey::from_file(&config.credentials_file).map_err(|e| {
        error!("{}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let auth = Arc::new(GoogleAuth::new(key, http_client.clone(), config.google_token_uri.clone())?);
    let sheets = SheetsClient::new(http_client.clone(), auth.clone(), &config);
    let drive = DriveClient::new(http_client, auth, &config);

    info!(
        "Rows will be appended to spreadsheet {} ({})",
        config.spreadsheet_id,
        config.append_range()
    );

    let notification_service = NotificationService::new(Arc::new(sheets), Arc::new(drive), &config);
    let app_state = Arc::new(AppState::new(config.clone(), notification_service)?);
    let app = routes::build_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
