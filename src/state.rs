use crate::{
    config::Config,
    error::Result,
    services::NotificationService,
    utils::templates,
};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;

/// 应用程序的共享状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 页面模板
    pub templates: Arc<Handlebars<'static>>,

    /// 通知服务
    pub notification_service: NotificationService,
}

impl AppState {
    pub fn new(config: Config, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            config,
            templates: Arc::new(templates::build_registry()?),
            notification_service,
        })
    }

    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        templates::render(&self.templates, template, context)
    }
}
