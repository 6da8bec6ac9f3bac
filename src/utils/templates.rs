use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{AppError, Result};

pub const LANDING_TEMPLATE: &str = "landing";
pub const COMPOSE_TEMPLATE: &str = "compose";

const LAYOUT_PARTIAL: &str = "layout";

/// 页面模板编译进二进制，启动时注册一次
pub fn build_registry() -> Result<Handlebars<'static>> {
    let mut registry = Handlebars::new();

    registry
        .register_partial(LAYOUT_PARTIAL, include_str!("../../templates/layout.hbs"))
        .map_err(|e| AppError::Configuration(format!("Invalid layout template: {}", e)))?;
    registry
        .register_template_string(LANDING_TEMPLATE, include_str!("../../templates/landing.hbs"))
        .map_err(|e| AppError::Configuration(format!("Invalid landing template: {}", e)))?;
    registry
        .register_template_string(COMPOSE_TEMPLATE, include_str!("../../templates/compose.hbs"))
        .map_err(|e| AppError::Configuration(format!("Invalid compose template: {}", e)))?;

    Ok(registry)
}

pub fn render<T: Serialize>(registry: &Handlebars<'static>, name: &str, context: &T) -> Result<String> {
    Ok(registry.render(name, context)?)
}
