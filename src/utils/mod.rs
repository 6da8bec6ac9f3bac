pub mod mime;
pub mod templates;
pub mod validation;
