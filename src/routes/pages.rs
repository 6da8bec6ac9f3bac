use crate::{
    error::{AppError, Result},
    models::{notification::DATE_FORMAT, Attachment, AttachmentPosition, DeliveryMode, NotificationForm},
    state::AppState,
    utils::{
        templates::{COMPOSE_TEMPLATE, LANDING_TEMPLATE},
        validation::parse_form_date,
    },
};
use axum::{
    extract::{Multipart, State},
    response::Html,
    routing::get,
    Router,
};
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing_page))
        .route("/instant", get(instant_page).post(submit_instant))
        .route("/scheduled", get(scheduled_page).post(submit_scheduled))
}

#[derive(Debug, Serialize)]
struct LandingView<'a> {
    page_title: &'a str,
    app_title: &'a str,
    logo_url: &'a str,
}

#[derive(Debug, Serialize)]
struct RecipientOption {
    name: String,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct Flash {
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ComposeView<'a> {
    page_title: &'static str,
    app_title: &'a str,
    intro: &'static str,
    action: &'static str,
    subject_label: &'static str,
    date_label: &'static str,
    subject: String,
    message: String,
    notification_date: String,
    min_date: Option<String>,
    position_top: bool,
    recipients: Vec<RecipientOption>,
    flash: Option<Flash>,
}

/// 表单原始字段，日期和位置在提交后再解析
#[derive(Debug, Default)]
pub struct RawSubmission {
    pub subject: String,
    pub recipient_group: String,
    pub notification_date: String,
    pub message: String,
    pub attachment_position: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl RawSubmission {
    pub fn to_form(&self) -> Result<NotificationForm> {
        let notification_date = parse_form_date(&self.notification_date)?;
        let attachment_position = match self.attachment_position.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<AttachmentPosition>().map_err(AppError::Validation)?),
        };

        Ok(NotificationForm {
            subject: self.subject.trim().to_string(),
            recipient_group: self.recipient_group.clone(),
            notification_date,
            message: self.message.trim().to_string(),
            attachment_position,
        })
    }
}

/// 本地日历日期
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn default_date(mode: DeliveryMode, today: NaiveDate) -> NaiveDate {
    match mode {
        DeliveryMode::Instant => today,
        DeliveryMode::Scheduled => today + Duration::days(1),
    }
}

/// GET /
pub async fn landing_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let view = LandingView {
        page_title: "Home",
        app_title: &state.config.app_title,
        logo_url: &state.config.logo_url,
    };
    Ok(Html(state.render(LANDING_TEMPLATE, &view)?))
}

/// GET /instant
pub async fn instant_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    render_blank(&state, DeliveryMode::Instant, None)
}

/// GET /scheduled
pub async fn scheduled_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    render_blank(&state, DeliveryMode::Scheduled, None)
}

/// POST /instant
pub async fn submit_instant(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Html<String>> {
    submit(&state, DeliveryMode::Instant, multipart).await
}

/// POST /scheduled
pub async fn submit_scheduled(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Html<String>> {
    submit(&state, DeliveryMode::Scheduled, multipart).await
}

async fn submit(state: &AppState, mode: DeliveryMode, multipart: Multipart) -> Result<Html<String>> {
    let mut raw = match read_submission(multipart).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Rejected {:?} submission: {}", mode, e);
            return render_blank(state, mode, Some(error_flash(mode, &e)));
        }
    };

    debug!(
        "{:?} submission: subject={:?}, recipient={:?}, date={:?}, attachments={}",
        mode,
        raw.subject,
        raw.recipient_group,
        raw.notification_date,
        raw.attachments.len()
    );

    let attachments = std::mem::take(&mut raw.attachments);
    let result = match raw.to_form() {
        Ok(form) => {
            state
                .notification_service
                .submit(mode, form, attachments, today())
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(receipt) => {
            info!("{:?} notification accepted for {}", mode, receipt.date);
            let flash = Flash {
                kind: "success",
                text: receipt.message(),
            };
            render_blank(state, mode, Some(flash))
        }
        Err(e) => {
            if e.is_user_error() {
                debug!("{:?} submission failed validation: {}", mode, e);
            } else {
                error!("{:?} submission failed: {}", mode, e);
            }
            render_compose(state, mode, &raw, Some(error_flash(mode, &e)))
        }
    }
}

fn error_flash(mode: DeliveryMode, err: &AppError) -> Flash {
    let text = if err.is_user_error() {
        err.user_message()
    } else {
        mode.failure_message(&err.user_message())
    };
    Flash { kind: "error", text }
}

fn render_blank(state: &AppState, mode: DeliveryMode, flash: Option<Flash>) -> Result<Html<String>> {
    let raw = RawSubmission {
        notification_date: default_date(mode, today()).format(DATE_FORMAT).to_string(),
        ..Default::default()
    };
    render_compose(state, mode, &raw, flash)
}

fn render_compose(
    state: &AppState,
    mode: DeliveryMode,
    raw: &RawSubmission,
    flash: Option<Flash>,
) -> Result<Html<String>> {
    let recipients = state
        .notification_service
        .recipient_options()
        .iter()
        .enumerate()
        .map(|(index, name)| RecipientOption {
            name: name.clone(),
            selected: if raw.recipient_group.is_empty() {
                index == 0
            } else {
                *name == raw.recipient_group
            },
        })
        .collect();

    let min_date = match mode {
        DeliveryMode::Instant => None,
        DeliveryMode::Scheduled => Some(default_date(mode, today()).format(DATE_FORMAT).to_string()),
    };

    let view = ComposeView {
        page_title: mode.title(),
        app_title: &state.config.app_title,
        intro: mode.intro(),
        action: mode.path(),
        subject_label: mode.subject_label(),
        date_label: mode.date_label(),
        subject: raw.subject.clone(),
        message: raw.message.clone(),
        notification_date: raw.notification_date.clone(),
        min_date,
        position_top: raw.attachment_position.as_deref() == Some("Top"),
        recipients,
        flash,
    };

    Ok(Html(state.render(COMPOSE_TEMPLATE, &view)?))
}

/// Reads every multipart field; file inputs left empty by the browser are
/// skipped.
pub async fn read_submission(mut multipart: Multipart) -> Result<RawSubmission> {
    let mut raw = RawSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::FileUpload("Could not read the submitted form. Attachments may be too large.".to_string())
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "attachments" {
            let file_name = field.file_name().map(|s| s.to_string()).unwrap_or_default();
            let content_type = field.content_type().map(|s| s.to_string());

            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read attachment {}: {}", file_name, e);
                AppError::FileUpload(format!("Could not read attachment {}", file_name))
            })?;

            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            let file_name = if file_name.is_empty() {
                "attachment".to_string()
            } else {
                file_name
            };

            raw.attachments
                .push(Attachment::new(file_name, content_type.as_deref(), data.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(|e| {
            error!("Failed to read form field {}: {}", field_name, e);
            AppError::BadRequest(format!("Could not read form field {}", field_name))
        })?;

        match field_name.as_str() {
            "subject" => raw.subject = value,
            "recipient_group" => raw.recipient_group = value,
            "notification_date" => raw.notification_date = value,
            "message" => raw.message = value,
            "attachment_position" => raw.attachment_position = Some(value),
            other => debug!("Ignoring unexpected form field: {}", other),
        }
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_submission_to_form() {
        let raw = RawSubmission {
            subject: "  Reminder ".to_string(),
            recipient_group: "Zummey".to_string(),
            notification_date: "2026-11-01".to_string(),
            message: "Hello\n".to_string(),
            attachment_position: Some("Top".to_string()),
            attachments: vec![],
        };

        let form = raw.to_form().unwrap();
        assert_eq!(form.subject, "Reminder");
        assert_eq!(form.message, "Hello");
        assert_eq!(form.notification_date, NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
        assert_eq!(form.attachment_position, Some(AttachmentPosition::Top));
    }

    #[test]
    fn test_raw_submission_rejects_bad_values() {
        let mut raw = RawSubmission {
            notification_date: "tomorrow".to_string(),
            ..Default::default()
        };
        assert!(raw.to_form().is_err());

        raw.notification_date = "2026-11-01".to_string();
        raw.attachment_position = Some("Sideways".to_string());
        assert!(raw.to_form().unwrap_err().is_user_error());

        raw.attachment_position = Some(String::new());
        assert_eq!(raw.to_form().unwrap().attachment_position, None);
    }

    #[test]
    fn test_default_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(default_date(DeliveryMode::Instant, today), today);
        assert_eq!(
            default_date(DeliveryMode::Scheduled, today),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()
        );
    }
}
