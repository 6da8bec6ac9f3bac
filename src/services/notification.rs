use crate::{
    config::Config,
    error::Result,
    models::{Attachment, DeliveryMode, NotificationForm, NotificationReceipt, NotificationRow},
    services::{composer::MessageComposer, drive::FileHost, sheets::RowSink},
    utils::validation::{validate_recipient_group, validate_schedule_date},
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

/// 一次表单提交：校验、上传附件、拼装正文、追加行
#[derive(Clone)]
pub struct NotificationService {
    sink: Arc<dyn RowSink>,
    host: Arc<dyn FileHost>,
    composer: MessageComposer,
    recipient_options: Arc<Vec<String>>,
}

impl NotificationService {
    pub fn new(sink: Arc<dyn RowSink>, host: Arc<dyn FileHost>, config: &Config) -> Self {
        Self {
            sink,
            host,
            composer: MessageComposer::from_config(config),
            recipient_options: Arc::new(config.recipient_options.clone()),
        }
    }

    pub fn recipient_options(&self) -> &[String] {
        &self.recipient_options
    }

    /// `today` is the caller's local calendar date; scheduled sends must be
    /// strictly after it.
    pub async fn submit(
        &self,
        mode: DeliveryMode,
        form: NotificationForm,
        attachments: Vec<Attachment>,
        today: NaiveDate,
    ) -> Result<NotificationReceipt> {
        form.validate()?;
        validate_recipient_group(&form.recipient_group, &self.recipient_options)?;
        if mode == DeliveryMode::Scheduled {
            validate_schedule_date(form.notification_date, today)?;
        }

        let position = form.attachment_position.unwrap_or_default();
        let composed = self
            .composer
            .build(&form.message, &attachments, position, self.host.as_ref())
            .await
            .map_err(|e| {
                error!("Failed to prepare attachments for {:?} notification: {}", mode, e);
                e
            })?;

        let row = NotificationRow::new(
            form.subject,
            form.recipient_group,
            composed.html,
            form.notification_date,
        );

        let outcome = self.sink.append_row(&row).await.map_err(|e| {
            error!("Failed to append {:?} notification row: {}", mode, e);
            e
        })?;

        info!(
            "{:?} notification recorded for {} on {} ({} attachment(s))",
            mode,
            row.recipient_group,
            row.date,
            attachments.len()
        );

        Ok(NotificationReceipt {
            mode,
            date: row.date,
            updated_range: outcome.updated_range,
            uploaded_links: composed.links.into_iter().map(|link| link.url).collect(),
        })
    }
}
