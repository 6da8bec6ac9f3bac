use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// 第五列固定写入的状态值，投递端据此识别待发送的行
pub const STATUS_SEND: &str = "send";

/// Date format written to column D.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 通知发送模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Instant,
    Scheduled,
}

impl DeliveryMode {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Instant => "/instant",
            Self::Scheduled => "/scheduled",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Instant => "Instant Messaging",
            Self::Scheduled => "Scheduling Message",
        }
    }

    pub fn intro(&self) -> &'static str {
        match self {
            Self::Instant => "Fill in the details below to send your notification immediately.",
            Self::Scheduled => {
                "Fill in the details below to schedule your notification. The message will trigger on the set date."
            }
        }
    }

    pub fn subject_label(&self) -> &'static str {
        match self {
            Self::Instant => "Subject",
            Self::Scheduled => "Subject (Notification Type)",
        }
    }

    pub fn date_label(&self) -> &'static str {
        match self {
            Self::Instant => "Notification Date",
            Self::Scheduled => "Scheduled Date",
        }
    }

    pub fn success_message(&self, date: NaiveDate) -> String {
        match self {
            Self::Instant => "Notification sent successfully!".to_string(),
            Self::Scheduled => format!(
                "Notification scheduled successfully for {}!",
                date.format(DATE_FORMAT)
            ),
        }
    }

    pub fn failure_message(&self, cause: &str) -> String {
        match self {
            Self::Instant => format!("An error occurred while sending the notification: {}", cause),
            Self::Scheduled => format!("An error occurred while scheduling the notification: {}", cause),
        }
    }
}

/// 图片附件相对正文的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttachmentPosition {
    Top,
    #[default]
    Bottom,
}

impl FromStr for AttachmentPosition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Top" | "top" => Ok(Self::Top),
            "Bottom" | "bottom" => Ok(Self::Bottom),
            other => Err(format!("Unknown attachment position: {}", other)),
        }
    }
}

impl fmt::Display for AttachmentPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "Top"),
            Self::Bottom => write!(f, "Bottom"),
        }
    }
}

/// 表单提交内容（附件单独传递）
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationForm {
    #[validate(length(min = 1, max = 200, message = "Subject is required and must be at most 200 characters."))]
    pub subject: String,

    #[validate(length(min = 1, message = "Please choose a recipient sheet."))]
    pub recipient_group: String,

    pub notification_date: NaiveDate,

    #[validate(length(min = 1, max = 20000, message = "Notification message is required and must be at most 20000 characters."))]
    pub message: String,

    pub attachment_position: Option<AttachmentPosition>,
}

/// 追加到表格中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRow {
    pub subject: String,
    pub recipient_group: String,
    pub message_html: String,
    pub date: NaiveDate,
}

impl NotificationRow {
    pub fn new(subject: String, recipient_group: String, message_html: String, date: NaiveDate) -> Self {
        Self {
            subject,
            recipient_group,
            message_html,
            date,
        }
    }

    /// Values in column order A..E.
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.subject.clone(),
            self.recipient_group.clone(),
            self.message_html.clone(),
            self.date.format(DATE_FORMAT).to_string(),
            STATUS_SEND.to_string(),
        ]
    }
}

/// 成功写入后的回执
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub mode: DeliveryMode,
    pub date: NaiveDate,
    pub updated_range: Option<String>,
    pub uploaded_links: Vec<String>,
}

impl NotificationReceipt {
    pub fn message(&self) -> String {
        self.mode.success_message(self.date)
    }
}
