pub mod attachment;
pub mod notification;

pub use attachment::Attachment;
pub use notification::{
    AttachmentPosition, DeliveryMode, NotificationForm, NotificationReceipt, NotificationRow,
};
