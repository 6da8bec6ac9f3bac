pub mod composer;
pub mod drive;
pub mod google_auth;
pub mod notification;
pub mod sheets;

// 重新导出常用类型
pub use composer::MessageComposer;
pub use drive::{DriveClient, FileHost};
pub use google_auth::{AccessTokenSource, GoogleAuth, ServiceAccountKey};
pub use notification::NotificationService;
pub use sheets::{RowSink, SheetsClient};
