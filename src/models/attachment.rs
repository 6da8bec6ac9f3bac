use serde::{Deserialize, Serialize};

use crate::utils::mime::content_type_for;

/// 用户上传的附件
#[derive(Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Falls back to extension-based detection when the browser sent no
    /// usable content type.
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = match content_type.map(str::trim) {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
            _ => content_type_for(&file_name).to_string(),
        };

        Self {
            file_name,
            content_type,
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_detection_uses_content_type() {
        let png = Attachment::new("chart.png", Some("image/png"), vec![1, 2, 3]);
        assert!(png.is_image());

        let pdf = Attachment::new("report.pdf", Some("application/pdf"), vec![]);
        assert!(!pdf.is_image());
    }

    #[test]
    fn test_missing_content_type_falls_back_to_extension() {
        let jpg = Attachment::new("photo.JPG", None, vec![]);
        assert_eq!(jpg.content_type, "image/jpeg");
        assert!(jpg.is_image());

        let generic = Attachment::new("scan.png", Some("application/octet-stream"), vec![]);
        assert_eq!(generic.content_type, "image/png");

        let unknown = Attachment::new("data.bin", Some(""), vec![]);
        assert_eq!(unknown.content_type, "application/octet-stream");
    }
}
