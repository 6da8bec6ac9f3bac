//! Assembles the HTML body written to the message column.
//!
//! Layout, top to bottom:
//! - image block (when placement is `Top`)
//! - the justified text paragraph
//! - image block (when placement is `Bottom` or unset)
//! - download links for non-image attachments
//! - the closing signature, unless the text already signs off

use crate::{
    config::Config,
    error::Result,
    models::{Attachment, AttachmentPosition},
    services::drive::FileHost,
};
use base64::{engine::general_purpose, Engine as _};
use handlebars::html_escape;
use tracing::debug;

/// 正文中出现该短语即视为已包含落款
pub const SIGNATURE_MARKER: &str = "Best regards";

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub organization: String,
}

impl Signature {
    pub fn to_html(&self) -> String {
        format!(
            "<div style='text-align: left;'>{},<br>{}<br>{}</div>",
            SIGNATURE_MARKER,
            html_escape(&self.name),
            html_escape(&self.organization)
        )
    }
}

/// 已上传附件的公开链接
#[derive(Debug, Clone, PartialEq)]
pub struct HostedLink {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub html: String,
    pub links: Vec<HostedLink>,
}

#[derive(Debug, Clone)]
pub struct MessageComposer {
    signature: Signature,
}

impl MessageComposer {
    pub fn new(signature: Signature) -> Self {
        Self { signature }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Signature {
            name: config.signature_name.clone(),
            organization: config.signature_organization.clone(),
        })
    }

    /// Uploads every non-image attachment in order, then lays the message out.
    pub async fn build(
        &self,
        text: &str,
        attachments: &[Attachment],
        position: AttachmentPosition,
        host: &dyn FileHost,
    ) -> Result<ComposedMessage> {
        let mut images = Vec::new();
        let mut links = Vec::new();

        for attachment in attachments {
            if attachment.is_image() {
                images.push(attachment);
            } else {
                let url = host.publish(attachment).await?;
                debug!("Attachment {} hosted at {}", attachment.file_name, url);
                links.push(HostedLink {
                    file_name: attachment.file_name.clone(),
                    url,
                });
            }
        }

        let html = self.compose(text, &images, &links, position);
        Ok(ComposedMessage { html, links })
    }

    pub fn compose(
        &self,
        text: &str,
        images: &[&Attachment],
        links: &[HostedLink],
        position: AttachmentPosition,
    ) -> String {
        // 正文原样写入，不做转义
        let body_html = format!(r#"<p style="text-align: justify; margin: 0;">{}</p>"#, text);

        let images_html: String = images.iter().map(|image| inline_image(image)).collect();

        let mut message = if images_html.is_empty() {
            body_html
        } else {
            let block = format!("<div style='text-align: center;'>{}</div>", images_html);
            match position {
                AttachmentPosition::Top => format!("{}{}", block, body_html),
                AttachmentPosition::Bottom => format!("{}{}", body_html, block),
            }
        };

        if !links.is_empty() {
            let links_html: String = links.iter().map(download_link).collect();
            message.push_str(&format!(
                "<div style='text-align: left; margin-top: 10px;'>{}</div>",
                links_html
            ));
        }

        if !text.contains(SIGNATURE_MARKER) {
            message.push_str(&self.signature.to_html());
        }

        message
    }
}

fn inline_image(image: &Attachment) -> String {
    let encoded = general_purpose::STANDARD.encode(&image.data);
    format!(
        r#"<img src="data:{};base64,{}" style="max-width:100%; margin-bottom:10px;"><br>"#,
        html_escape(&image.content_type),
        encoded
    )
}

fn download_link(link: &HostedLink) -> String {
    format!(
        r#"<a href="{}" target="_blank">Download {}</a><br>"#,
        html_escape(&link.url),
        html_escape(&link.file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;

    struct RecordingHost {
        published: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        fn new() -> Self {
            Self { published: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl FileHost for RecordingHost {
        async fn publish(&self, attachment: &Attachment) -> Result<String> {
            self.published.lock().unwrap().push(attachment.file_name.clone());
            Ok(format!("https://drive.example/{}", attachment.file_name))
        }
    }

    struct FailingHost;

    #[async_trait]
    impl FileHost for FailingHost {
        async fn publish(&self, _attachment: &Attachment) -> Result<String> {
            Err(AppError::external("Drive upload failed (403): quota"))
        }
    }

    fn composer() -> MessageComposer {
        MessageComposer::new(Signature {
            name: "Peace Ekeinde".to_string(),
            organization: "Safebox Technologies".to_string(),
        })
    }

    fn png(name: &str) -> Attachment {
        Attachment::new(name, Some("image/png"), vec![0x89, 0x50, 0x4E, 0x47])
    }

    fn pdf(name: &str) -> Attachment {
        Attachment::new(name, Some("application/pdf"), b"%PDF-1.4".to_vec())
    }

    #[test]
    fn test_plain_text_gets_paragraph_and_signature() {
        let html = composer().compose("Office closes at 4pm", &[], &[], AttachmentPosition::Bottom);
        assert_eq!(
            html,
            "<p style=\"text-align: justify; margin: 0;\">Office closes at 4pm</p>\
             <div style='text-align: left;'>Best regards,<br>Peace Ekeinde<br>Safebox Technologies</div>"
        );
    }

    #[test]
    fn test_existing_signature_is_not_duplicated() {
        let html = composer().compose(
            "See you there.\nBest regards, HR",
            &[],
            &[],
            AttachmentPosition::Bottom,
        );
        assert_eq!(html.matches(SIGNATURE_MARKER).count(), 1);
        assert!(!html.contains("Peace Ekeinde"));
    }

    #[test]
    fn test_images_on_top() {
        let image = png("chart.png");
        let html = composer().compose("Body", &[&image], &[], AttachmentPosition::Top);

        let image_at = html.find("<img src=\"data:image/png;base64,iVBORw==\"").unwrap();
        let body_at = html.find("<p style=").unwrap();
        assert!(image_at < body_at);
        assert!(html.starts_with("<div style='text-align: center;'>"));
    }

    #[test]
    fn test_images_at_bottom() {
        let image = png("chart.png");
        let html = composer().compose("Body", &[&image], &[], AttachmentPosition::Bottom);

        let image_at = html.find("<img").unwrap();
        let body_at = html.find("<p style=").unwrap();
        assert!(body_at < image_at);
    }

    #[test]
    fn test_formatted_text_is_kept_verbatim() {
        let text = r#"<span style="color:red">Urgent</span> <table><tr><td>x</td></tr></table>"#;
        let html = composer().compose(text, &[], &[], AttachmentPosition::Bottom);

        assert!(html.starts_with(&format!(
            r#"<p style="text-align: justify; margin: 0;">{}</p>"#,
            text
        )));
        assert!(!html.contains("<tbody>"));
    }

    #[test]
    fn test_link_text_is_escaped() {
        let links = vec![HostedLink {
            file_name: "<q3>.pdf".to_string(),
            url: "https://drive.example/file?id=1&x=2".to_string(),
        }];
        let html = composer().compose("Body", &[], &links, AttachmentPosition::Bottom);
        assert!(html.contains("Download &lt;q3&gt;.pdf"));
        assert!(html.contains("id&#x3D;1&amp;x&#x3D;2"));
    }

    #[tokio::test]
    async fn test_build_uploads_only_non_images_in_order() {
        let host = RecordingHost::new();
        let attachments = vec![pdf("a.pdf"), png("b.png"), pdf("c.pdf")];

        let composed = composer()
            .build("Body", &attachments, AttachmentPosition::Top, &host)
            .await
            .unwrap();

        assert_eq!(*host.published.lock().unwrap(), vec!["a.pdf", "c.pdf"]);
        assert_eq!(composed.links.len(), 2);

        let first = composed.html.find("Download a.pdf").unwrap();
        let second = composed.html.find("Download c.pdf").unwrap();
        let body = composed.html.find("<p style=").unwrap();
        assert!(body < first && first < second);
        assert!(composed.html.contains("href=\"https://drive.example/a.pdf\""));
    }

    #[tokio::test]
    async fn test_build_propagates_upload_failure() {
        let err = composer()
            .build("Body", &[pdf("a.pdf")], AttachmentPosition::Bottom, &FailingHost)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    fn position_strategy() -> impl Strategy<Value = AttachmentPosition> {
        prop_oneof![Just(AttachmentPosition::Top), Just(AttachmentPosition::Bottom)]
    }

    proptest! {
        #[test]
        fn prop_links_always_follow_body_and_images(
            text in "[A-Za-z0-9 .,]{0,80}",
            image_count in 0usize..3,
            link_names in proptest::collection::vec("[a-z]{1,8}\\.pdf", 1..4),
            position in position_strategy(),
        ) {
            let images: Vec<Attachment> = (0..image_count).map(|i| png(&format!("img{}.png", i))).collect();
            let image_refs: Vec<&Attachment> = images.iter().collect();
            let links: Vec<HostedLink> = link_names
                .iter()
                .map(|name| HostedLink { file_name: name.clone(), url: format!("https://d.example/{}", name) })
                .collect();

            let html = composer().compose(&text, &image_refs, &links, position);

            let body_at = html.find("<p style=").unwrap();
            let links_at = html.find("<div style='text-align: left; margin-top: 10px;'>").unwrap();
            prop_assert!(body_at < links_at);
            if let Some(last_image) = html.rfind("<img") {
                prop_assert!(last_image < links_at);
            }
            prop_assert_eq!(html.matches("target=\"_blank\">Download ").count(), links.len());
        }

        #[test]
        fn prop_image_block_follows_position(
            text in "[A-Za-z0-9 ]{0,40}",
            image_count in 1usize..4,
            position in position_strategy(),
        ) {
            let images: Vec<Attachment> = (0..image_count).map(|i| png(&format!("img{}.png", i))).collect();
            let image_refs: Vec<&Attachment> = images.iter().collect();

            let html = composer().compose(&text, &image_refs, &[], position);

            let body_at = html.find("<p style=").unwrap();
            let first_image = html.find("<img").unwrap();
            let last_image = html.rfind("<img").unwrap();
            prop_assert_eq!(html.matches("<img").count(), image_count);
            match position {
                AttachmentPosition::Top => prop_assert!(last_image < body_at),
                AttachmentPosition::Bottom => prop_assert!(body_at < first_image),
            }
        }

        #[test]
        fn prop_signature_appended_exactly_once_when_absent(
            text in "[A-Za-z0-9 .,]{0,80}",
            position in position_strategy(),
        ) {
            let html = composer().compose(&text, &[], &[], position);
            if text.contains(SIGNATURE_MARKER) {
                prop_assert!(!html.contains("Peace Ekeinde"));
            } else {
                prop_assert_eq!(html.matches("Best regards,<br>Peace Ekeinde").count(), 1);
                prop_assert!(html.ends_with("Safebox Technologies</div>"));
            }
        }

        #[test]
        fn prop_signature_never_added_when_present(
            prefix in "[A-Za-z0-9 ]{0,40}",
            suffix in "[A-Za-z0-9 ]{0,40}",
        ) {
            let text = format!("{}{},{}", prefix, SIGNATURE_MARKER, suffix);
            let html = composer().compose(&text, &[], &[], AttachmentPosition::Bottom);
            prop_assert!(!html.contains("<div style='text-align: left;'>Best regards"));
        }
    }
}
