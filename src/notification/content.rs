use serde::Serialize;

use super::request::NotificationRequest;

/// Everything the overlay template displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayContent {
    pub title: String,
    pub body: String,
    pub status_text: String,
    pub status_color: String,
    pub button_label: String,
    pub action_enabled: bool,
}

impl OverlayContent {
    pub fn from_request(request: &NotificationRequest, title: &str) -> Self {
        let status = request.audit_status;
        Self {
            title: title.to_string(),
            body: request.body.clone(),
            status_text: status.status_text().to_string(),
            status_color: status.status_color().to_string(),
            button_label: status.button_label().to_string(),
            action_enabled: status.is_approved(),
        }
    }

    /// Script that hands the content to the template.
    ///
    /// Content travels as a JSON literal so quotes and markup in the body
    /// never reach the page as code.
    pub fn render_script(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("window.setNotificationContent({json});"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::AuditStatus;

    #[test]
    fn rejected_content_disables_action() {
        let request = NotificationRequest {
            body: "denied".into(),
            file_path: None,
            audit_status: AuditStatus::Rejected,
        };
        let content = OverlayContent::from_request(&request, "title");

        assert!(!content.action_enabled);
        assert_eq!(content.button_label, "关闭");
        assert_eq!(content.status_color, "#e74c3c");
    }

    #[test]
    fn render_script_escapes_body() {
        let request = NotificationRequest {
            body: "</script><b>\"x\"</b>".into(),
            file_path: None,
            audit_status: AuditStatus::Approved,
        };
        let script = OverlayContent::from_request(&request, "t")
            .render_script()
            .unwrap();

        assert!(script.starts_with("window.setNotificationContent({"));
        assert!(script.contains(r#"\"x\""#));
        assert!(script.ends_with("});"));
    }
}
