use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Outcome of a decrypt-request audit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    #[serde(alias = "审核通过")]
    Approved,
    #[serde(alias = "审核拒绝")]
    Rejected,
}

impl AuditStatus {
    pub fn is_approved(self) -> bool {
        self == Self::Approved
    }

    pub fn status_text(self) -> &'static str {
        match self {
            Self::Approved => "审核已通过",
            Self::Rejected => "审核已拒绝",
        }
    }

    pub fn status_color(self) -> &'static str {
        match self {
            Self::Approved => "#2ecc71",
            Self::Rejected => "#e74c3c",
        }
    }

    /// Approved overlays offer "view"; rejected ones only dismiss.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Approved => "查看",
            Self::Rejected => "关闭",
        }
    }
}

/// A request to raise one persistent notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub body: String,
    pub file_path: Option<PathBuf>,
    pub audit_status: AuditStatus,
}

impl NotificationRequest {
    /// Build a request, treating blank fields as absent.
    pub fn new(
        body: Option<String>,
        file_path: Option<String>,
        audit_status: Option<AuditStatus>,
        default_body: &str,
    ) -> Self {
        let body = body
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| default_body.to_string());
        let file_path = file_path
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Self {
            body,
            file_path,
            audit_status: audit_status.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_fall_back_to_defaults() {
        let request = NotificationRequest::new(Some("  ".into()), Some("".into()), None, "default");

        assert_eq!(request.body, "default");
        assert_eq!(request.file_path, None);
        assert_eq!(request.audit_status, AuditStatus::Approved);
    }

    #[test]
    fn audit_status_accepts_both_spellings() {
        let approved: AuditStatus = serde_json::from_str(r#""审核通过""#).unwrap();
        let rejected: AuditStatus = serde_json::from_str(r#""rejected""#).unwrap();

        assert_eq!(approved, AuditStatus::Approved);
        assert_eq!(rejected, AuditStatus::Rejected);
        assert_eq!(serde_json::to_string(&rejected).unwrap(), r#""rejected""#);
    }

    #[test]
    fn status_presentation() {
        assert_eq!(AuditStatus::Approved.status_color(), "#2ecc71");
        assert_eq!(AuditStatus::Rejected.status_text(), "审核已拒绝");
        assert_eq!(AuditStatus::Rejected.button_label(), "关闭");
    }
}
