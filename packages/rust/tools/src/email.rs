//! Email provider. Delivery is a logging stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use evana_shared::Result;

/// Outcome of a send, as returned to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub success: bool,
    pub message: String,
    pub recipients: Vec<String>,
}

impl EmailReceipt {
    pub fn delivered(recipients: Vec<String>) -> Self {
        Self {
            success: true,
            message: format!("Email sent successfully to {} recipient(s)", recipients.len()),
            recipients,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            recipients: Vec::new(),
        }
    }
}

/// Email backend used by the `send_email` tool.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<EmailReceipt>;
}

/// Records the send in the log and reports success.
#[derive(Debug, Clone)]
pub struct LogEmailProvider {
    sender: String,
}

impl LogEmailProvider {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<EmailReceipt> {
        info!(
            from = %self.sender,
            to = %to.join(", "),
            subject,
            body_len = body.len(),
            "email dispatched"
        );
        Ok(EmailReceipt::delivered(to.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_reports_every_recipient() {
        let provider = LogEmailProvider::new("evana@localhost");
        let to = vec!["a@x.io".to_string(), "b@x.io".to_string()];
        let receipt = provider.send(&to, "Plan", "Details").await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message, "Email sent successfully to 2 recipient(s)");
        assert_eq!(receipt.recipients, to);
    }

    #[test]
    fn failed_receipt_serializes_empty_recipients() {
        let json = serde_json::to_value(EmailReceipt::failed("smtp down")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "smtp down", "recipients": []})
        );
    }
}
