//! Email action tool: persists a drafted email as JSON.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::email_format::{EmailDraft, split_subject};
use crate::error::ToolError;
use crate::io::atomic::write_json_atomic;

/// External action invoked by a plan step with a structured payload.
pub trait ActionTool {
    /// Perform the action and return its success message.
    fn invoke(&self, payload: &str) -> Result<String, ToolError>;
}

impl<T: ActionTool + ?Sized> ActionTool for &T {
    fn invoke(&self, payload: &str) -> Result<String, ToolError> {
        (**self).invoke(payload)
    }
}

/// Payload handed to the email tool: `{"receiver": .., "content": ..}`.
pub fn email_payload(receiver: &str, content: &str) -> String {
    serde_json::json!({
        "receiver": receiver,
        "content": content,
    })
    .to_string()
}

/// Writes `{receiver, subject, content}` to a JSON file.
#[derive(Debug, Clone)]
pub struct EmailFileTool {
    output_path: PathBuf,
}

impl EmailFileTool {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl ActionTool for EmailFileTool {
    #[instrument(skip_all, fields(output_path = %self.output_path.display()))]
    fn invoke(&self, payload: &str) -> Result<String, ToolError> {
        let value: Value = serde_json::from_str(payload).map_err(|err| {
            warn!(err = %err, "email payload is not valid JSON");
            ToolError::Format("Error: Invalid JSON format in email data".to_string())
        })?;

        let field = |name: &str| value.get(name).and_then(Value::as_str);
        let (Some(receiver), Some(draft)) = (field("receiver"), field("content")) else {
            warn!("email payload is missing required fields");
            return Err(ToolError::Validation(
                "Error saving email data: Missing required fields in email data".to_string(),
            ));
        };

        let (subject, content) = split_subject(draft);
        let email = EmailDraft {
            receiver: receiver.to_string(),
            subject,
            content,
        };
        write_json_atomic(&self.output_path, &email)
            .map_err(|err| ToolError::Failed(format!("Error saving email data: {err:#}")))?;

        info!(receiver = %email.receiver, "email data saved");
        let EmailDraft { receiver, .. } = email;
        Ok(format!("Email data saved successfully for {receiver}"))
    }
}
