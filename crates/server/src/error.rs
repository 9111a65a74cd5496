//! Structured errors for tool input handling.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised by tool argument handling, before the gateway is involved.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., unknown HTTP method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No open client has this id.
    #[error("UNKNOWN_CLIENT: {0}")]
    UnknownClient(u64),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::UnknownClient(id) => (-32017, format!("no open client with id {id}")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("method".into()).into();
        assert_eq!(err.code.0, -32602);
        let err: McpError = ToolError::UnknownClient(9).into();
        assert_eq!(err.code.0, -32017);
        assert!(err.message.contains('9'));
    }
}
