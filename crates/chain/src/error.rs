//! Error taxonomy for chain queries, broadcasts and message construction.

use thiserror::Error;

/// Code used when the remote side failed without reporting one.
pub const UNKNOWN_ERROR_CODE: i64 = -1;

/// Structured failure reported by a remote collaborator (LCD, signer, fee
/// estimator, HTTP service). Carries no action name; the caller attaches one
/// when converting into a [`ChainError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} : {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Remote failure without a protocol error code (transport, decode, timeout).
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UNKNOWN_ERROR_CODE, message)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        let code = e
            .status()
            .map(|s| i64::from(s.as_u16()))
            .unwrap_or(UNKNOWN_ERROR_CODE);
        Self::new(code, e.to_string())
    }
}

/// Typed errors surfaced by the keeper pipeline.
///
/// Risk calculations that cannot be computed return `None` and have no
/// variant here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A contract query, HTTP lookup, signing call or broadcast failed.
    #[error("Anchor error: {action}\n{code} : {message}")]
    Query {
        action: String,
        code: i64,
        message: String,
    },

    /// The chain accepted the broadcast but execution failed.
    #[error("transaction rejected\n{code} : {raw_log}")]
    TxRejected { code: u32, raw_log: String },

    /// A message builder received a malformed address or amount.
    #[error("invalid intent: {reason}")]
    InvalidIntent { reason: String },
}

impl ChainError {
    /// Attach the originating action name to a remote failure.
    pub fn query(action: impl Into<String>, err: RemoteError) -> Self {
        Self::Query {
            action: action.into(),
            code: err.code,
            message: err.message,
        }
    }

    /// Response arrived but did not have the expected shape.
    pub fn malformed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            action: action.into(),
            code: UNKNOWN_ERROR_CODE,
            message: message.into(),
        }
    }

    pub fn invalid_intent(reason: impl Into<String>) -> Self {
        Self::InvalidIntent {
            reason: reason.into(),
        }
    }

    /// Action name for query failures, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Query { action, .. } => Some(action),
            _ => None,
        }
    }

    /// HTML rendering for the chat front-end (Telegram parse mode).
    pub fn render_html(&self) -> String {
        match self {
            Self::Query {
                action,
                code,
                message,
            } => format!(
                "❗️ Anchor error: <code>{}</code>\n<pre>{} : {}</pre>",
                escape_html(action),
                code,
                escape_html(message)
            ),
            Self::TxRejected { code, raw_log } => format!(
                "❗️ Transaction rejected\n<pre>{} : {}</pre>",
                code,
                escape_html(raw_log)
            ),
            Self::InvalidIntent { reason } => {
                format!("❗️ Invalid request: {}", escape_html(reason))
            }
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_action() {
        let err = ChainError::query("read_position", RemoteError::new(3, "not found"));
        assert_eq!(err.action(), Some("read_position"));
        assert_eq!(err.to_string(), "Anchor error: read_position\n3 : not found");
    }

    #[test]
    fn test_render_html_escapes_message() {
        let err = ChainError::malformed("borrow_apy", "expected <number>");
        let html = err.render_html();
        assert!(html.contains("<code>borrow_apy</code>"));
        assert!(html.contains("-1 : expected &lt;number&gt;"));
    }

    #[test]
    fn test_tx_rejected_display() {
        let err = ChainError::TxRejected {
            code: 5,
            raw_log: "insufficient funds".to_string(),
        };
        assert_eq!(err.to_string(), "transaction rejected\n5 : insufficient funds");
    }
}
