//! Per-recipient delivery results.

use outbox_smtp::Reply;
use serde::{Deserialize, Serialize};

/// What the server said about one envelope recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Recipient address.
    pub address: String,
    /// True if `RCPT TO` was accepted.
    pub accepted: bool,
    /// Reply code of a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Enhanced status code of a rejection, e.g. `5.1.1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced: Option<String>,
    /// Server text of a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeliveryOutcome {
    /// An accepted recipient.
    #[must_use]
    pub fn accepted(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            accepted: true,
            code: None,
            enhanced: None,
            detail: None,
        }
    }

    /// A recipient the server refused with `reply`.
    #[must_use]
    pub fn rejected(address: impl Into<String>, reply: &Reply) -> Self {
        Self {
            address: address.into(),
            accepted: false,
            code: Some(reply.code.as_u16()),
            enhanced: reply.enhanced.map(|code| code.to_string()),
            detail: Some(reply.message_text()),
        }
    }
}

/// A message the server accepted for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    /// Server that took the message, as `host:port`.
    pub server: String,
    /// One entry per envelope recipient, in To, Cc, Bcc order.
    pub outcomes: Vec<DeliveryOutcome>,
    /// Text of the final reply to the message data, often a queue ID.
    pub response: String,
}

impl SendReport {
    /// Recipients the server accepted.
    pub fn accepted(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.accepted)
    }

    /// Recipients the server refused.
    pub fn rejected(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.accepted)
    }

    /// True if some, but not all, recipients were refused.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.rejected().next().is_some()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use outbox_smtp::{EnhancedCode, ReplyCode};

    fn report() -> SendReport {
        let reply = Reply::new(ReplyCode::new(550), vec!["No such user".to_string()])
            .with_enhanced(EnhancedCode::parse("5.1.1").unwrap());
        SendReport {
            server: "mx.example.com:25".to_string(),
            outcomes: vec![
                DeliveryOutcome::accepted("a@example.com"),
                DeliveryOutcome::rejected("b@example.com", &reply),
            ],
            response: "Queued as ABC".to_string(),
        }
    }

    #[test]
    fn test_rejected_outcome() {
        let report = report();
        let rejected: Vec<_> = report.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].code, Some(550));
        assert_eq!(rejected[0].enhanced.as_deref(), Some("5.1.1"));
        assert_eq!(rejected[0].detail.as_deref(), Some("No such user"));
        assert_eq!(report.accepted().count(), 1);
        assert!(report.is_partial());
    }

    #[test]
    fn test_report_json() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["server"], "mx.example.com:25");
        assert_eq!(json["outcomes"][0]["accepted"], true);
        assert!(json["outcomes"][0].get("code").is_none());
        assert_eq!(json["outcomes"][1]["code"], 550);
    }
}
