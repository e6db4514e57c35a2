//! Domain types for the intent log.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequence id assigned by the store.
pub type IntentId = u64;

/// The lifecycle sequence an intent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentVerb {
    CreateWebhook,
    DestroyWebhook,
    CreateDaipp,
    DestroyDaipp,
    CreateHost,
    DestroyHost,
    UpgradeHost,
}

impl fmt::Display for IntentVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentVerb::CreateWebhook => "create_webhook",
            IntentVerb::DestroyWebhook => "destroy_webhook",
            IntentVerb::CreateDaipp => "create_daipp",
            IntentVerb::DestroyDaipp => "destroy_daipp",
            IntentVerb::CreateHost => "create_host",
            IntentVerb::DestroyHost => "destroy_host",
            IntentVerb::UpgradeHost => "upgrade_host",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Completed,
    Failed { reason: String },
}

impl IntentStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, IntentStatus::Pending)
    }
}

/// One recorded lifecycle sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackIntent {
    pub id: IntentId,
    pub verb: IntentVerb,
    pub tenant_id: String,
    pub version: String,
    pub status: IntentStatus,
    /// Free-form context, e.g. the image or external URL.
    pub detail: Option<String>,
    /// Unix timestamp (seconds) when the intent was opened.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: u64,
}

impl StackIntent {
    /// Zero-padded so lexicographic key order matches id order.
    pub fn table_key(&self) -> String {
        intent_key(self.id)
    }
}

pub fn intent_key(id: IntentId) -> String {
    format!("{id:020}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_id() {
        assert!(intent_key(9) < intent_key(10));
        assert_eq!(intent_key(42).len(), 20);
    }

    #[test]
    fn status_json_shape() {
        let json = serde_json::to_string(&IntentStatus::Failed { reason: "boom".into() }).unwrap();
        assert_eq!(json, r#"{"state":"failed","reason":"boom"}"#);
        let pending: IntentStatus = serde_json::from_str(r#"{"state":"pending"}"#).unwrap();
        assert!(pending.is_pending());
    }
}
