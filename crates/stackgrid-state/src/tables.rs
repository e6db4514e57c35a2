//! redb table definitions for the intent log.

use redb::TableDefinition;

/// JSON-encoded intents keyed by their sequence id, zero-padded so key
/// order is creation order.
pub const INTENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("intents");

/// Counters. Holds the last issued intent id under `INTENT_SEQ_KEY`.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const INTENT_SEQ_KEY: &str = "intent_seq";
