//! Text encoding of save records (pretty-printed JSON)

use super::error::SaveError;
use super::record::SaveRecord;

pub fn encode(record: &SaveRecord) -> Result<String, SaveError> {
    serde_json::to_string_pretty(record).map_err(SaveError::Encode)
}

/// Decode a record. Malformed input is an error, never a partial record.
///
/// `origin` only labels the error.
pub fn decode(text: &str, origin: &std::path::Path) -> Result<SaveRecord, SaveError> {
    serde_json::from_str(text).map_err(|e| SaveError::corrupt(origin, e))
}
