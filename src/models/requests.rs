//! Request DTOs for the sidecar API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for storing a cached response (PUT /responses)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key, e.g. `leaderboard:weekly`
    pub key: String,
    /// Any JSON document
    pub value: Value,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for a DM send budget check (POST /dm/send)
#[derive(Debug, Clone, Deserialize)]
pub struct DmSendRequest {
    pub user_id: String,
    pub channel_id: String,
}

impl DmSendRequest {
    pub fn validate(&self) -> Option<String> {
        validate_dm_ids(&self.user_id, &self.channel_id)
    }
}

/// Ids must be non-empty and free of `:`, which joins composite counter keys.
pub fn validate_dm_ids(user_id: &str, channel_id: &str) -> Option<String> {
    for (field, value) in [("user_id", user_id), ("channel_id", channel_id)] {
        if value.is_empty() {
            return Some(format!("{field} cannot be empty"));
        }
        if value.contains(':') {
            return Some(format!("{field} cannot contain ':'"));
        }
    }
    None
}
