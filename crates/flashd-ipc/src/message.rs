//! Dictionary-of-typed-values message model.
//!
//! Modeled as a tagged-variant map from well-known keys to values of kinds
//! `{string, u64, bool}`. Unknown keys are ignored; missing keys for
//! optional flags default to `false`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single typed value carried by a message dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    U64(u64),
    Bool(bool),
}

/// A request or response payload: a flat dictionary of well-known keys to
/// typed values, always carrying a `tag` key identifying its kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl Message {
    pub fn new(tag: &str) -> Self {
        let mut message = Self::default();
        message.set_str("tag", tag);
        message
    }

    pub fn tag(&self) -> Option<&str> {
        self.get_str("tag")
    }

    pub fn set_str(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.fields.insert(key.to_owned(), Value::Str(value.into()));
        self
    }

    pub fn set_u64(&mut self, key: &str, value: u64) -> &mut Self {
        self.fields.insert(key.to_owned(), Value::U64(value));
        self
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.fields.insert(key.to_owned(), Value::Bool(value));
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.fields.get(key) {
            Some(Value::U64(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns the flag at `key`, defaulting to `false` when absent.
    pub fn get_bool_or_false(&self, key: &str) -> bool {
        match self.fields.get(key) {
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

/// Well-known request tags.
pub mod request_tag {
    pub const INITIAL_PING: &str = "INITIAL_PING";
    pub const GET_HELPER_VERSION: &str = "GET_HELPER_VERSION";
    pub const WRITE_ISO_TO_DEVICE: &str = "WRITE_ISO_TO_DEVICE";
}

/// Well-known response tags.
pub mod response_tag {
    pub const INITIAL_PONG: &str = "INITIAL_PONG";
    pub const HELPER_VERSION_OBTAINED: &str = "HELPER_VERSION_OBTAINED";
    pub const ISO_FILE_INVALID: &str = "ISO_FILE_INVALID";
    pub const ISO_FILE_VALID: &str = "ISO_FILE_VALID";
    pub const DEVICE_INVALID: &str = "DEVICE_INVALID";
    pub const ISO_WRITE_PROGRESS: &str = "ISO_WRITE_PROGRESS";
    pub const WRITE_VERIFICATION_PROGRESS: &str = "WRITE_VERIFICATION_PROGRESS";
    pub const ISO_WRITE_SUCCESS: &str = "ISO_WRITE_SUCCESS";
    pub const ISO_WRITE_FAIL: &str = "ISO_WRITE_FAIL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut message = Message::new(request_tag::WRITE_ISO_TO_DEVICE);
        message.set_str("isoPath", "/home/user/Downloads/test.iso");
        message.set_str("disk", "disk4");
        message.set_bool("skipEject", true);

        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.tag(), Some(request_tag::WRITE_ISO_TO_DEVICE));
        assert_eq!(parsed.get_str("disk"), Some("disk4"));
        assert!(parsed.get_bool_or_false("skipEject"));
    }

    #[test]
    fn missing_optional_flags_default_to_false() {
        let message = Message::new(request_tag::WRITE_ISO_TO_DEVICE);
        assert!(!message.get_bool_or_false("skipImageValidation"));
        assert!(!message.get_bool_or_false("skipVerification"));
        assert!(!message.get_bool_or_false("skipEject"));
    }

    #[test]
    fn unknown_keys_are_preserved_but_untyped_accessors_ignore_wrong_kinds() {
        let mut message = Message::new(request_tag::INITIAL_PING);
        message.set_u64("write_progress", 50);
        assert_eq!(message.get_str("write_progress"), None);
        assert_eq!(message.get_u64("write_progress"), Some(50));
    }
}
