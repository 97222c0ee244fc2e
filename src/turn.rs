//! Dialog turns and the capability categories that hold them active.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Opaque token minted once per user utterance or text input.
///
/// Correlates a request with its directives and events. Immutable, never
/// reused.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(String);

impl TurnId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TurnId({})", self.0)
    }
}

impl From<&str> for TurnId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Named subsystem that can hold a dialog turn active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityCategory {
    AutomaticSpeechRecognition,
    Text,
    Display,
}

impl CapabilityCategory {
    pub fn name(self) -> &'static str {
        match self {
            CapabilityCategory::AutomaticSpeechRecognition => "ASR",
            CapabilityCategory::Text => "Text",
            CapabilityCategory::Display => "Display",
        }
    }
}

/// One round of user input through completion of the assistant's response.
#[derive(Debug, Clone)]
pub struct Session {
    pub turn_id: TurnId,
    pub created_at: Instant,
}

impl Session {
    pub fn new(turn_id: TurnId) -> Self {
        Self {
            turn_id,
            created_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_ids_are_unique() {
        let a = TurnId::generate();
        let b = TurnId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn category_names_match_protocol() {
        assert_eq!(CapabilityCategory::AutomaticSpeechRecognition.name(), "ASR");
        assert_eq!(CapabilityCategory::Text.name(), "Text");
    }
}
