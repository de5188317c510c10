use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The persisted document: one [`LedgerEntry`] per scope, keyed by `"{serverId}_{channelId}"`.
pub type HistoryDocument = BTreeMap<String, LedgerEntry>;

/// Identifies an independent history partition: a text channel inside a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub server_id: u64,
    pub channel_id: u64,
}

impl ScopeKey {
    pub fn new(server_id: u64, channel_id: u64) -> Self {
        Self {
            server_id,
            channel_id,
        }
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.server_id, self.channel_id)
    }
}

/// What kind of pool a selection was drawn from.
///
/// Stored on disk as a compact tag (`all`, `online`, `voice_<id>`, `role_<id>`).
/// Tags that don't match any known shape are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectionMode {
    All,
    Online,
    Voice(u64),
    Role(u64),
    Unknown(String),
}

impl Default for SelectionMode {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for SelectionMode {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "all" => return Self::All,
            "online" => return Self::Online,
            _ => {}
        }
        if let Some(Ok(id)) = tag.strip_prefix("voice_").map(str::parse) {
            return Self::Voice(id);
        }
        if let Some(Ok(id)) = tag.strip_prefix("role_").map(str::parse) {
            return Self::Role(id);
        }
        Self::Unknown(tag)
    }
}

impl From<SelectionMode> for String {
    fn from(mode: SelectionMode) -> Self {
        mode.to_string()
    }
}

impl Display for SelectionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Online => write!(f, "online"),
            Self::Voice(id) => write!(f, "voice_{}", id),
            Self::Role(id) => write!(f, "role_{}", id),
            Self::Unknown(tag) => write!(f, "{}", tag),
        }
    }
}

/// A single draw. Never modified once appended to a [`LedgerEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub mode: SelectionMode,
    #[serde(deserialize_with = "one_or_many")]
    pub selected: Vec<String>,
}

/// Selection history of a single scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub selections: Vec<SelectionRecord>,
    #[serde(default)]
    pub used_members: Vec<String>,
}

// Older documents store a single member ID per record.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_formats_as_server_and_channel() {
        assert_eq!(ScopeKey::new(42, 7).to_string(), "42_7");
    }

    mod selection_mode_tests {
        use super::*;

        #[test]
        fn parses_known_tags() {
            assert_eq!(SelectionMode::from("all".to_string()), SelectionMode::All);
            assert_eq!(
                SelectionMode::from("online".to_string()),
                SelectionMode::Online
            );
            assert_eq!(
                SelectionMode::from("voice_123".to_string()),
                SelectionMode::Voice(123)
            );
            assert_eq!(
                SelectionMode::from("role_456".to_string()),
                SelectionMode::Role(456)
            );
        }

        #[test]
        fn keeps_unrecognized_tags_verbatim() {
            // Arrange
            let tag = "voice_general".to_string();

            // Act
            let mode = SelectionMode::from(tag.clone());

            // Assert
            assert_eq!(mode, SelectionMode::Unknown(tag.clone()));
            assert_eq!(mode.to_string(), tag);
        }

        #[test]
        fn serializes_as_composite_tag() {
            let json = serde_json::to_string(&SelectionMode::Voice(99)).unwrap();
            assert_eq!(json, "\"voice_99\"");
        }
    }

    mod record_deser_tests {
        use super::*;

        #[test]
        fn reads_records_with_a_list_of_members() {
            // Arrange
            let json = r#"{
                "timestamp": "2024-03-01T18:30:00.123456",
                "mode": "role_5",
                "selected": ["7", "9"]
            }"#;

            // Act
            let record: SelectionRecord = serde_json::from_str(json).unwrap();

            // Assert
            assert_eq!(record.mode, SelectionMode::Role(5));
            assert_eq!(record.selected, vec!["7".to_string(), "9".to_string()]);
        }

        #[test]
        fn reads_legacy_records_with_a_single_member_and_no_mode() {
            // Arrange
            let json = r#"{
                "timestamp": "2024-03-01T18:30:00.123456",
                "selected": "7"
            }"#;

            // Act
            let record: SelectionRecord = serde_json::from_str(json).unwrap();

            // Assert
            assert_eq!(record.mode, SelectionMode::default());
            assert_eq!(record.selected, vec!["7".to_string()]);
        }

        #[test]
        fn reads_entry_with_missing_used_members() {
            let json = r#"{ "selections": [] }"#;

            let entry: LedgerEntry = serde_json::from_str(json).unwrap();

            assert!(entry.used_members.is_empty());
        }
    }
}
