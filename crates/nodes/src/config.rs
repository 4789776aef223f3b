//! Typed node configuration.
//!
//! Every type tag selects one [`ConfigShape`] through the catalog, and each
//! shape has its own struct here. On the wire a config is a plain JSON object
//! (the node's `type` field says how to read it), so deserialization always
//! goes through [`NodeConfig::from_value`] with the catalog entry in hand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    catalog::{CatalogEntry, ConfigShape},
    NodeError,
};

/// WhatsApp allows at most three reply buttons per message.
pub const MAX_BUTTONS: usize = 3;
/// WhatsApp allows at most ten rows across all sections of a list message.
pub const MAX_LIST_ROWS: usize = 10;
pub const MAX_BUTTON_TITLE_CHARS: usize = 20;
pub const MAX_ROW_TITLE_CHARS: usize = 24;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// How keyword triggers compare the incoming text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TriggerConfig {
    pub keywords: Vec<String>,
    pub match_mode: MatchMode,
}

/// A reply button; its `id` is the output slot edges leave through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Button {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ButtonMessageConfig {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub buttons: Vec<Button>,
}

/// A selectable list row; its `id` is an output slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ListMessageConfig {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Caption of the button that opens the menu.
    pub button_text: String,
    pub sections: Vec<ListSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TextMessageConfig {
    pub body: String,
    pub preview_url: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
    Audio,
    Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MediaMessageConfig {
    pub media_type: MediaKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// Configuration of one node, one variant per [`ConfigShape`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    ButtonMessage(ButtonMessageConfig),
    ListMessage(ListMessageConfig),
    Text(TextMessageConfig),
    Media(MediaMessageConfig),
    Location(LocationConfig),
}

impl NodeConfig {
    /// The config a freshly placed node starts with.
    pub fn empty(shape: ConfigShape) -> Self {
        match shape {
            ConfigShape::Trigger => Self::Trigger(TriggerConfig::default()),
            ConfigShape::ButtonMessage => Self::ButtonMessage(ButtonMessageConfig::default()),
            ConfigShape::ListMessage => Self::ListMessage(ListMessageConfig::default()),
            ConfigShape::Text => Self::Text(TextMessageConfig::default()),
            ConfigShape::Media => Self::Media(MediaMessageConfig::default()),
            ConfigShape::Location => Self::Location(LocationConfig::default()),
        }
    }

    /// Parse and validate a JSON payload for the given catalog entry.
    /// `null` yields the empty config.
    ///
    /// # Errors
    /// [`NodeError::InvalidConfig`] if the payload does not fit the shape or
    /// breaks one of its rules.
    pub fn from_value(entry: &CatalogEntry, value: Value) -> Result<Self, NodeError> {
        if value.is_null() {
            return Ok(Self::empty(entry.config_shape));
        }

        let tag = entry.type_tag;
        let parsed = match entry.config_shape {
            ConfigShape::Trigger => Self::Trigger(parse(tag, value)?),
            ConfigShape::ButtonMessage => Self::ButtonMessage(parse(tag, value)?),
            ConfigShape::ListMessage => Self::ListMessage(parse(tag, value)?),
            ConfigShape::Text => Self::Text(parse(tag, value)?),
            ConfigShape::Media => Self::Media(parse(tag, value)?),
            ConfigShape::Location => Self::Location(parse(tag, value)?),
        };

        parsed.validate(tag)?;
        Ok(parsed)
    }

    /// The plain JSON object form used in saved definitions and exports.
    pub fn to_value(&self) -> Value {
        // Plain data structs with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn shape(&self) -> ConfigShape {
        match self {
            Self::Trigger(_) => ConfigShape::Trigger,
            Self::ButtonMessage(_) => ConfigShape::ButtonMessage,
            Self::ListMessage(_) => ConfigShape::ListMessage,
            Self::Text(_) => ConfigShape::Text,
            Self::Media(_) => ConfigShape::Media,
            Self::Location(_) => ConfigShape::Location,
        }
    }

    /// Ids of every button and list row, in declaration order.
    pub fn slot_ids(&self) -> Vec<&str> {
        match self {
            Self::ButtonMessage(c) => c.buttons.iter().map(|b| b.id.as_str()).collect(),
            Self::ListMessage(c) => c
                .sections
                .iter()
                .flat_map(|s| s.rows.iter().map(|r| r.id.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Shallow-merge `patch` into this config: top-level keys in the patch
    /// replace the current ones, every other key survives. The result is
    /// re-validated against the entry's shape.
    ///
    /// # Errors
    /// [`NodeError::InvalidConfig`] if `patch` is not a JSON object or the
    /// merged payload is invalid.
    pub fn merge_patch(&self, entry: &CatalogEntry, patch: &Value) -> Result<Self, NodeError> {
        let Value::Object(patch) = patch else {
            return Err(NodeError::invalid(entry.type_tag, "patch must be a JSON object"));
        };

        let mut merged = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }

        Self::from_value(entry, Value::Object(merged))
    }

    /// Check the per-shape rules (caps, slot id uniqueness, coordinates).
    pub fn validate(&self, type_tag: &str) -> Result<(), NodeError> {
        match self {
            Self::Trigger(c) => {
                if c.keywords.iter().any(|k| k.trim().is_empty()) {
                    return Err(NodeError::invalid(type_tag, "keywords must not be blank"));
                }
            }
            Self::ButtonMessage(c) => {
                if c.buttons.len() > MAX_BUTTONS {
                    return Err(NodeError::invalid(
                        type_tag,
                        format!("at most {MAX_BUTTONS} buttons allowed, got {}", c.buttons.len()),
                    ));
                }
                if let Some(b) = c
                    .buttons
                    .iter()
                    .find(|b| b.title.chars().count() > MAX_BUTTON_TITLE_CHARS)
                {
                    return Err(NodeError::invalid(
                        type_tag,
                        format!("button '{}' title exceeds {MAX_BUTTON_TITLE_CHARS} characters", b.id),
                    ));
                }
            }
            Self::ListMessage(c) => {
                let rows = c.sections.iter().map(|s| s.rows.len()).sum::<usize>();
                if rows > MAX_LIST_ROWS {
                    return Err(NodeError::invalid(
                        type_tag,
                        format!("at most {MAX_LIST_ROWS} list rows allowed, got {rows}"),
                    ));
                }
                if let Some(r) = c
                    .sections
                    .iter()
                    .flat_map(|s| &s.rows)
                    .find(|r| r.title.chars().count() > MAX_ROW_TITLE_CHARS)
                {
                    return Err(NodeError::invalid(
                        type_tag,
                        format!("row '{}' title exceeds {MAX_ROW_TITLE_CHARS} characters", r.id),
                    ));
                }
            }
            Self::Location(c) => {
                if !(-90.0..=90.0).contains(&c.latitude) {
                    return Err(NodeError::invalid(type_tag, "latitude out of range"));
                }
                if !(-180.0..=180.0).contains(&c.longitude) {
                    return Err(NodeError::invalid(type_tag, "longitude out of range"));
                }
            }
            Self::Text(_) | Self::Media(_) => {}
        }

        // Buttons and rows both become edge source handles, so they share
        // one namespace per node.
        let mut seen = std::collections::HashSet::new();
        for id in self.slot_ids() {
            if id.is_empty() {
                return Err(NodeError::invalid(type_tag, "output slot ids must not be empty"));
            }
            if !seen.insert(id) {
                return Err(NodeError::invalid(
                    type_tag,
                    format!("duplicate output slot id '{id}'"),
                ));
            }
        }

        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(type_tag: &str, value: Value) -> Result<T, NodeError> {
    serde_json::from_value(value).map_err(|e| NodeError::invalid(type_tag, e.to_string()))
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::lookup;
    use serde_json::json;

    #[test]
    fn null_yields_empty_config() {
        let entry = lookup("listMessage").unwrap();
        let config = NodeConfig::from_value(entry, Value::Null).unwrap();
        assert_eq!(config, NodeConfig::ListMessage(ListMessageConfig::default()));
        assert!(config.slot_ids().is_empty());
    }

    #[test]
    fn list_rows_across_sections_become_slots() {
        let entry = lookup("listMessage").unwrap();
        let config = NodeConfig::from_value(
            entry,
            json!({
                "body": "Pick one",
                "buttonText": "Menu",
                "sections": [
                    { "title": "Sales", "rows": [{ "id": "r1", "title": "Pricing" }] },
                    { "title": "Support", "rows": [
                        { "id": "r2", "title": "Bug", "description": "Something broke" },
                        { "id": "r3", "title": "Other" }
                    ] }
                ]
            }),
        )
        .unwrap();

        assert_eq!(config.slot_ids(), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn fourth_button_is_rejected() {
        let entry = lookup("quickReply").unwrap();
        let err = NodeConfig::from_value(
            entry,
            json!({ "buttons": [
                { "id": "a", "title": "A" }, { "id": "b", "title": "B" },
                { "id": "c", "title": "C" }, { "id": "d", "title": "D" }
            ] }),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::InvalidConfig { .. }));
    }

    #[test]
    fn duplicate_slot_ids_are_rejected() {
        let entry = lookup("listMessage").unwrap();
        let err = NodeConfig::from_value(
            entry,
            json!({ "sections": [
                { "title": "One", "rows": [{ "id": "x", "title": "X" }] },
                { "title": "Two", "rows": [{ "id": "x", "title": "Also X" }] }
            ] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate output slot id 'x'"));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let entry = lookup("message.location").unwrap();
        assert!(NodeConfig::from_value(entry, json!({ "latitude": "north" })).is_err());
        assert!(NodeConfig::from_value(entry, json!({ "latitude": 91.0 })).is_err());
        assert!(NodeConfig::from_value(entry, json!({ "buttons": [] })).is_err());
    }

    #[test]
    fn merge_patch_is_shallow() {
        let entry = lookup("quickReply").unwrap();
        let config = NodeConfig::from_value(
            entry,
            json!({ "body": "Continue?", "buttons": [{ "id": "b1", "title": "Yes" }] }),
        )
        .unwrap();

        let merged = config
            .merge_patch(entry, &json!({ "buttons": [{ "id": "b9", "title": "Sure" }] }))
            .unwrap();

        let NodeConfig::ButtonMessage(merged) = merged else {
            panic!("shape changed");
        };
        assert_eq!(merged.body, "Continue?");
        assert_eq!(merged.buttons.len(), 1);
        assert_eq!(merged.buttons[0].id, "b9");
    }

    #[test]
    fn non_object_patch_is_rejected() {
        let entry = lookup("message.text").unwrap();
        let config = NodeConfig::empty(entry.config_shape);
        assert!(config.merge_patch(entry, &json!(["body"])).is_err());
    }

    #[test]
    fn config_serializes_as_plain_object() {
        let config = NodeConfig::Text(TextMessageConfig {
            body: "Hello".into(),
            preview_url: true,
        });
        assert_eq!(config.to_value(), json!({ "body": "Hello", "previewUrl": true }));
    }
}
