//! Term definitions and the records handed back to callers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::TermName;
use crate::params::ParamsInput;

/// A complete definition submitted for registration.
///
/// On the wire the name travels as `term`. `definition` is opaque; a JSON
/// string is kept as its contents, any other JSON value as its serialized text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermDefinition {
    #[serde(rename = "term")]
    pub name: TermName,
    #[serde(deserialize_with = "definition_text")]
    pub definition: String,
    pub line: String,
    #[serde(default)]
    pub params: Option<ParamsInput>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    /// Filled in by the transport from the peer address, never by the body.
    #[serde(skip)]
    pub ip_addr: Option<String>,
}

impl TermDefinition {
    #[must_use]
    pub fn new(name: TermName, definition: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            name,
            definition: definition.into(),
            line: line.into(),
            params: None,
            creator: None,
            doc: None,
            ip_addr: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: impl Into<ParamsInput>) -> Self {
        self.params = Some(params.into());
        self
    }

    #[must_use]
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    #[must_use]
    pub fn with_ip_addr(mut self, ip_addr: impl Into<String>) -> Self {
        self.ip_addr = Some(ip_addr.into());
        self
    }
}

fn definition_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// A resolved term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub name: String,
    pub params: Vec<String>,
    pub definition: Value,
    pub line: String,
}

/// Documentation for a term. Terms registered without docs resolve to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDoc {
    pub doc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Complete,
}

/// Acknowledgment of a successful assignment: `{"result":"complete"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub result: AckStatus,
}

impl Ack {
    pub const COMPLETE: Self = Self {
        result: AckStatus::Complete,
    };
}

/// Decode a stored definition for presentation.
///
/// Stored text that parses as JSON is returned as that value; anything else
/// comes back verbatim as a JSON string.
#[must_use]
pub fn decode_definition(stored: &str) -> Value {
    serde_json::from_str(stored).unwrap_or_else(|_| Value::String(stored.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_shape() {
        let body = json!({
            "term": "greet",
            "definition": "\"hello\"",
            "line": "greet() -> hello",
            "params": null,
        });
        let def: TermDefinition = serde_json::from_value(body).unwrap();
        assert_eq!(def.name.as_str(), "greet");
        assert_eq!(def.definition, "\"hello\"");
        assert_eq!(def.params, None);
        assert_eq!(def.creator, None);
        assert_eq!(def.ip_addr, None);
    }

    #[test]
    fn structured_definition_is_kept_as_text() {
        let body = json!({
            "term": "pair",
            "definition": {"op": "list", "args": [1, 2]},
            "line": "pair() -> [1 2]",
        });
        let def: TermDefinition = serde_json::from_value(body).unwrap();
        let round: Value = serde_json::from_str(&def.definition).unwrap();
        assert_eq!(round, json!({"op": "list", "args": [1, 2]}));
    }

    #[test]
    fn ip_addr_is_not_taken_from_body() {
        let body = json!({
            "term": "t",
            "definition": "1",
            "line": "t",
            "ip_addr": "10.0.0.1",
        });
        let def: TermDefinition = serde_json::from_value(body).unwrap();
        assert_eq!(def.ip_addr, None);
    }

    #[test]
    fn empty_term_is_rejected() {
        let body = json!({"term": " ", "definition": "1", "line": "x"});
        assert!(serde_json::from_value::<TermDefinition>(body).is_err());
    }

    #[test]
    fn ack_wire_shape() {
        let wire = serde_json::to_value(Ack::COMPLETE).unwrap();
        assert_eq!(wire, json!({"result": "complete"}));
    }

    #[test]
    fn decode_definition_prefers_json() {
        assert_eq!(decode_definition("\"hello\""), json!("hello"));
        assert_eq!(decode_definition("[1,2]"), json!([1, 2]));
        assert_eq!(decode_definition("(+ a b)"), json!("(+ a b)"));
    }
}
