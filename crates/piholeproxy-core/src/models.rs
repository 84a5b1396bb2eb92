//! Data models exchanged with Pi-hole and with proxy callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::auth::Endpoint;

/// A client (device) as listed by `/api/clients/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// IP address, MAC address or hostname
    pub client: String,
    #[serde(default)]
    pub groups: Vec<i64>,
}

/// A group as listed by `/api/groups/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Pi-hole reports this as a bool; older builds used 0/1
    #[serde(deserialize_with = "bool_or_int")]
    pub enabled: bool,
}

fn bool_or_int<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Body of `POST /editclient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditClientRequest {
    pub client: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub group: Option<i64>,
}

/// Body sent to `PUT /api/clients/{client}` on every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientUpdate {
    pub comment: Option<String>,
    pub groups: Vec<i64>,
}

impl From<&EditClientRequest> for ClientUpdate {
    fn from(req: &EditClientRequest) -> Self {
        Self {
            comment: req.comment.clone(),
            groups: req.group.into_iter().collect(),
        }
    }
}

/// Marker reported for endpoints that had no active session during a fan-out
pub const SESSION_UNAVAILABLE: &str = "Session not available";

/// Result of one endpoint's part of a client edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Backend answered with this HTTP status
    Status(u16),
    /// No active session for the endpoint; nothing was sent
    Unavailable,
    /// Request failed before a status was received
    Failed(String),
}

impl Serialize for EditOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EditOutcome::Status(code) => serializer.serialize_u16(*code),
            EditOutcome::Unavailable => serializer.serialize_str(SESSION_UNAVAILABLE),
            EditOutcome::Failed(message) => serializer.serialize_str(message),
        }
    }
}

/// Per-endpoint outcome of a client edit, keyed by endpoint URL.
pub type EditResults = BTreeMap<Endpoint, EditOutcome>;

/// Group ids the web UI uses for its ad-block toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupIds {
    pub adblock_group_id: i64,
    pub non_adblock_group_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_entry() {
        let json = r#"{"id":3,"name":null,"comment":"kids tablet","client":"10.0.0.23","groups":[0,2],"date_added":1700000000}"#;
        let entry: ClientEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 3);
        assert_eq!(entry.name, None);
        assert_eq!(entry.comment.as_deref(), Some("kids tablet"));
        assert_eq!(entry.groups, vec![0, 2]);
    }

    #[test]
    fn test_parse_group_enabled_variants() {
        let g: Group = serde_json::from_str(r#"{"id":0,"name":"Default","enabled":true}"#).unwrap();
        assert!(g.enabled);
        let g: Group = serde_json::from_str(r#"{"id":1,"name":"NoAds","comment":"x","enabled":0}"#).unwrap();
        assert!(!g.enabled);
    }

    #[test]
    fn test_client_update_from_request() {
        let req = EditClientRequest {
            client: "10.0.0.23".to_string(),
            comment: Some("tablet".to_string()),
            group: Some(1),
        };
        let update = ClientUpdate::from(&req);
        assert_eq!(update.groups, vec![1]);

        let req = EditClientRequest { group: None, ..req };
        let body = serde_json::to_value(ClientUpdate::from(&req)).unwrap();
        assert_eq!(body, serde_json::json!({"comment": "tablet", "groups": []}));
    }

    #[test]
    fn test_edit_outcome_serialization() {
        let mut results = EditResults::new();
        results.insert(Endpoint::parse("http://a.lan").unwrap(), EditOutcome::Status(200));
        results.insert(Endpoint::parse("http://b.lan").unwrap(), EditOutcome::Unavailable);
        results.insert(
            Endpoint::parse("http://c.lan").unwrap(),
            EditOutcome::Failed("connection refused".to_string()),
        );
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "http://a.lan": 200,
                "http://b.lan": "Session not available",
                "http://c.lan": "connection refused",
            })
        );
    }
}
