//! Plaintext workspace bundle carried inside an envelope.
//!
//! The JSON shape is:
//!
//! ```text
//! { "workspaces": [
//!     { "id": "...", "name": "...", "type": "local",  "mcpServers": [ ... ] },
//!     { "id": "...", "name": "...", "type": "remote", "remoteConfig": { "apiUrl": "..." } }
//! ] }
//! ```
//!
//! Parsing is strict about identity (every entry needs a non-empty `id` and
//! `name`) and lenient about shape (unknown types become local, fields that
//! do not belong to the entry's type are dropped).

use crate::error::{ProtocolError, ProtocolResult};
use crate::server::McpServerConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Id of the workspace that always exists locally.
///
/// Sync never deletes it and never changes its type.
pub const DEFAULT_WORKSPACE_ID: &str = "local-default";

/// Type-specific payload of a bundle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceContent {
    /// A local workspace and its ordered server list.
    Local {
        /// Servers owned by the workspace.
        servers: Vec<McpServerConfig>,
    },
    /// A workspace backed by a remote API.
    Remote {
        /// API URL; `None` when the bundle carried no `remoteConfig`.
        api_url: Option<String>,
    },
}

/// One workspace inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceBundleEntry {
    /// Workspace id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Servers or remote configuration, depending on the type.
    pub content: WorkspaceContent,
}

impl WorkspaceBundleEntry {
    /// Creates a local entry.
    pub fn local(
        id: impl Into<String>,
        name: impl Into<String>,
        servers: Vec<McpServerConfig>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: WorkspaceContent::Local { servers },
        }
    }

    /// Creates a remote entry.
    pub fn remote(id: impl Into<String>, name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: WorkspaceContent::Remote {
                api_url: Some(api_url.into()),
            },
        }
    }

    /// Returns true for local entries.
    pub fn is_local(&self) -> bool {
        matches!(self.content, WorkspaceContent::Local { .. })
    }

    /// Servers of a local entry; empty for remote entries.
    pub fn servers(&self) -> &[McpServerConfig] {
        match &self.content {
            WorkspaceContent::Local { servers } => servers,
            WorkspaceContent::Remote { .. } => &[],
        }
    }

    /// Wire name of the entry type.
    pub fn type_name(&self) -> &'static str {
        match self.content {
            WorkspaceContent::Local { .. } => "local",
            WorkspaceContent::Remote { .. } => "remote",
        }
    }
}

/// The full set of workspaces exchanged in one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceBundle {
    /// Entries in storage order.
    pub workspaces: Vec<WorkspaceBundleEntry>,
}

#[derive(Serialize)]
struct BundleWire<'a> {
    workspaces: Vec<EntryWire<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryWire<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_config: Option<RemoteConfigWire<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mcp_servers: Option<&'a [McpServerConfig]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteConfigWire<'a> {
    api_url: &'a str,
}

impl WorkspaceBundle {
    /// Creates a bundle from entries.
    pub fn new(workspaces: Vec<WorkspaceBundleEntry>) -> Self {
        Self { workspaces }
    }

    /// Number of servers across all local entries.
    pub fn server_count(&self) -> usize {
        self.workspaces.iter().map(|w| w.servers().len()).sum()
    }

    /// Serializes the bundle as pretty-printed JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        let wire = BundleWire {
            workspaces: self
                .workspaces
                .iter()
                .map(|entry| match &entry.content {
                    WorkspaceContent::Local { servers } => EntryWire {
                        id: &entry.id,
                        name: &entry.name,
                        kind: "local",
                        remote_config: None,
                        mcp_servers: Some(servers.as_slice()),
                    },
                    WorkspaceContent::Remote { api_url } => EntryWire {
                        id: &entry.id,
                        name: &entry.name,
                        kind: "remote",
                        remote_config: Some(RemoteConfigWire {
                            api_url: api_url.as_deref().unwrap_or(""),
                        }),
                        mcp_servers: None,
                    },
                })
                .collect(),
        };

        serde_json::to_string_pretty(&wire)
            .map_err(|e| ProtocolError::malformed_bundle(format!("serialization failed: {}", e)))
    }

    /// Parses and validates a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedBundle`] if the JSON is invalid,
    /// `workspaces` is not a list, any entry lacks a non-empty `id` or
    /// `name`, two entries share an `id`, or a server record cannot be read.
    pub fn parse(json: &str) -> ProtocolResult<Self> {
        let root: Value = serde_json::from_str(json)
            .map_err(|e| ProtocolError::malformed_bundle(format!("invalid JSON: {}", e)))?;

        let entries = root
            .get("workspaces")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::malformed_bundle("workspaces must be a list"))?;

        let workspaces = entries
            .iter()
            .enumerate()
            .map(|(index, raw)| parse_entry(index, raw))
            .collect::<ProtocolResult<Vec<_>>>()?;

        let mut seen = HashSet::with_capacity(workspaces.len());
        if let Some(duplicate) = workspaces.iter().find(|entry| !seen.insert(entry.id.as_str())) {
            return Err(ProtocolError::malformed_bundle(format!(
                "duplicate workspace id {}",
                duplicate.id
            )));
        }

        Ok(Self { workspaces })
    }
}

fn parse_entry(index: usize, raw: &Value) -> ProtocolResult<WorkspaceBundleEntry> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ProtocolError::malformed_bundle(format!("entry {} is not an object", index)))?;

    let id = non_empty_str(obj, "id");
    let name = non_empty_str(obj, "name");
    let (Some(id), Some(name)) = (id, name) else {
        return Err(ProtocolError::malformed_bundle(format!(
            "entry {} is missing id or name",
            index
        )));
    };

    let content = if obj.get("type").and_then(Value::as_str) == Some("remote") {
        let api_url = obj
            .get("remoteConfig")
            .and_then(Value::as_object)
            .map(|config| match config.get("apiUrl") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(url)) => url.clone(),
                Some(other) => other.to_string(),
            });
        WorkspaceContent::Remote { api_url }
    } else {
        let servers = match obj.get("mcpServers") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    McpServerConfig::deserialize(item).map_err(|e| {
                        ProtocolError::malformed_bundle(format!(
                            "entry {} has an invalid server: {}",
                            id, e
                        ))
                    })
                })
                .collect::<ProtocolResult<Vec<_>>>()?,
            _ => Vec::new(),
        };
        WorkspaceContent::Local { servers }
    };

    Ok(WorkspaceBundleEntry {
        id: id.to_string(),
        name: name.to_string(),
        content,
    })
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> WorkspaceBundle {
        WorkspaceBundle::new(vec![
            WorkspaceBundleEntry::local(
                DEFAULT_WORKSPACE_ID,
                "Default",
                vec![McpServerConfig::local("s1", "files", "node").with_args(["server.js"])],
            ),
            WorkspaceBundleEntry::remote("team", "Team", "https://api.example.com"),
        ])
    }

    #[test]
    fn serialize_then_parse() {
        let bundle = sample_bundle();
        let json = bundle.to_json().unwrap();
        assert_eq!(WorkspaceBundle::parse(&json).unwrap(), bundle);
    }

    #[test]
    fn serialized_entries_carry_only_their_type_payload() {
        let json = sample_bundle().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let local = &value["workspaces"][0];
        assert_eq!(local["type"], "local");
        assert!(local.get("remoteConfig").is_none());
        assert_eq!(local["mcpServers"][0]["command"], "node");

        let remote = &value["workspaces"][1];
        assert_eq!(remote["type"], "remote");
        assert!(remote.get("mcpServers").is_none());
        assert_eq!(remote["remoteConfig"]["apiUrl"], "https://api.example.com");
    }

    #[test]
    fn serialization_is_pretty_printed() {
        let json = sample_bundle().to_json().unwrap();
        assert!(json.starts_with("{\n  \"workspaces\""));
    }

    #[test]
    fn parse_requires_workspace_list() {
        for input in [r#"{}"#, r#"{"workspaces": {}}"#, r#"[]"#, "not json"] {
            let err = WorkspaceBundle::parse(input).unwrap_err();
            assert!(matches!(err, ProtocolError::MalformedBundle { .. }), "{}", input);
        }
    }

    #[test]
    fn parse_rejects_whole_bundle_on_missing_identity() {
        let json = r#"{"workspaces": [
            {"id": "a", "name": "A", "type": "local"},
            {"id": "", "name": "B", "type": "local"}
        ]}"#;
        assert!(WorkspaceBundle::parse(json).is_err());

        let json = r#"{"workspaces": [{"id": "a", "type": "local"}]}"#;
        assert!(WorkspaceBundle::parse(json).is_err());

        let json = r#"{"workspaces": [{"id": 5, "name": "A"}]}"#;
        assert!(WorkspaceBundle::parse(json).is_err());

        let json = r#"{"workspaces": ["a"]}"#;
        assert!(WorkspaceBundle::parse(json).is_err());
    }

    #[test]
    fn parse_rejects_duplicate_workspace_ids() {
        let json = r#"{"workspaces": [
            {"id": "a", "name": "A", "type": "local", "mcpServers": []},
            {"id": "a", "name": "A again", "type": "remote", "remoteConfig": {"apiUrl": "https://api"}}
        ]}"#;

        let err = WorkspaceBundle::parse(json).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedBundle { .. }));
        assert!(err.to_string().contains("duplicate workspace id a"));
    }

    #[test]
    fn unknown_type_defaults_to_local() {
        let json = r#"{"workspaces": [{"id": "a", "name": "A", "type": "hybrid"}]}"#;
        let bundle = WorkspaceBundle::parse(json).unwrap();
        assert_eq!(
            bundle.workspaces[0].content,
            WorkspaceContent::Local { servers: vec![] }
        );
    }

    #[test]
    fn foreign_payloads_are_discarded() {
        let json = r#"{"workspaces": [
            {"id": "r", "name": "R", "type": "remote",
             "remoteConfig": {"apiUrl": "https://r.example.com"},
             "mcpServers": [{"id": "x", "name": "x"}]},
            {"id": "l", "name": "L", "type": "local",
             "remoteConfig": {"apiUrl": "https://l.example.com"},
             "mcpServers": [{"id": "s1", "name": "one", "command": "node"}]}
        ]}"#;
        let bundle = WorkspaceBundle::parse(json).unwrap();

        assert_eq!(
            bundle.workspaces[0].content,
            WorkspaceContent::Remote {
                api_url: Some("https://r.example.com".into())
            }
        );
        assert!(bundle.workspaces[0].servers().is_empty());

        assert!(bundle.workspaces[1].is_local());
        assert_eq!(bundle.workspaces[1].servers().len(), 1);
    }

    #[test]
    fn remote_without_config_keeps_url_unknown() {
        let json = r#"{"workspaces": [{"id": "r", "name": "R", "type": "remote"}]}"#;
        let bundle = WorkspaceBundle::parse(json).unwrap();
        assert_eq!(
            bundle.workspaces[0].content,
            WorkspaceContent::Remote { api_url: None }
        );

        let json = r#"{"workspaces": [{"id": "r", "name": "R", "type": "remote", "remoteConfig": {}}]}"#;
        let bundle = WorkspaceBundle::parse(json).unwrap();
        assert_eq!(
            bundle.workspaces[0].content,
            WorkspaceContent::Remote {
                api_url: Some(String::new())
            }
        );
    }

    #[test]
    fn non_list_servers_become_empty() {
        let json = r#"{"workspaces": [{"id": "a", "name": "A", "mcpServers": "nope"}]}"#;
        let bundle = WorkspaceBundle::parse(json).unwrap();
        assert!(bundle.workspaces[0].servers().is_empty());
    }

    #[test]
    fn invalid_server_rejects_bundle() {
        let json = r#"{"workspaces": [{"id": "a", "name": "A", "mcpServers": [{"name": "no id"}]}]}"#;
        let err = WorkspaceBundle::parse(json).unwrap_err();
        assert!(err.to_string().contains("invalid server"));
    }

    #[test]
    fn server_count_sums_local_entries() {
        assert_eq!(sample_bundle().server_count(), 1);
    }
}
