//! MCP server configuration records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How a server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerType {
    /// Spawned locally from `command` and `args`.
    #[default]
    #[serde(rename = "local")]
    Local,
    /// Reached over SSE at `remote_url`.
    #[serde(rename = "remote")]
    Remote,
    /// Reached over streamable HTTP at `remote_url`.
    #[serde(rename = "remote-streamable")]
    RemoteStreamable,
}

/// Configuration of a single MCP server.
///
/// A server belongs to exactly one workspace at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    /// Unique server id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Transport used to reach the server.
    #[serde(default)]
    pub server_type: ServerType,
    /// Executable for local servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment for the spawned process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Endpoint for remote servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Bearer token for remote servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    /// Start the server when the workspace is activated.
    #[serde(default)]
    pub auto_start: bool,
    /// Server is configured but switched off.
    #[serde(default)]
    pub disabled: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Per-tool enablement.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_permissions: BTreeMap<String, bool>,
    /// Fields this build does not model, kept so they survive a pull and push.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl McpServerConfig {
    /// Creates a local server that runs `command`.
    pub fn local(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_type: ServerType::Local,
            command: Some(command.into()),
            args: Vec::new(),
            env: BTreeMap::new(),
            remote_url: None,
            bearer_token: None,
            auto_start: false,
            disabled: false,
            description: None,
            project_id: None,
            tool_permissions: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Creates a remote server reached at `url`.
    pub fn remote(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server_type: ServerType::Remote,
            command: None,
            remote_url: Some(url.into()),
            ..Self::local(id, name, "")
        }
    }

    /// Sets the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
