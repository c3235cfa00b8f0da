//! Launch configuration entries
//!
//! A workspace launch file holds two lists: `configurations` (one debugger launch
//! or attach each) and `compounds` (named groups of configurations started
//! together). Unknown keys are preserved in [`DebugConfiguration::extra`] and sent
//! to the debug adapter untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// TASK REFERENCES
// ============================================================================

/// Task referenced by `preLaunchTask` / `postDebugTask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRef {
    /// Task label, e.g. `"build"`
    Label(String),
    /// Structured identifier, e.g. `{"type": "npm", "script": "watch"}`
    Identifier(TaskIdentifier),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskIdentifier {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TaskRef {
    pub fn label(label: impl Into<String>) -> Self {
        TaskRef::Label(label.into())
    }

    /// An empty label names no task
    pub fn is_empty(&self) -> bool {
        matches!(self, TaskRef::Label(label) if label.is_empty())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRef::Label(label) => f.write_str(label),
            TaskRef::Identifier(identifier) => {
                let mut value = identifier.properties.clone();
                value.insert("type".into(), Value::String(identifier.task_type.clone()));
                write!(f, "{}", Value::Object(value))
            }
        }
    }
}

impl From<&str> for TaskRef {
    fn from(label: &str) -> Self {
        TaskRef::Label(label.to_string())
    }
}

// ============================================================================
// DEBUG CONFIGURATION
// ============================================================================

/// One entry of a launch file's `configurations` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfiguration {
    /// Debugger type, selects the debug adapter (e.g. "python", "lldb")
    #[serde(rename = "type")]
    pub debug_type: String,
    /// Human readable name shown in pickers
    pub name: String,
    /// "launch" or "attach"
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<TaskRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_debug_task: Option<TaskRef>,
    /// Run without debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_debug: Option<bool>,
    /// Set when the configuration is started again as part of a restart
    #[serde(rename = "__restart", default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<Value>,
    /// Session that spawned this one (child sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    /// Stop/restart requests are routed to the parent session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_managed_by_parent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_save_before_start: Option<bool>,
    /// Adapter specific attributes (program, args, cwd, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DebugConfiguration {
    pub fn new(
        debug_type: impl Into<String>,
        name: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            debug_type: debug_type.into(),
            name: name.into(),
            request: request.into(),
            pre_launch_task: None,
            post_debug_task: None,
            no_debug: None,
            restart: None,
            parent_session_id: None,
            lifecycle_managed_by_parent: None,
            suppress_save_before_start: None,
            extra: Map::new(),
        }
    }

    /// Set an adapter specific attribute
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_pre_launch_task(mut self, task: impl Into<TaskRef>) -> Self {
        self.pre_launch_task = Some(task.into());
        self
    }

    pub fn with_post_debug_task(mut self, task: impl Into<TaskRef>) -> Self {
        self.post_debug_task = Some(task.into());
        self
    }

    /// Whether a raw launch-file entry is a usable configuration:
    /// an object with string `type`, `name` and `request`.
    pub fn is(value: &Value) -> bool {
        let Some(object) = value.as_object() else {
            return false;
        };
        ["type", "name", "request"]
            .iter()
            .all(|key| object.get(*key).is_some_and(Value::is_string))
    }

    /// Parse a raw launch-file entry, skipping anything that is not a configuration
    pub fn from_value(value: &Value) -> Option<Self> {
        if !Self::is(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn is_attach(&self) -> bool {
        self.request == "attach"
    }

    /// Started again by a restart (`__restart` present and not `false`/`null`)
    pub fn is_restart(&self) -> bool {
        !matches!(self.restart, None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    pub fn lifecycle_managed_by_parent(&self) -> bool {
        self.lifecycle_managed_by_parent.unwrap_or(false)
    }

    pub fn suppress_save_before_start(&self) -> bool {
        self.suppress_save_before_start.unwrap_or(false)
    }

    /// The configuration as JSON, used as `launch`/`attach` arguments
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// ============================================================================
// COMPOUNDS
// ============================================================================

/// Member reference inside a compound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompoundMember {
    /// Configuration name, looked up in the compound's own workspace root
    Name(String),
    /// Configuration name qualified with a workspace folder
    Qualified { name: String, folder: String },
}

impl CompoundMember {
    pub fn name(&self) -> &str {
        match self {
            CompoundMember::Name(name) => name,
            CompoundMember::Qualified { name, .. } => name,
        }
    }

    pub fn folder(&self) -> Option<&str> {
        match self {
            CompoundMember::Name(_) => None,
            CompoundMember::Qualified { folder, .. } => Some(folder),
        }
    }
}

impl From<&str> for CompoundMember {
    fn from(name: &str) -> Self {
        CompoundMember::Name(name.to_string())
    }
}

/// One entry of a launch file's `compounds` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugCompound {
    pub name: String,
    #[serde(default)]
    pub configurations: Option<Vec<CompoundMember>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<TaskRef>,
    /// Stopping one member stops all of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_all: Option<bool>,
}

impl DebugCompound {
    pub fn new<I, M>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<CompoundMember>,
    {
        Self {
            name: name.into(),
            configurations: Some(members.into_iter().map(Into::into).collect()),
            pre_launch_task: None,
            stop_all: None,
        }
    }

    pub fn with_stop_all(mut self, stop_all: bool) -> Self {
        self.stop_all = Some(stop_all);
        self
    }

    /// An object with a string `name` and a `configurations` key
    pub fn is(value: &Value) -> bool {
        value.as_object().is_some_and(|object| {
            object.get("name").is_some_and(Value::is_string) && object.contains_key("configurations")
        })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if !Self::is(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn stop_all(&self) -> bool {
        self.stop_all.unwrap_or(false)
    }
}
