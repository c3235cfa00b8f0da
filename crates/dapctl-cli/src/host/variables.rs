//! `${...}` substitution for launch configurations

use async_trait::async_trait;
use dapctl_core::Result;
use dapctl_logging::warn;
use dapctl_ports::{folder_name, uri_to_path, VariableResolveOptions, VariableResolver};
use serde_json::Value;
use std::path::PathBuf;

/// Resolves the non-interactive predefined variables:
/// `workspaceFolder`, `workspaceFolderBasename`, `cwd`, `userHome`,
/// `pathSeparator`, `env:NAME` and `command:ID`.
///
/// Unknown variables are left in place.
#[derive(Debug, Clone)]
pub struct EnvVariableResolver {
    cwd: PathBuf,
}

impl EnvVariableResolver {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn lookup(&self, name: &str, options: &VariableResolveOptions) -> Option<String> {
        let root = options.workspace_folder_uri.as_deref();
        if let Some(var) = name.strip_prefix("env:") {
            return Some(std::env::var(var).unwrap_or_default());
        }
        if let Some(id) = name.strip_prefix("command:") {
            return options.command_id_variables.get(id).cloned();
        }
        match name {
            "workspaceFolder" | "workspaceRoot" => root.map(|uri| uri_to_path(uri).to_string()),
            "workspaceFolderBasename" => root.map(|uri| folder_name(uri).to_string()),
            "cwd" => Some(self.cwd.to_string_lossy().into_owned()),
            "userHome" => dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
            "pathSeparator" => Some(std::path::MAIN_SEPARATOR.to_string()),
            _ => None,
        }
    }

    fn substitute(&self, text: &str, options: &VariableResolveOptions) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            let Some(end) = tail.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &tail[..end];
            match self.lookup(name, options) {
                Some(value) => out.push_str(&value),
                None => {
                    warn!(variable = name, "Cannot resolve variable");
                    out.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn resolve_value(&self, value: Value, options: &VariableResolveOptions) -> Value {
        match value {
            Value::String(text) => Value::String(self.substitute(&text, options)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_value(item, options))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, self.resolve_value(item, options)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl VariableResolver for EnvVariableResolver {
    async fn resolve(
        &self,
        value: Value,
        options: &VariableResolveOptions,
    ) -> Result<Option<Value>> {
        Ok(Some(self.resolve_value(value, options)))
    }
}
