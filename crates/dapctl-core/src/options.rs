//! Debug session options: what to start and in which workspace root
//!
//! Options are produced by the configuration manager (from a name, a
//! configuration or a compound) and consumed by the session manager. They are
//! also the persisted shape of the current selection, so they serialize with
//! the camelCase field names of the stored data.

use crate::compound::DebugCompoundRoot;
use crate::configuration::{DebugCompound, DebugConfiguration};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// CONFIGURATION OPTIONS
// ============================================================================

/// Start a single configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfigurationSessionOptions {
    /// Derived from the configuration name
    pub name: String,
    pub configuration: DebugConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder_uri: Option<String>,
    /// Provider that computed a dynamic configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    /// Shared stop signal when started as a `stopAll` compound member
    #[serde(skip)]
    pub compound_root: Option<Arc<DebugCompoundRoot>>,
}

impl DebugConfigurationSessionOptions {
    pub fn new(configuration: DebugConfiguration, workspace_folder_uri: Option<String>) -> Self {
        Self {
            name: configuration.name.clone(),
            configuration,
            workspace_folder_uri,
            provider_type: None,
            compound_root: None,
        }
    }

    /// Options for a configuration computed by a dynamic provider
    pub fn dynamic(
        configuration: DebugConfiguration,
        workspace_folder_uri: Option<String>,
        provider_type: impl Into<String>,
    ) -> Self {
        Self {
            provider_type: Some(provider_type.into()),
            ..Self::new(configuration, workspace_folder_uri)
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.provider_type.is_some()
    }

    /// Same dynamic entry: name, provider type and workspace root all match,
    /// and `self` came from a provider.
    pub fn same_dynamic_entry(&self, other: &Self) -> bool {
        self.provider_type.is_some()
            && self.configuration.name == other.configuration.name
            && self.provider_type == other.provider_type
            && self.workspace_folder_uri == other.workspace_folder_uri
    }
}

// ============================================================================
// COMPOUND OPTIONS
// ============================================================================

/// Start every member of a compound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugCompoundSessionOptions {
    pub name: String,
    pub compound: DebugCompound,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder_uri: Option<String>,
    /// Applied to every member configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_debug: Option<bool>,
}

impl DebugCompoundSessionOptions {
    pub fn new(compound: DebugCompound, workspace_folder_uri: Option<String>) -> Self {
        Self {
            name: compound.name.clone(),
            compound,
            workspace_folder_uri,
            no_debug: None,
        }
    }
}

// ============================================================================
// SESSION OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DebugSessionOptions {
    Configuration(DebugConfigurationSessionOptions),
    Compound(DebugCompoundSessionOptions),
}

impl DebugSessionOptions {
    pub fn name(&self) -> &str {
        match self {
            DebugSessionOptions::Configuration(options) => &options.name,
            DebugSessionOptions::Compound(options) => &options.name,
        }
    }

    pub fn workspace_folder_uri(&self) -> Option<&str> {
        match self {
            DebugSessionOptions::Configuration(options) => options.workspace_folder_uri.as_deref(),
            DebugSessionOptions::Compound(options) => options.workspace_folder_uri.as_deref(),
        }
    }

    pub fn configuration(&self) -> Option<&DebugConfiguration> {
        match self {
            DebugSessionOptions::Configuration(options) => Some(&options.configuration),
            DebugSessionOptions::Compound(_) => None,
        }
    }

    pub fn compound(&self) -> Option<&DebugCompound> {
        match self {
            DebugSessionOptions::Configuration(_) => None,
            DebugSessionOptions::Compound(options) => Some(&options.compound),
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, DebugSessionOptions::Compound(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, DebugSessionOptions::Configuration(options) if options.is_dynamic())
    }
}

impl From<DebugConfigurationSessionOptions> for DebugSessionOptions {
    fn from(options: DebugConfigurationSessionOptions) -> Self {
        DebugSessionOptions::Configuration(options)
    }
}

impl From<DebugCompoundSessionOptions> for DebugSessionOptions {
    fn from(options: DebugCompoundSessionOptions) -> Self {
        DebugSessionOptions::Compound(options)
    }
}

// ============================================================================
// RESOLVED OPTIONS
// ============================================================================

/// Options that went through configuration resolution.
///
/// `id` disambiguates repeated starts of the same (name, workspace root) pair:
/// the first start gets 0, each further start the previous id plus one.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalDebugSessionOptions {
    pub id: u32,
    pub options: DebugConfigurationSessionOptions,
}

impl InternalDebugSessionOptions {
    pub fn configuration(&self) -> &DebugConfiguration {
        &self.options.configuration
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn workspace_folder_uri(&self) -> Option<&str> {
        self.options.workspace_folder_uri.as_deref()
    }

    pub fn compound_root(&self) -> Option<&Arc<DebugCompoundRoot>> {
        self.options.compound_root.as_ref()
    }
}

/// Outcome of one step of configuration resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    /// The resolver declined; the start stops quietly
    Aborted,
    /// The resolver asks to open the launch file instead of starting
    OpenConfiguration,
}

impl<T> Resolution<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Resolution::Resolved(value) => Resolution::Resolved(f(value)),
            Resolution::Aborted => Resolution::Aborted,
            Resolution::OpenConfiguration => Resolution::OpenConfiguration,
        }
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Resolution::Resolved(value),
            None => Resolution::Aborted,
        }
    }
}
