//! Most recently used dynamic configurations

use dapctl_core::DebugConfigurationSessionOptions;
use dapctl_config::DEFAULT_RECENT_DYNAMIC_MAX;

/// Bounded most-recent-first list of dynamic configuration options.
///
/// Entries are unique by (configuration name, provider type, workspace root).
#[derive(Debug, Clone, PartialEq)]
pub struct RecentDynamicOptions {
    max: usize,
    entries: Vec<DebugConfigurationSessionOptions>,
}

impl Default for RecentDynamicOptions {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_DYNAMIC_MAX)
    }
}

impl RecentDynamicOptions {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            entries: Vec::new(),
        }
    }

    /// Move `options` to the front, dropping the oldest entry past the bound.
    /// Options without a provider type are ignored.
    pub fn push(&mut self, options: DebugConfigurationSessionOptions) {
        if !options.is_dynamic() {
            return;
        }
        self.entries.retain(|entry| !entry.same_dynamic_entry(&options));
        self.entries.insert(0, options);
        self.entries.truncate(self.max);
    }

    /// Replace the contents, keeping the first entries up to the bound
    pub fn set_all(&mut self, entries: impl IntoIterator<Item = DebugConfigurationSessionOptions>) {
        self.entries.clear();
        for options in entries {
            if options.is_dynamic() && !self.entries.iter().any(|e| e.same_dynamic_entry(&options)) {
                self.entries.push(options);
            }
        }
        self.entries.truncate(self.max);
    }

    pub fn entries(&self) -> &[DebugConfigurationSessionOptions] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
