//! Launch configurations: per-root models, lookup, current selection and
//! persistence

mod manager;
mod model;
mod recent;

pub use manager::{DebugConfigurationManager, INITIAL_LAUNCH_FILE, STORAGE_KEY};
pub use model::{parse, DebugConfigurationModel};
pub use recent::RecentDynamicOptions;

#[cfg(test)]
mod manager_tests;
