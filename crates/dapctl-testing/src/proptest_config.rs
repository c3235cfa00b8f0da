//! Shared proptest configuration for consistent test behavior across crates.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dapctl_testing::proptest_config;
//!
//! proptest! {
//!     #![proptest_config(proptest_config::auto_config())]
//!
//!     #[test]
//!     fn my_property(x in 0..100i32) {
//!         // ...
//!     }
//! }
//! ```
//!
//! Set `PROPTEST_CASES` to control thoroughness (64 on PR checks, thousands
//! nightly).

use proptest::prelude::*;

/// Fast tests with a small case count
pub fn ci_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    }
}

/// Config for properties that drive a tokio runtime per case
pub fn async_config() -> ProptestConfig {
    ProptestConfig {
        cases: 32,
        max_shrink_iters: 50,
        ..ProptestConfig::default()
    }
}

/// Get config based on the `PROPTEST_CASES` env var, 256 cases when unset
pub fn auto_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);

    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}
