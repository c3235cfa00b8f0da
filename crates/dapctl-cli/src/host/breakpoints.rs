//! Breakpoints given on the command line

use dapctl_dap::SourceBreakpoint;
use dapctl_ports::{path_to_uri, BreakpointSource};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid breakpoint '{0}', expected PATH:LINE")]
pub struct BreakpointParseError(String);

/// One `--break PATH:LINE` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointSpec {
    pub path: String,
    pub line: u32,
}

impl FromStr for BreakpointSpec {
    type Err = BreakpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BreakpointParseError(s.to_string());
        let (path, line) = s.rsplit_once(':').ok_or_else(invalid)?;
        let line: u32 = line.parse().map_err(|_| invalid())?;
        if path.is_empty() || line == 0 {
            return Err(invalid());
        }
        Ok(Self {
            path: path.to_string(),
            line,
        })
    }
}

/// Fixed set of line breakpoints, grouped by source
#[derive(Debug, Clone, Default)]
pub struct StaticBreakpoints {
    by_uri: BTreeMap<String, Vec<SourceBreakpoint>>,
}

impl StaticBreakpoints {
    /// Relative paths are taken from `base`
    pub fn new(specs: &[BreakpointSpec], base: &Path) -> Self {
        let mut by_uri: BTreeMap<String, Vec<SourceBreakpoint>> = BTreeMap::new();
        for spec in specs {
            let path = base.join(&spec.path);
            let uri = path_to_uri(&path.to_string_lossy());
            let lines = by_uri.entry(uri).or_default();
            if !lines.iter().any(|bp| bp.line == spec.line) {
                lines.push(SourceBreakpoint::at_line(spec.line));
            }
        }
        Self { by_uri }
    }
}

impl BreakpointSource for StaticBreakpoints {
    fn uris(&self) -> Vec<String> {
        self.by_uri.keys().cloned().collect()
    }

    fn source_breakpoints(&self, uri: &str) -> Vec<SourceBreakpoint> {
        self.by_uri.get(uri).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_breakpoint() {
        assert_eq!(
            "src/main.py:12".parse::<BreakpointSpec>(),
            Ok(BreakpointSpec {
                path: "src/main.py".to_string(),
                line: 12
            })
        );
        assert!("main.py".parse::<BreakpointSpec>().is_err());
        assert!("main.py:0".parse::<BreakpointSpec>().is_err());
        assert!(":3".parse::<BreakpointSpec>().is_err());
        assert!("main.py:x".parse::<BreakpointSpec>().is_err());
    }

    #[test]
    fn test_breakpoints_grouped_by_source() {
        let specs: Vec<BreakpointSpec> = ["a.py:1", "a.py:5", "a.py:1", "/abs/b.py:2"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let breakpoints = StaticBreakpoints::new(&specs, Path::new("/work"));

        assert_eq!(
            breakpoints.uris(),
            vec!["file:///abs/b.py".to_string(), "file:///work/a.py".to_string()]
        );
        let lines: Vec<u32> = breakpoints
            .source_breakpoints("file:///work/a.py")
            .iter()
            .map(|bp| bp.line)
            .collect();
        assert_eq!(lines, vec![1, 5]);
        assert!(breakpoints.source_breakpoints("file:///other").is_empty());
    }
}
