use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{process::CsvMode, store::Collections};

/// Extension of files the pipeline processes; anything else is skipped.
pub const SCHEDULE_EXTENSION: &str = "csv";

/// Tunables shared by every run of a [`crate::pipeline::Pipeline`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collections: Collections,
    pub csv_mode: CsvMode,
}

impl Settings {
    /// Load from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_collection_names() {
        let s = Settings::default();
        assert_eq!(s.collections.vendor_names, "vendorNames");
        assert_eq!(s.collections.file_status, "fileStatus");
        assert_eq!(s.csv_mode, CsvMode::Strict);
    }

    #[test]
    fn partial_yaml_overrides() {
        let s = Settings::from_yaml_str(
            "csv_mode: lenient\ncollections:\n  schedules: staging_schedules\n",
        )
        .unwrap();
        assert_eq!(s.csv_mode, CsvMode::Lenient);
        assert_eq!(s.collections.schedules, "staging_schedules");
        assert_eq!(s.collections.vendors, "vendors");
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Settings::from_yaml_str("csv_mode: sloppy\n").is_err());
    }
}
