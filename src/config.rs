// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Runtime settings for the command layer and the file-info scanner.
//!
//! Filter lists are ordered: the first matching pattern wins. Layer and
//! filament patterns capture millimeters in the named group `mm` (or meters
//! in `m`), time patterns use the optional groups `h`, `m`, `s`, and
//! generated-by patterns capture the slicer name in group 1. Patterns are
//! matched against whole comment-carrying lines.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Physical root for drive 0.
    pub base_directory: PathBuf,
    /// Cadence of the host telemetry refresh. The refresh itself lives
    /// outside the command layer; only the contract is carried here.
    pub host_update_interval: Duration,
    /// Reverse-reader buffer and forward-reader block size.
    pub file_info_read_buffer_size: usize,
    /// Maximum bytes scanned from the start of a file.
    pub file_info_read_limit_header: u64,
    /// Maximum bytes scanned from the end of a file.
    pub file_info_read_limit_footer: u64,
    /// Upper bound on plausible first-layer Z values.
    pub max_layer_height: f64,
    pub layer_height_filters: Vec<String>,
    pub filament_filters: Vec<String>,
    pub generated_by_filters: Vec<String>,
    pub print_time_filters: Vec<String>,
    pub simulated_time_filters: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("/opt/gforge/sd"),
            host_update_interval: Duration::from_secs(4),
            file_info_read_buffer_size: 8192,
            file_info_read_limit_header: 12288,
            file_info_read_limit_footer: 262144,
            max_layer_height: 0.9,
            layer_height_filters: to_strings(&[
                r"(?i)layer_?height\D+(?P<mm>\d+\.?\d*)",
                r"(?i)layer height\D+(?P<mm>\d+\.?\d*)",
            ]),
            filament_filters: to_strings(&[
                r"(?i)filament used \[mm\]\D*(?P<mm>\d+\.?\d*)",
                r"(?i)filament used\D*(?P<m>\d+\.?\d*)\s*m\b",
                r"(?i)filament used\D*(?P<mm>\d+\.?\d*)\s*mm\b",
                r"(?i)(?P<mm>\d+\.?\d*)\s*mm\b.*of filament",
                r"(?i)(?P<m>\d+\.?\d*)\s*m\b.*of filament",
            ]),
            generated_by_filters: to_strings(&[
                r"(?i)generated by\s+(.+)",
                r"(?i);\s*Sliced by\s+(.+)",
                r"(?i);\s*(KISSlicer.*)",
                r"(?i);\s*Sliced at:\s*(.+)",
                r"(?i);\s*Generated with\s+(.+)",
            ]),
            print_time_filters: to_strings(&[
                r"(?i)estimated printing time.*=\s*(?:(?P<h>\d+)h\s*)?(?:(?P<m>\d+)m\s*)?(?:(?P<s>\d+)s)?",
                r"(?i);\s*TIME:(?P<s>\d+\.?\d*)",
                r"(?i)Build time:\s*(?:(?P<h>\d+) hours?\s*)?(?:(?P<m>\d+) minutes?\s*)?(?:(?P<s>\d+) seconds?)?",
            ]),
            simulated_time_filters: to_strings(&[
                r"(?i)simulated print time\D*(?P<s>\d+\.?\d*)",
            ]),
        }
    }
}

fn to_strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn default_limits_are_plausible() {
        let settings = Settings::default();
        assert!(settings.file_info_read_buffer_size >= 1024);
        assert!(settings.file_info_read_limit_header >= 4096);
        assert!(settings.file_info_read_limit_footer >= settings.file_info_read_limit_header);
        assert!(settings.max_layer_height > 0.0);
    }

    #[test]
    fn default_filters_compile() {
        let settings = Settings::default();
        for pattern in settings
            .layer_height_filters
            .iter()
            .chain(&settings.filament_filters)
            .chain(&settings.generated_by_filters)
            .chain(&settings.print_time_filters)
            .chain(&settings.simulated_time_filters)
        {
            assert!(Regex::new(pattern).is_ok(), "bad default pattern {pattern}");
        }
    }

    #[test]
    fn filament_filters_carry_a_unit_group() {
        for pattern in Settings::default().filament_filters {
            let regex = Regex::new(&pattern).unwrap();
            let has_unit = regex
                .capture_names()
                .flatten()
                .any(|name| name == "mm" || name == "m");
            assert!(has_unit, "no unit group in {pattern}");
        }
    }
}
