//! Configuration knobs, as explicit inputs.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Range expansion policy for `[ValueSet]` ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
pub enum ExpansionPolicy {
    None,
    Multiple,
    #[default]
    All,
}

/// The two warehouse schema names: spec tables and per-record data tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNames {
    pub spec_schema: String,
    pub data_schema: String,
}

impl Default for SchemaNames {
    fn default() -> Self {
        SchemaNames {
            spec_schema: "spec".to_string(),
            data_schema: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expand_ranges: ExpansionPolicy,
    pub range_expansion_limit: u64,
    pub max_column_threshold: usize,
    pub dry_run: bool,
    pub use_bulk_copy: bool,
    pub schemas: SchemaNames,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            expand_ranges: ExpansionPolicy::All,
            range_expansion_limit: 10_000,
            max_column_threshold: 500,
            dry_run: true,
            use_bulk_copy: true,
            schemas: SchemaNames::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.expand_ranges, ExpansionPolicy::All);
        assert_eq!(cfg.range_expansion_limit, 10_000);
        assert_eq!(cfg.max_column_threshold, 500);
        assert!(cfg.dry_run);
        assert!(cfg.use_bulk_copy);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = Config::default();
        let serialized = serde_json::to_string(&cfg).unwrap();
        let deserialized: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }
}
