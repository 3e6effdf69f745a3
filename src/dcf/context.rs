//! Parse-time context threaded through chunk terminator handlers, modeled as
//! a small state struct owned by the parser.
//!
//! None of this is module-level or thread-local state; every terminator
//! receives `&mut ParseContext` explicitly.

use std::collections::HashMap;

use crate::error::{IngestError, Result};

/// Hierarchical imputation context plus the bookkeeping needed for
/// duplicate-name detection and valueset attachment.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub current_level_name: Option<String>,
    pub current_level_label: Option<String>,

    pub current_record_name: Option<String>,
    pub current_record_label: Option<String>,
    pub current_record_type_value: Option<String>,

    pub survey_zero_fill: bool,
    pub survey_decimal_char: String,

    /// Id-items accumulated under the most recent `[IdItems]` block, copied
    /// onto every subsequent `[Record]`.
    pub current_ids: Vec<IdItemTemplate>,

    /// True between an `[IdItems]` marker and the next `[Record]`; while
    /// true, `[Item]` chunks feed `current_ids` instead of being emitted
    /// directly.
    pub accumulating_ids: bool,

    /// Index into the record-spec output vector of the most recently emitted
    /// `Item`/`IdItem` row, used by `[ValueSet]` attachment: a mutable cursor
    /// index rather than a pointer into the vector.
    pub last_item_index: Option<usize>,

    levels_seen: HashMap<String, String>,
    records_seen: HashMap<String, String>,
}

/// One id-item as accumulated inside `[IdItems]`, before it is copied onto a
/// concrete record at `[Record]` terminator time.
#[derive(Debug, Clone, PartialEq)]
pub struct IdItemTemplate {
    pub name: String,
    pub label: String,
    pub start: u32,
    pub len: u32,
    pub zero_fill: bool,
    pub decimal_char: String,
    pub decimals: u32,
}

impl ParseContext {
    pub fn new() -> Self {
        ParseContext {
            survey_decimal_char: ".".to_string(),
            ..Default::default()
        }
    }

    /// Records a `[Level]` name/label, enforcing the duplicate rule: same
    /// label is a warning (tolerated), differing label is fatal.
    pub fn set_level(&mut self, name: &str, label: &str) -> Result<()> {
        if let Some(existing) = self.levels_seen.get(name) {
            if existing != label {
                return Err(IngestError::DcfFatal(format!(
                    "level '{name}' redeclared with conflicting label: '{existing}' vs '{label}'"
                )));
            }
            log::warn!("level '{name}' redeclared with identical label");
        }
        self.levels_seen.insert(name.to_string(), label.to_string());
        self.current_level_name = Some(name.to_string());
        self.current_level_label = Some(label.to_string());
        Ok(())
    }

    /// Records a `[Record]` name/label under the same duplicate rule as
    /// levels.
    pub fn set_record(&mut self, name: &str, label: &str, type_value: &str) -> Result<()> {
        if let Some(existing) = self.records_seen.get(name) {
            if existing != label {
                return Err(IngestError::DcfFatal(format!(
                    "record '{name}' redeclared with conflicting label: '{existing}' vs '{label}'"
                )));
            }
            log::warn!("record '{name}' redeclared with identical label");
        }
        self.records_seen.insert(name.to_string(), label.to_string());
        self.current_record_name = Some(name.to_string());
        self.current_record_label = Some(label.to_string());
        self.current_record_type_value = Some(type_value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_identical_redeclaration() {
        let mut ctx = ParseContext::new();
        ctx.set_level("HH", "Household").unwrap();
        assert!(ctx.set_level("HH", "Household").is_ok());
    }

    #[test]
    fn rejects_conflicting_redeclaration() {
        let mut ctx = ParseContext::new();
        ctx.set_record("REC01", "Household record", "1").unwrap();
        let err = ctx.set_record("REC01", "Different label", "1");
        assert!(err.is_err());
    }
}
