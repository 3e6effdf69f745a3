//! The three normalized tables the DCF parser produces: `RecordSpecRow`,
//! `ValueSpecRow`, `RelationSpecRow`, and the enums that tag their rows.

use std::fmt;

use strum_macros::{Display, EnumString};

/// `item_type` discriminant for a [`RecordSpecRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ItemType {
    /// The one synthetic row per dictionary describing the record-type
    /// position itself (`record_name = "*"`).
    RecordDescription,
    /// An item accumulated under `[IdItems]` and copied onto every record.
    IdItem,
    /// An ordinary field.
    Item,
    /// An `Item` later re-tagged because a [`RelationSpecRow`] references it.
    JoinableItem,
}

/// `value_type` discriminant for a [`ValueSpecRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ValueType {
    ExplicitValue,
    RangeMin,
    RangeMax,
    MultiRangeMin,
    MultiRangeMax,
    ExpandedRange,
}

/// Sentinel secondary/primary link value meaning "join by occurrence index,
/// not by column".
pub const ROWID_SENTINEL: &str = "*ROWID*";

/// Sentinel `record_name` for the one `RecordDescription` row per dictionary.
pub const DICTIONARY_RECORD_NAME: &str = "*";

/// One row of the `FlatRecordSpec` table.
///
/// `FMETYPE`, when emitted, is `fme_char(<len>)`; it is carried as an
/// `Option` because it is only populated for genuine `Item`/`IdItem` rows in
/// some pipelines, not the synthetic `RecordDescription` row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSpecRow {
    pub item_type: Option<ItemType>,
    pub file_code: String,
    pub record_name: String,
    pub record_type_value: String,
    pub record_label: String,
    pub name: String,
    pub label: String,
    pub start: u32,
    pub len: u32,
    pub occurrences: u32,
    pub zero_fill: bool,
    pub decimal_char: String,
    pub decimals: u32,
    pub fmetype: Option<String>,
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Item
    }
}

impl RecordSpecRow {
    /// `fme_char(<len>)`, computed on demand for CSV emission.
    pub fn fme_type(&self) -> String {
        format!("fme_char({})", self.len)
    }
}

/// One row of the `FlatValuesSpec` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSpecRow {
    pub file_code: String,
    pub name: String,
    pub value: String,
    pub value_desc: String,
    pub value_type: Option<ValueType>,
}

/// One row of the `RelationshipsSpec` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationSpecRow {
    pub file_code: String,
    pub rel_name: String,
    pub primary_table: String,
    pub primary_link: String,
    pub secondary_table: String,
    pub secondary_link: String,
}

impl fmt::Display for RecordSpecRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({:?}@{}:{})",
            self.record_name, self.name, self.item_type, self.start, self.len
        )
    }
}

/// The full output of one DCF parse.
#[derive(Debug, Clone, Default)]
pub struct DcfOutput {
    pub record_spec: Vec<RecordSpecRow>,
    pub value_spec: Vec<ValueSpecRow>,
    pub relation_spec: Vec<RelationSpecRow>,
}
