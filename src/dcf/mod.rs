//! The DCF (dictionary) parser: turns a CSPro hierarchical dictionary into
//! three normalized tables.

pub mod chunk;
pub mod context;
pub mod model;
pub mod parser;
pub mod relation;
pub mod value;

pub use model::{
    DcfOutput, ItemType, RecordSpecRow, RelationSpecRow, ValueSpecRow, ValueType,
    DICTIONARY_RECORD_NAME, ROWID_SENTINEL,
};
pub use parser::parse_dcf;
