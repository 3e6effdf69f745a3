//! Schema-and-data ingestion engine for CSPro "hierarchical" DHS survey
//! files: a DCF dictionary parser, a fixed-width DAT parser, a metadata
//! catalog loader, a data table synthesizer, and a bulk data loader, wired
//! together by [`pipeline::run_survey`].

pub mod config;
pub mod csvio;
pub mod dat;
pub mod dcf;
pub mod encoding;
pub mod error;
pub mod filename;
pub mod pipeline;
pub mod similarity;
pub mod warehouse;
