//! Filename grammar: `<survey_id>.<CC><TT><VV>[.<record_name>].<ext>`.
//!
//! `survey_id` is numeric, `CC` a 2-letter country code, `TT` a 2-letter
//! file-type code, `VV` a 2-digit version. Top-level artifacts (the raw
//! DCF/DAT inputs) have exactly 3 dot-separated components; everything that
//! names a record or derived artifact (the per-record CSVs, the three flat
//! output CSVs) has exactly 4. Malformed names fail loudly rather than being
//! silently skipped.

use winnow::{
    combinator::{eof, terminated},
    stream::AsChar,
    token::take_while,
    PResult, Parser,
};

use crate::error::{IngestError, Result};

/// `(survey_id, country, file_type, version)`, parsed from a filename stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Survey {
    pub survey_id: String,
    pub country: String,
    pub file_type: String,
    pub version: String,
}

impl Survey {
    /// The `<id>.<CC><TT><VV>` stem this survey was parsed from, e.g.
    /// `511.CMIR71`.
    pub fn stem(&self) -> String {
        format!(
            "{}.{}{}{}",
            self.survey_id,
            self.country.to_uppercase(),
            self.file_type.to_uppercase(),
            self.version
        )
    }

    /// `filecode` as used by the metadata catalog: the survey code with the
    /// numeric survey prefix stripped off, e.g. `CMIR71`.
    pub fn filecode(&self) -> String {
        format!(
            "{}{}{}",
            self.country.to_uppercase(),
            self.file_type.to_uppercase(),
            self.version
        )
    }
}

/// A fully-parsed filename: the survey it belongs to, the record/artifact
/// name segment (present when the filename has 4 dot-separated components),
/// and the file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub survey: Survey,
    pub record_name: Option<String>,
    pub ext: String,
}

fn digits1<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(1.., AsChar::is_dec_digit).parse_next(input)
}

fn alpha2<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(2, AsChar::is_alpha).parse_next(input)
}

fn digit2<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(2, AsChar::is_dec_digit).parse_next(input)
}

/// Parses a `<CC><TT><VV>` survey code, e.g. `CMIR71`.
fn survey_code<'s>(input: &mut &'s str) -> PResult<(&'s str, &'s str, &'s str)> {
    let country = alpha2.parse_next(input)?;
    let file_type = alpha2.parse_next(input)?;
    let version = terminated(digit2, eof).parse_next(input)?;
    Ok((country, file_type, version))
}

/// Parses a full filename (with extension) into its components.
pub fn parse_filename(filename: &str) -> Result<ParsedFilename> {
    let components: Vec<&str> = filename.split('.').collect();
    let (survey_id_str, code_str, record_name, ext) = match components.as_slice() {
        [id, code, ext] => (*id, *code, None, *ext),
        [id, code, record_name, ext] => (*id, *code, Some(*record_name), *ext),
        _ => {
            return Err(IngestError::MalformedFilename(
                filename.to_string(),
                format!(
                    "expected 3 or 4 dot-separated components, found {}",
                    components.len()
                ),
            ))
        }
    };

    let mut id_input = survey_id_str;
    digits1(&mut id_input).map_err(|_: winnow::error::ErrMode<winnow::error::ContextError>| {
        IngestError::MalformedFilename(
            filename.to_string(),
            format!("survey_id '{survey_id_str}' is not numeric"),
        )
    })?;
    if !id_input.is_empty() {
        return Err(IngestError::MalformedFilename(
            filename.to_string(),
            format!("survey_id '{survey_id_str}' is not numeric"),
        ));
    }

    let mut code_input = code_str;
    let (country, file_type, version) = survey_code(&mut code_input).map_err(|_| {
        IngestError::MalformedFilename(
            filename.to_string(),
            format!("'{code_str}' is not a valid <CC><TT><VV> survey code"),
        )
    })?;

    Ok(ParsedFilename {
        survey: Survey {
            survey_id: survey_id_str.to_string(),
            country: country.to_lowercase(),
            file_type: file_type.to_lowercase(),
            version: version.to_string(),
        },
        record_name: record_name.map(str::to_string),
        ext: ext.to_string(),
    })
}

/// Parses a `<survey_id>.<CC><TT><VV>` stem on its own (no extension, no
/// record name), as used when deriving output filenames from an input DCF
/// or DAT path.
pub fn parse_stem(stem: &str) -> Result<Survey> {
    let components: Vec<&str> = stem.split('.').collect();
    let [id, code] = components.as_slice() else {
        return Err(IngestError::MalformedFilename(
            stem.to_string(),
            format!("expected 2 dot-separated components, found {}", components.len()),
        ));
    };

    let parsed = parse_filename(&format!("{id}.{code}.stem"))?;
    Ok(parsed.survey)
}
