//! Encoding autodetection: a prefix sample is fed to a byte n-gram/frequency
//! heuristic, then the whole file is decoded with the winning encoding.
//!
//! Grounded on `examples/other_examples/.../jqnatividad-csv-nose`'s sniffer,
//! which pairs `chardetng` (the detector) with `encoding_rs` (the decoder)
//! for exactly this two-step job.

use std::{fs, path::Path};

use chardetng::EncodingDetector;

use crate::error::{IngestError, Result};

/// Bytes sampled from the front of the file to feed the detector. Large
/// enough to see past a byte-order mark and a few lines of a DCF/DAT file.
const SAMPLE_SIZE: usize = 8192;

/// Reads `path`, autodetects its encoding from a prefix sample, then decodes
/// the full contents with that encoding.
pub fn detect_and_decode(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    decode_bytes(&bytes, path)
}

/// Same as [`detect_and_decode`] but operating on an in-memory buffer,
/// exposed separately so DCF/DAT encoding detection can be unit tested
/// without touching the filesystem.
pub fn decode_bytes(bytes: &[u8], path_for_errors: &Path) -> Result<String> {
    let sample_len = bytes.len().min(SAMPLE_SIZE);

    let mut detector = EncodingDetector::new();
    detector.feed(&bytes[..sample_len], sample_len == bytes.len());
    let (encoding, _reliable) = detector.guess_assess(None, true);

    let (decoded, _used_encoding, had_errors) = encoding.decode(bytes);
    if had_errors && encoding.name() != encoding_rs::UTF_8.name() {
        // Fall back to a detect-then-reopen pass over the full buffer before
        // giving up: re-run detection against every byte once a partial
        // sample turns out to have been decoded wrong, rather than trusting
        // the sample's guess.
        let mut full_detector = EncodingDetector::new();
        full_detector.feed(bytes, true);
        let (full_encoding, _) = full_detector.guess_assess(None, true);
        let (decoded2, _, had_errors2) = full_encoding.decode(bytes);
        if !had_errors2 {
            return Ok(decoded2.into_owned());
        }
        return Err(IngestError::EncodingDetectionFailed(
            path_for_errors.display().to_string(),
        ));
    }

    Ok(decoded.into_owned())
}
