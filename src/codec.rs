// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Payload encoding shared by the report builder and the transport gateway.
//!
//! Compressed payloads are gzip streams encoded as standard, padded base64
//! without line breaks.

use std::io::{Read, Write};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// Gzip `data` and encode the result as base64.
pub fn gzip_base64(data: &[u8]) -> Result<String, CodecError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Decode a base64 gzip payload produced by [`gzip_base64`].
pub fn gunzip_base64(encoded: &str) -> Result<Vec<u8>, CodecError> {
    let compressed = STANDARD.decode(encoded.trim())?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Lowercase hex SHA-256 digest of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert a duration to report milliseconds with two decimals.
///
/// The value is truncated, not rounded: 1_234_567ns becomes 1.23.
pub fn to_report_ms(elapsed: Duration) -> f64 {
    (elapsed.as_nanos() / 10_000) as f64 / 100.0
}
