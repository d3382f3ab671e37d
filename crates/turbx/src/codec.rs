// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compressed payloads: gzip wrapped in standard base64.
//!
//! Used for residual function blocks inside the intermediate form
//! (`%!fn:<payload>!%`) and for the host command channel.

use crate::error::{Result, TurbxError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Gzips `data` and encodes it as base64.
pub fn compress(data: &[u8]) -> Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let gz = encoder.finish()?;
    Ok(STANDARD.encode(gz))
}

/// Decodes base64 and gunzips the result.
pub fn decompress(payload: &str) -> Result<Vec<u8>> {
    let gz = STANDARD
        .decode(payload.trim())
        .map_err(|e| TurbxError::Codec(format!("invalid base64: {}", e)))?;
    let mut out = Vec::new();
    GzDecoder::new(gz.as_slice())
        .read_to_end(&mut out)
        .map_err(|e| TurbxError::Codec(format!("invalid gzip: {}", e)))?;
    Ok(out)
}

/// Like [`decompress`], requiring UTF-8 output.
pub fn decompress_str(payload: &str) -> Result<String> {
    String::from_utf8(decompress(payload)?)
        .map_err(|e| TurbxError::Codec(format!("invalid utf-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_roundtrip() {
        let text = "<_json:0 3/> and ünïcode";
        let payload = compress(text.as_bytes()).unwrap();
        assert!(!payload.contains("!%"));
        assert_eq!(decompress_str(&payload).unwrap(), text);
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(decompress("not base64!"), Err(TurbxError::Codec(_))));
        let not_gzip = STANDARD.encode(b"plain");
        assert!(matches!(decompress(&not_gzip), Err(TurbxError::Codec(_))));
    }
}
