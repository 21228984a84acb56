//! Tolerant base64 handling for subscription key material. Browsers and
//! push libraries disagree on alphabet and padding, so decoding tries the
//! url-safe unpadded, url-safe padded, standard unpadded and standard
//! padded forms in that order. Everything this crate emits is url-safe
//! without padding.

use base64::engine::general_purpose::{
    GeneralPurpose, STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD,
};
use base64::Engine;

use crate::error::{Error, Result};

// Largest sized decode is the 65-byte uncompressed point; the extra slack
// covers the conservative output estimate `decode_slice` insists on.
const SCRATCH_LEN: usize = 68;

pub(crate) fn decode(input: &str) -> Result<Vec<u8>> {
    for engine in [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD_NO_PAD] {
        if let Ok(bytes) = engine.decode(input) {
            return Ok(bytes);
        }
    }
    STANDARD.decode(input).map_err(Error::InvalidBase64)
}

/// Decodes `input` into `out`, failing unless the decoded byte count is
/// exactly `out.len()`.
pub(crate) fn decode_exact(input: &str, out: &mut [u8]) -> Result<()> {
    debug_assert!(out.len() + 3 <= SCRATCH_LEN);
    let mut scratch = [0u8; SCRATCH_LEN];
    for engine in [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD_NO_PAD, &STANDARD] {
        if let Ok(n) = engine.decode_slice(input, &mut scratch) {
            if n == out.len() {
                out.copy_from_slice(&scratch[..n]);
                return Ok(());
            }
        }
    }
    Err(Error::InvalidBase64Length {
        expected: out.len(),
    })
}

/// Checks that a configured engine produces the url-safe unpadded form
/// required on the wire.
pub(crate) fn is_url_safe_no_pad(engine: &GeneralPurpose) -> bool {
    const PROBE: [u8; 4] = [0xfb, 0xef, 0xbe, 0x3e];
    engine.encode(PROBE) == URL_SAFE_NO_PAD.encode(PROBE)
}
