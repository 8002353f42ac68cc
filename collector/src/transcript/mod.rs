//! Everything that knows about the text layout of the swift tools lives here.
//!
//! The tools print Python `repr()` output prefixed by the URL of the storage
//! node that answered, so decoding always takes two steps: [`split_per_host`]
//! finds the host lines and [`sanitize`] rewrites each payload into JSON.

mod dispersion;
mod md5;
mod sanitize;
mod split;

pub use dispersion::{
    strip_dispersion_errors,
    DispersionError,
};
pub use md5::{
    md5_blocks,
    ChecksumBlock,
};
pub use sanitize::sanitize;
pub use split::{
    split_per_host,
    HostBlock,
    HostBlocks,
};

use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("command did not return any usable output")]
    NoUsableOutput,
}

/// Sanitizes `payload` and decodes it as JSON.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(&sanitize(payload))
}

/// Whether the sanitized payload is structured data at all, regardless of its shape.
pub fn is_structured(payload: &[u8]) -> bool {
    decode::<serde_json::Value>(payload).is_ok()
}
