//! Error kinds the update state machine branches on.
//!
//! Everything else in the crate travels as `anyhow::Error` with context;
//! these three are typed because the updater's delta/full fallback logic
//! needs to tell them apart (a hash mismatch from the patched binary falls
//! back to the full download, a signature mismatch never does).

use thiserror::Error;

/// Verification failures surfaced by [`crate::updater::Updater::update`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    /// The candidate's SHA-256 does not match the manifest.
    #[error("new file hash mismatch after patch")]
    HashMismatch,

    /// The manifest signature does not verify against the configured key.
    #[error("new file signature mismatch after patch")]
    SignatureMismatch,

    /// A public key is configured but the manifest carries no signature.
    #[error("update: configured with public key but version info had no signature")]
    MissingSignature,
}
