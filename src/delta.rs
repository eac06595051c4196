//! The binary-delta seam.
//!
//! The protocol treats the pairwise delta format as opaque bytes and
//! verifies only the reconstructed binary's hash; builder and updater just
//! have to agree on the codec. This module is the single place that
//! choice lives (bsdiff), so swapping codecs touches nothing else.

use anyhow::{Context, Result};

/// Compute a delta that transforms `old` into `new`.
pub fn diff(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let mut patch = Vec::new();
    bsdiff::diff(old, new, &mut patch).context("delta computation failed")?;
    Ok(patch)
}

/// Reconstruct the new binary from `old` and a delta produced by [`diff`].
pub fn patch(old: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut new = Vec::new();
    bsdiff::patch(old, &mut &delta[..], &mut new).context("patch apply failed")?;
    Ok(new)
}
