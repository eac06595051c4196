//! The release builder.
//!
//! One publish produces everything a client can ask for: the latest
//! manifest for the platform, a gzipped full copy of the binary, and a
//! binary delta from every version already present in the output tree.
//! The layout is content-addressed by `(version, platform)`:
//!
//! ```text
//! <out>/<platform>.json                  latest manifest for <platform>
//! <out>/<version>/<platform>.gz          gzipped full binary at <version>
//! <out>/<oldver>/<version>/<platform>    delta from <oldver> to <version>
//! ```
//!
//! Re-publishing the same `(version, platform)` overwrites
//! deterministically, so a failed run is superseded by the next one.

use anyhow::{Context, Result};
use rsa::RsaPrivateKey;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::compress::{gzip_compress, gzip_decompress};
use crate::crypto;
use crate::delta;
use crate::manifest::{self, Info};
use crate::utils::fs::atomic_write_with_mode;

// Wire-compatible with the pre-existing release trees this builder joins:
// regular outputs carry the execute bit.
const OUTPUT_MODE: u32 = 0o755;

/// Publish `version` of the binary at `source` for `platform` into `out_dir`.
///
/// Steps, in order: hash the source, sign the digest when a key is given,
/// write the manifest, write the gzipped full, then compute a delta from
/// every other version directory that has a `<platform>.gz`. A supplied
/// key that fails to sign aborts the publish; there is no unsigned
/// fallback.
///
/// The publish is idempotent: identical inputs produce byte-identical
/// outputs (the delta codec is deterministic and PKCS#1 v1.5 signatures
/// carry no randomness).
pub async fn create_update(
    version: &str,
    source: &Path,
    platform: &str,
    out_dir: &Path,
    key: Option<&RsaPrivateKey>,
) -> Result<()> {
    let bin = tokio::fs::read(source)
        .await
        .with_context(|| format!("failed to read source binary {}", source.display()))?;

    let sha256 = crypto::sha256(&bin).to_vec();
    let signature = match key {
        Some(key) => Some(
            crypto::sign_digest(key, &sha256)
                .with_context(|| format!("failed to sign release {version} for {platform}"))?,
        ),
        None => None,
    };
    let info = Info {
        version: version.to_string(),
        sha256,
        signature,
    };

    let manifest_path = out_dir.join(format!("{platform}.json"));
    atomic_write_with_mode(&manifest_path, manifest::encode(&info)?.as_bytes(), OUTPUT_MODE)
        .with_context(|| format!("failed to write manifest {}", manifest_path.display()))?;

    let version_dir = out_dir.join(version);
    tokio::fs::create_dir_all(&version_dir)
        .await
        .with_context(|| format!("failed to create {}", version_dir.display()))?;

    let full_path = version_dir.join(format!("{platform}.gz"));
    atomic_write_with_mode(&full_path, &gzip_compress(&bin)?, OUTPUT_MODE)
        .with_context(|| format!("failed to write full binary {}", full_path.display()))?;
    info!(version, platform, "published full binary");

    write_deltas(version, platform, out_dir, &full_path).await
}

/// Produce a delta from every pre-existing version directory to `version`.
async fn write_deltas(
    version: &str,
    platform: &str,
    out_dir: &Path,
    new_gz: &Path,
) -> Result<()> {
    let mut entries = tokio::fs::read_dir(out_dir)
        .await
        .with_context(|| format!("failed to list {}", out_dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let old_version = entry.file_name().to_string_lossy().into_owned();
        if old_version == version {
            // Never a self-delta, even when re-publishing.
            continue;
        }

        let old_gz = entry.path().join(format!("{platform}.gz"));
        let old = match File::open(&old_gz) {
            Ok(file) => file,
            // No artifact for this platform at that version; nothing to diff.
            Err(_) => continue,
        };
        let new = File::open(new_gz)
            .with_context(|| format!("can't open {}", new_gz.display()))?;

        let old_plain = gzip_decompress(old)
            .with_context(|| format!("failed to decompress {}", old_gz.display()))?;
        let new_plain = gzip_decompress(new)
            .with_context(|| format!("failed to decompress {}", new_gz.display()))?;
        let patch = delta::diff(&old_plain, &new_plain).with_context(|| {
            format!("failed to compute delta {old_version} -> {version} for {platform}")
        })?;

        let delta_dir = entry.path().join(version);
        tokio::fs::create_dir_all(&delta_dir)
            .await
            .with_context(|| format!("failed to create {}", delta_dir.display()))?;
        let delta_path = delta_dir.join(platform);
        atomic_write_with_mode(&delta_path, &patch, OUTPUT_MODE)
            .with_context(|| format!("failed to write delta {}", delta_path.display()))?;
        debug!(from = %old_version, to = %version, platform, "published delta");
    }
    Ok(())
}
