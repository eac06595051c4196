//! The release-builder command line.
//!
//! ```bash
//! # Single platform
//! selfup ./target/release/myapp 1.3
//!
//! # Cross platform: publish every file in the directory, named <os>-<arch>
//! selfup ./build/ 1.3
//!
//! # Signed
//! selfup -k private.pem -o public ./target/release/myapp 1.3
//! ```
//!
//! Key parsing lives here, not in the core: the library takes an already
//! parsed [`RsaPrivateKey`].

use anyhow::{Context, Result};
use clap::Parser;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::release::create_update;
use crate::utils::platform;

/// Generate the release files the updater consumes.
///
/// Put the output directory somewhere on a web server where your clients
/// can reach it; the updater derives every URL from this layout.
#[derive(Parser, Debug)]
#[command(
    name = "selfup",
    version,
    about = "Generate signed incremental update releases",
    disable_version_flag = true
)]
pub struct Cli {
    /// Binary to publish, or a directory of per-platform binaries.
    #[arg(value_name = "BINARY-OR-DIR")]
    pub app_path: PathBuf,

    /// Version string for this release.
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Private key (PEM, PKCS#1) used to sign the release.
    #[arg(short, long, value_name = "PEM-FILE")]
    pub key: Option<PathBuf>,

    /// Output directory for the generated release files.
    #[arg(short, long, default_value = "public")]
    pub output: PathBuf,

    /// Target platform in the form os-arch. Defaults to GOOS/GOARCH when
    /// both are set in the environment, else the host platform.
    #[arg(short, long, default_value_t = platform::default_for_builder())]
    pub platform: String,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let key = match &self.key {
            Some(path) => Some(load_private_key(path)?),
            None => None,
        };

        tokio::fs::create_dir_all(&self.output)
            .await
            .with_context(|| format!("failed to create output dir {}", self.output.display()))?;

        let meta = tokio::fs::metadata(&self.app_path)
            .await
            .with_context(|| format!("failed to open binary location {}", self.app_path.display()))?;

        if meta.is_dir() {
            // Each contained file is one platform's binary, named <os>-<arch>.
            let mut entries = tokio::fs::read_dir(&self.app_path)
                .await
                .with_context(|| format!("failed to list {}", self.app_path.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                let platform = entry.file_name().to_string_lossy().into_owned();
                create_update(&self.version, &entry.path(), &platform, &self.output, key.as_ref())
                    .await?;
            }
        } else {
            create_update(&self.version, &self.app_path, &self.platform, &self.output, key.as_ref())
                .await?;
        }

        info!(version = %self.version, out = %self.output.display(), "release published");
        Ok(())
    }
}

fn load_private_key(path: &Path) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read private key {}", path.display()))?;
    RsaPrivateKey::from_pkcs1_pem(&pem)
        .with_context(|| format!("failed to parse private key {}", path.display()))
}
