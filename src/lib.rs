//! selfup - signed, incremental self-updates for standalone binaries.
//!
//! Two cooperating halves share one wire/disk format: a release builder
//! that publishes update artifacts into a directory tree, and an updater
//! that an application embeds to replace its own executable.
//!
//! # Update protocol
//!
//! ```text
//! GET <api>/myapp/linux-amd64.json
//!
//! 200 ok
//! {
//!     "Version": "1.3",
//!     "Sha256": "..." // base64 of the uncompressed binary's digest
//! }
//!
//! then
//!
//! GET <diff>/myapp/1.2/1.3/linux-amd64
//!
//! 200 ok
//! [bsdiff data]
//!
//! or, when patching is unavailable or fails,
//!
//! GET <bin>/myapp/1.3/linux-amd64.gz
//!
//! 200 ok
//! [gzipped executable data]
//! ```
//!
//! The manifest's `Sha256` covers the uncompressed binary, so the same
//! digest (and the optional RSA signature over it) authenticates both the
//! patched and the fully-downloaded candidate.
//!
//! # Embedding the updater
//!
//! ```rust,no_run
//! use selfup::updater::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let updater = Updater {
//!     current_version: "1.2".to_string(),
//!     api_url: "http://updates.yourdomain.com/".to_string(),
//!     bin_url: "http://updates.yourdomain.com/".to_string(),
//!     diff_url: "http://updates.yourdomain.com/".to_string(),
//!     cmd_name: "myapp".to_string(),
//!     dir: "update/".to_string(),
//!     check_time: 24,
//!     randomize_time: 24,
//!     ..Updater::default()
//! };
//! let info = updater.background_run().await?;
//! if !info.version.is_empty() {
//!     println!("updated to {}", info.version);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Publishing a release
//!
//! The `selfup` binary wraps [`release::create_update`]:
//!
//! ```bash
//! selfup -o public ./target/release/myapp 1.3
//! ```
//!
//! Serve the output directory unchanged; the updater derives every URL it
//! needs from the layout the builder wrote.

pub mod cli;
pub mod compress;
pub mod crypto;
pub mod delta;
pub mod errors;
pub mod manifest;
pub mod release;
pub mod updater;
pub mod utils;

pub use errors::UpdateError;
pub use manifest::Info;
pub use release::create_update;
pub use updater::Updater;
