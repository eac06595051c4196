//! The self-updater an application embeds.
//!
//! [`Updater`] is plain configuration plus a handful of operations; there
//! is no global state. The expected integration is a background task at
//! process startup calling [`Updater::background_run`], which consults the
//! persistent cooldown, fetches the manifest, prefers a binary delta over
//! a full download, verifies the candidate, and atomically replaces the
//! running executable.
//!
//! Everything network-shaped goes through the [`Requester`] seam; tests
//! drive the whole state machine with a fake.

pub mod replace;
pub mod requester;
pub mod schedule;

pub use requester::{HttpRequester, Requester};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use rsa::RsaPublicKey;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::warn;

use crate::compress;
use crate::crypto;
use crate::delta;
use crate::errors::UpdateError;
use crate::manifest::{self, Info};
use crate::utils::platform;

const CHECK_TIME_FILE: &str = "cktime";

/// Version sentinel that disables updating, for local builds.
const DEV_VERSION: &str = "dev";

/// Configuration and runtime data for doing an update.
///
/// `api_url`, `bin_url` and `diff_url` may all point at the same base when
/// every artifact is served from one place.
///
/// # Examples
///
/// ```rust,no_run
/// use selfup::updater::Updater;
///
/// # async fn example() -> anyhow::Result<()> {
/// let updater = Updater {
///     current_version: env!("CARGO_PKG_VERSION").to_string(),
///     api_url: "http://updates.yourdomain.com/".to_string(),
///     bin_url: "http://updates.yourdomain.com/".to_string(),
///     diff_url: "http://updates.yourdomain.com/".to_string(),
///     cmd_name: "myapp".to_string(),
///     dir: "update/".to_string(),
///     check_time: 24,
///     randomize_time: 24,
///     ..Updater::default()
/// };
/// updater.background_run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Updater {
    /// Version of the running binary. `"dev"` disables updating.
    pub current_version: String,
    /// Base URL for manifest fetches.
    pub api_url: String,
    /// Base URL for full-binary fallback fetches.
    pub bin_url: String,
    /// Base URL for delta fetches. Empty disables the delta stage.
    pub diff_url: String,
    /// Logical application name; appended (escaped) to every base URL.
    pub cmd_name: String,
    /// Subdirectory, relative to the executable, for updater state.
    pub dir: String,
    /// Check for an update regardless of the cooldown file.
    pub force_check: bool,
    /// Hours until the next check after a successful one.
    pub check_time: u32,
    /// Additional uniform jitter in `[0, randomize_time]` hours, inclusive.
    pub randomize_time: u32,
    /// Fetch capability; defaults to a plain HTTP GET.
    pub requester: Box<dyn Requester>,
    /// Optional verification key. When set, unsigned manifests are rejected.
    pub public_key: Option<RsaPublicKey>,
    /// Binary to replace; empty means the running executable itself.
    pub target: PathBuf,
}

impl Default for Updater {
    fn default() -> Self {
        Self {
            current_version: String::new(),
            api_url: String::new(),
            bin_url: String::new(),
            diff_url: String::new(),
            cmd_name: String::new(),
            dir: String::new(),
            force_check: false,
            check_time: 0,
            randomize_time: 0,
            requester: Box::new(HttpRequester::new()),
            public_key: None,
            target: PathBuf::new(),
        }
    }
}

impl Updater {
    /// Run one check-and-apply cycle.
    ///
    /// Ensures the state directory exists, returns the no-update sentinel
    /// when the cooldown has not elapsed, and otherwise probes
    /// writability, advances the cooldown, and runs [`update`](Self::update).
    ///
    /// The cooldown is advanced *before* the network work, so a failed
    /// update does not turn into a hot retry loop on the next invocation.
    pub async fn background_run(&self) -> Result<Info> {
        let state_dir = self.state_dir()?;
        tokio::fs::create_dir_all(&state_dir)
            .await
            .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;

        if !self.want_update() {
            return Ok(Info::default());
        }

        replace::can_update(&self.target_path()?)?;
        let _ = self.set_update_time();
        self.update().await
    }

    /// Whether a check is currently desired.
    ///
    /// Always `false` for `"dev"` builds; otherwise `force_check` wins,
    /// else the cooldown decides.
    pub fn want_update(&self) -> bool {
        if self.current_version == DEV_VERSION {
            return false;
        }
        if self.force_check {
            return true;
        }
        self.next_update() <= Utc::now()
    }

    /// The next instant a check is permitted, per the cooldown file.
    pub fn next_update(&self) -> DateTime<Utc> {
        match self.check_time_path() {
            Ok(path) => schedule::read_time(&path),
            // Same policy as a broken state file: back off, never panic.
            Err(_) => Utc::now() + chrono::Duration::hours(1000),
        }
    }

    /// Advance the cooldown to `now + check_time + rand(0..=randomize_time)`
    /// hours. Returns whether the state file was written.
    pub fn set_update_time(&self) -> bool {
        let Ok(path) = self.check_time_path() else {
            return false;
        };
        let wait = chrono::Duration::hours(i64::from(self.check_time));
        let jitter =
            chrono::Duration::hours(i64::from(rand::thread_rng().gen_range(0..=self.randomize_time)));
        schedule::write_time(&path, Utc::now() + wait + jitter)
    }

    /// Delete the cooldown file, making the next check due immediately.
    pub fn clear_update_state(&self) {
        if let Ok(path) = self.check_time_path() {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Fetch the manifest and report the offered version, or `None` when it
    /// matches the running one.
    pub async fn update_available(&self) -> Result<Option<String>> {
        let target = self.target_path()?;
        let _old = File::open(&target)
            .with_context(|| format!("failed to open {}", target.display()))?;

        let info = self.fetch_info().await?;
        if info.version.is_empty() || info.version == self.current_version {
            Ok(None)
        } else {
            Ok(Some(info.version))
        }
    }

    /// Run the update state machine: fetch the manifest, try the delta,
    /// fall back to the full download, verify, swap.
    ///
    /// A hash mismatch on the patched candidate falls back to the full
    /// download; a signature mismatch is fatal at whichever stage detects
    /// it, distinguishing corrupt transport from a wrong key.
    pub async fn update(&self) -> Result<Info> {
        let target = self.target_path()?;
        let mut old = File::open(&target)
            .with_context(|| format!("failed to open {}", target.display()))?;

        let info = self.fetch_info().await?;
        if info.version.is_empty() || info.version == self.current_version {
            return Ok(Info::default());
        }
        if self.public_key.is_some() && info.signature.is_none() {
            return Err(UpdateError::MissingSignature.into());
        }

        let mut bin = None;
        if !self.diff_url.is_empty() {
            match self.fetch_and_verify_patch(&info, &mut old).await {
                Ok(patched) => bin = Some(patched),
                Err(err) => match err.downcast_ref::<UpdateError>() {
                    Some(UpdateError::SignatureMismatch) => return Err(err),
                    Some(UpdateError::HashMismatch) => {
                        warn!("update: hash mismatch from patched binary");
                    }
                    _ => warn!("update: error patching binary, {err:#}"),
                },
            }
        }

        let bin = match bin {
            Some(bin) => bin,
            None => match self.fetch_and_verify_full_bin(&info).await {
                Ok(bin) => bin,
                Err(err) => {
                    match err.downcast_ref::<UpdateError>() {
                        Some(UpdateError::HashMismatch) => {
                            warn!("update: hash mismatch from full binary");
                        }
                        _ => warn!("update: error fetching full binary, {err:#}"),
                    }
                    return Err(err);
                }
            },
        };

        // Release the handle before the swap; some platforms refuse to
        // rename a file that is still open.
        drop(old);

        replace::apply(&target, &bin)?;
        Ok(info)
    }

    async fn fetch_info(&self) -> Result<Info> {
        let url = format!(
            "{}{}/{}.json",
            self.api_url,
            escape(&self.cmd_name),
            escape(&platform::native()),
        );
        let body = self.requester.fetch(&url).await?;
        manifest::decode(&body)
    }

    async fn fetch_and_verify_patch(&self, info: &Info, old: &mut File) -> Result<Vec<u8>> {
        let mut old_bytes = Vec::new();
        old.read_to_end(&mut old_bytes)
            .context("failed to read current binary")?;

        let url = format!(
            "{}{}/{}/{}/{}",
            self.diff_url,
            escape(&self.cmd_name),
            escape(&self.current_version),
            escape(&info.version),
            escape(&platform::native()),
        );
        let patch = self.requester.fetch(&url).await?;
        let bin = delta::patch(&old_bytes, &patch)?;
        self.verify(bin, info)
    }

    async fn fetch_and_verify_full_bin(&self, info: &Info) -> Result<Vec<u8>> {
        let url = format!(
            "{}{}/{}/{}.gz",
            self.bin_url,
            escape(&self.cmd_name),
            escape(&info.version),
            escape(&platform::native()),
        );
        let gz = self.requester.fetch(&url).await?;
        let bin = compress::gzip_decompress(&gz[..])?;
        self.verify(bin, info)
    }

    fn verify(&self, bin: Vec<u8>, info: &Info) -> Result<Vec<u8>> {
        if !crypto::verify_sha256(&bin, &info.sha256) {
            return Err(UpdateError::HashMismatch.into());
        }
        if !crypto::verify_signature(self.public_key.as_ref(), &bin, info.signature.as_deref()) {
            return Err(UpdateError::SignatureMismatch.into());
        }
        Ok(bin)
    }

    fn target_path(&self) -> Result<PathBuf> {
        if self.target.as_os_str().is_empty() {
            std::env::current_exe().context("failed to resolve the running executable")
        } else {
            Ok(self.target.clone())
        }
    }

    fn state_dir(&self) -> Result<PathBuf> {
        let target = self.target_path()?;
        let dir = target
            .parent()
            .ok_or_else(|| anyhow::anyhow!("target {} has no parent directory", target.display()))?;
        Ok(dir.join(&self.dir))
    }

    fn check_time_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join(CHECK_TIME_FILE))
    }
}

// Go-style query escaping: everything outside [A-Za-z0-9-_.~] is
// percent-encoded, space becomes `+`. Versions and command names are
// opaque identifiers on the wire, so `+` must travel as `%2B`.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn escape(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ESCAPE)
        .to_string()
        .replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn updater_in(dir: &TempDir) -> Updater {
        let target = dir.path().join("myapp");
        std::fs::write(&target, b"binary").unwrap();
        Updater {
            current_version: "1.2".to_string(),
            dir: "update/".to_string(),
            target,
            ..Updater::default()
        }
    }

    #[test]
    fn escape_is_query_form() {
        assert_eq!(escape("myapp+foo"), "myapp%2Bfoo");
        assert_eq!(escape("1.2+foobar"), "1.2%2Bfoobar");
        assert_eq!(escape("linux-amd64"), "linux-amd64");
        assert_eq!(escape("a b"), "a+b");
        assert_eq!(escape("a/b"), "a%2Fb");
    }

    #[test]
    fn dev_build_never_wants_an_update() {
        let dir = TempDir::new().unwrap();
        let mut updater = updater_in(&dir);
        updater.current_version = "dev".to_string();
        assert!(!updater.want_update());
        updater.force_check = true;
        assert!(!updater.want_update());
    }

    #[test]
    fn missing_cooldown_means_due_and_force_check_overrides() {
        let dir = TempDir::new().unwrap();
        let mut updater = updater_in(&dir);
        std::fs::create_dir_all(dir.path().join("update")).unwrap();
        assert!(updater.want_update());

        updater.check_time = 100;
        assert!(updater.set_update_time());
        assert!(!updater.want_update());

        updater.force_check = true;
        assert!(updater.want_update());
    }

    #[test]
    fn cooldown_lands_in_the_inclusive_jitter_window() {
        let dir = TempDir::new().unwrap();
        let mut updater = updater_in(&dir);
        std::fs::create_dir_all(dir.path().join("update")).unwrap();
        updater.check_time = 100;
        updater.randomize_time = 100;

        let before = Utc::now();
        assert!(updater.set_update_time());
        let next = updater.next_update();
        let after = Utc::now();

        assert!(next >= before + chrono::Duration::hours(100) - chrono::Duration::seconds(1));
        assert!(next <= after + chrono::Duration::hours(200));
    }

    #[test]
    fn zero_jitter_is_exact() {
        let dir = TempDir::new().unwrap();
        let mut updater = updater_in(&dir);
        std::fs::create_dir_all(dir.path().join("update")).unwrap();
        updater.check_time = 1;
        updater.randomize_time = 0;

        assert!(updater.set_update_time());
        let next = updater.next_update();
        let expected = Utc::now() + chrono::Duration::hours(1);
        assert!((next - expected).num_seconds().abs() <= 2);
    }

    #[test]
    fn clear_update_state_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let updater = updater_in(&dir);
        std::fs::create_dir_all(dir.path().join("update")).unwrap();
        assert!(updater.set_update_time());
        assert!(dir.path().join("update/cktime").exists());
        updater.clear_update_state();
        assert!(!dir.path().join("update/cktime").exists());
    }
}
