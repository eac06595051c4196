//! Rename-based atomic self-replacement.
//!
//! On some operating systems an executing image cannot be overwritten in
//! place, but its directory entry can be replaced. The swap therefore
//! never writes into the target: the candidate lands in a uniquely-named
//! sibling, the target is renamed aside, and the candidate is renamed in.
//! Any failure leaves the user with either the old binary or the new one,
//! never neither and never a partial file.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Probe whether `target` is replaceable: create and remove a sibling file.
///
/// Catches permission problems before the scheduler is advanced and any
/// network work happens.
pub fn can_update(target: &Path) -> Result<()> {
    let probe = sibling(target, |name| format!(".{name}.new"))?;
    fs::File::create(&probe)
        .with_context(|| format!("cannot write next to {}", target.display()))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

/// Replace `target` with `candidate`, recovering the old binary on failure.
///
/// 1. Write `candidate` to a per-run unique sibling, executable bits
///    copied from the target.
/// 2. Rename the target to `<target>.old`.
/// 3. Rename the candidate to the target path.
/// 4. Best-effort delete of `<target>.old`; the OS may refuse to drop the
///    still-executing image, in which case the next run's step 2 replaces
///    the leftover.
///
/// If step 3 fails, `<target>.old` is renamed back. If that recovery also
/// fails, both errors are surfaced jointly.
pub fn apply(target: &Path, candidate: &[u8]) -> Result<()> {
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to resolve working directory")?
            .join(target)
    };
    let dir = target
        .parent()
        .ok_or_else(|| anyhow!("target {} has no parent directory", target.display()))?;
    let name = target
        .file_name()
        .ok_or_else(|| anyhow!("target {} has no file name", target.display()))?
        .to_string_lossy()
        .into_owned();

    let target_meta = fs::metadata(&target)
        .with_context(|| format!("failed to stat {}", target.display()))?;

    // Unique per run so a crashed attempt never collides with the next one.
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}-"))
        .suffix(".new")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create candidate next to {}", target.display()))?;
    tmp.write_all(candidate).context("failed to write candidate binary")?;
    tmp.as_file().sync_all().context("failed to sync candidate binary")?;

    #[cfg(unix)]
    {
        fs::set_permissions(tmp.path(), target_meta.permissions())
            .context("failed to set candidate permissions")?;
    }
    #[cfg(not(unix))]
    let _ = &target_meta;

    let (file, candidate_path) =
        tmp.keep().context("failed to persist candidate binary")?;
    // No handle may stay open across the renames.
    drop(file);

    let old_path = PathBuf::from(format!("{}.old", target.display()));
    // A leftover from a previous run whose delete was refused.
    let _ = fs::remove_file(&old_path);

    if let Err(err) = fs::rename(&target, &old_path) {
        let _ = fs::remove_file(&candidate_path);
        return Err(err)
            .with_context(|| format!("failed to move {} aside", target.display()));
    }

    match fs::rename(&candidate_path, &target) {
        Ok(()) => {
            if let Err(err) = fs::remove_file(&old_path) {
                // Expected on platforms that pin the executing image.
                debug!(path = %old_path.display(), %err, "could not remove previous binary");
            }
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&candidate_path);
            match fs::rename(&old_path, &target) {
                Ok(()) => {
                    warn!(target = %target.display(), %err, "swap failed, previous binary restored");
                    Err(err).with_context(|| {
                        format!("failed to install new binary at {}", target.display())
                    })
                }
                Err(recover_err) => bail!(
                    "update and recovery errors: {:?} {:?}",
                    err.to_string(),
                    recover_err.to_string()
                ),
            }
        }
    }
}

fn sibling(target: &Path, make: impl FnOnce(&str) -> String) -> Result<PathBuf> {
    let dir = target
        .parent()
        .ok_or_else(|| anyhow!("target {} has no parent directory", target.display()))?;
    let name = target
        .file_name()
        .ok_or_else(|| anyhow!("target {} has no file name", target.display()))?;
    Ok(dir.join(make(&name.to_string_lossy())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn apply_swaps_content_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app");
        fs::write(&target, b"old binary").unwrap();

        apply(&target, b"new binary").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new binary");
        // No .old, no stray candidate.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "app")
            .collect();
        assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
    }

    #[cfg(unix)]
    #[test]
    fn apply_preserves_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app");
        fs::write(&target, b"old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o751)).unwrap();

        apply(&target, b"new").unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);
    }

    #[test]
    fn apply_fails_cleanly_when_target_is_missing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app");
        assert!(apply(&target, b"new").is_err());
        assert!(!target.exists());
    }

    #[test]
    fn can_update_accepts_a_writable_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("app");
        fs::write(&target, b"bin").unwrap();
        can_update(&target).unwrap();
        // The probe file is gone again.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn can_update_rejects_a_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("gone").join("app");
        assert!(can_update(&target).is_err());
    }
}
