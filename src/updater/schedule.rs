//! The persistent cooldown file.
//!
//! `cktime` holds a single RFC3339 timestamp: the earliest instant at
//! which the next update check is permitted. The read path never blocks an
//! update permanently: a missing file means "due now", while a broken one
//! backs off far into the future instead of hot-looping on the error.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const BROKEN_STATE_BACKOFF_HOURS: i64 = 1000;

/// Read the next permitted check time from `path`.
///
/// Missing file: the zero instant (a check is due immediately). Unreadable
/// or unparseable: `now + 1000h`.
pub fn read_time(path: &Path) -> DateTime<Utc> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return DateTime::<Utc>::UNIX_EPOCH,
        Err(err) => {
            debug!(path = %path.display(), %err, "unreadable check-time file, backing off");
            return far_future();
        }
    };
    match DateTime::parse_from_rfc3339(contents.trim()) {
        Ok(t) => t.with_timezone(&Utc),
        Err(err) => {
            debug!(path = %path.display(), %err, "unparseable check-time file, backing off");
            far_future()
        }
    }
}

/// Write `t` to `path` as RFC3339; returns whether the write succeeded.
pub fn write_time(path: &Path, t: DateTime<Utc>) -> bool {
    fs::write(path, t.to_rfc3339_opts(SecondsFormat::Secs, true)).is_ok()
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(BROKEN_STATE_BACKOFF_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_due_immediately() {
        let dir = TempDir::new().unwrap();
        let t = read_time(&dir.path().join("cktime"));
        assert!(t < Utc::now());
        assert_eq!(t, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn round_trip_preserves_the_instant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cktime");
        let t = Utc::now() + chrono::Duration::hours(42);
        assert!(write_time(&path, t));

        let back = read_time(&path);
        // Seconds precision on disk.
        assert_eq!(back.timestamp(), t.timestamp());
    }

    #[test]
    fn garbage_content_backs_off_far_into_the_future() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cktime");
        fs::write(&path, "not a timestamp").unwrap();

        let t = read_time(&path);
        assert!(t > Utc::now() + chrono::Duration::hours(999));
    }

    #[test]
    fn no_trailing_newline_required() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cktime");
        fs::write(&path, "2031-01-02T03:04:05Z\n").unwrap();
        let expected = DateTime::parse_from_rfc3339("2031-01-02T03:04:05Z").unwrap();
        assert_eq!(read_time(&path), expected.with_timezone(&Utc));
    }
}
