//! Size-scaled file retention.
//!
//! A pass walks one directory, computes each file's age in whole days and
//! deletes it once that age reaches the permitted age for its size. The key
//! store is never touched here: descriptors pointing at reaped files are
//! cleaned up lazily when they are next resolved.

use std::path::Path;

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub min_days: f64,
    pub max_days: f64,
    /// Non-admin size limit in bytes; the curve reaches `min_days` here.
    pub size_limit: u64,
}

/// Statistics from a retention pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapStats {
    pub scanned: u64,
    pub deleted: u64,
    pub failed: u64,
}

impl RetentionPolicy {
    /// Days a file of `size` bytes may live.
    ///
    /// `min + (min - max) * (size / limit - 1)^5`. Not clamped: files larger
    /// than the limit get less than `min_days`, eventually negative.
    pub fn permitted_age(&self, size: u64) -> f64 {
        let ratio = size as f64 / self.size_limit as f64;
        self.min_days + (self.min_days - self.max_days) * (ratio - 1.0).powi(5)
    }

    /// Delete every file directly under `root` that has outlived its permitted age.
    ///
    /// Per-file failures are logged and counted but never abort the pass.
    pub fn reap(&self, root: &Path, now: DateTime<Utc>) -> std::io::Result<ReapStats> {
        let mut stats = ReapStats::default();

        for entry in std::fs::read_dir(root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read directory entry");
                    stats.failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                // Removed by someone else mid-pass
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat file");
                    stats.failed += 1;
                    continue;
                }
            };
            stats.scanned += 1;

            let modified: DateTime<Utc> = match meta.modified() {
                Ok(modified) => modified.into(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "No modification time");
                    stats.failed += 1;
                    continue;
                }
            };
            let age_days = (now - modified).num_seconds().div_euclid(SECONDS_PER_DAY);
            let permitted = self.permitted_age(meta.len());

            if (age_days as f64) < permitted {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        age_days,
                        permitted_days = permitted,
                        size = meta.len(),
                        "Reaped expired file"
                    );
                    stats.deleted += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete expired file");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
