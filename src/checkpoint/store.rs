//! Checkpoint persistence for resumable trial-factoring runs.
//!
//! Epistemic foundation:
//! - K_i: A write lands in the staging file first and is promoted by rename
//! - K_i: The previous primary survives as the backup
//! - B_i: Checkpoint file may not exist → None
//! - B_i: Checkpoint content may be corrupt → quarantine, promote backup, retry once
//! - I^B: Crash between the two renames → primary missing, backup intact
//!
//! File set for exponent `E`, all inside the store directory:
//!
//! ```text
//! M{E}.ckp             primary
//! M{E}.ckp.bu          backup (previous primary)
//! M{E}.ckp.write       staging (write target)
//! M{E}.ckp.bad-{CRC}   quarantined primary, one per distinct bad content
//! ```

use super::line::{checksum, CheckpointLine, MAX_LINE_LEN};
use crate::models::{CheckpointRecord, Config, ResumeError, Result, RunParams};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Primary plus one promoted backup.
pub const MAX_READ_ATTEMPTS: usize = 2;

/// Paths of one job's checkpoint files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointFiles {
    dir: PathBuf,
    exponent: u32,
    pub primary: PathBuf,
    pub backup: PathBuf,
    pub staging: PathBuf,
}

impl CheckpointFiles {
    pub fn new(dir: &Path, exponent: u32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            exponent,
            primary: dir.join(format!("M{exponent}.ckp")),
            backup: dir.join(format!("M{exponent}.ckp.bu")),
            staging: dir.join(format!("M{exponent}.ckp.write")),
        }
    }

    /// Quarantine path for content with the given checksum.
    pub fn quarantine(&self, content_checksum: u32) -> PathBuf {
        self.dir
            .join(format!("M{}.ckp.bad-{content_checksum:08X}", self.exponent))
    }

    fn quarantine_pattern(&self) -> String {
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        format!("{dir}/M{}.ckp.bad-*", self.exponent)
    }
}

/// Reads, writes and deletes checkpoints in one directory.
///
/// Never fails towards the caller: every problem is logged and turned into
/// "no checkpoint" or "write skipped".
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Directory for checkpoint files
    dir: PathBuf,
    /// 0 silent, 1 informational, 2+ verbose
    verbosity: u8,
}

impl CheckpointStore {
    pub fn new(dir: &Path, verbosity: u8) -> Self {
        Self {
            dir: dir.to_path_buf(),
            verbosity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.checkpoint_dir(), config.verbosity)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self, exponent: u32) -> CheckpointFiles {
        CheckpointFiles::new(&self.dir, exponent)
    }

    /// Check if a primary checkpoint exists.
    pub fn exists(&self, exponent: u32) -> bool {
        self.files(exponent).primary.exists()
    }

    /// Write a checkpoint; returns whether it became the new primary.
    ///
    /// On failure the existing primary and backup are left as they were,
    /// unless the final staging → primary rename fails, in which case only
    /// the backup remains.
    pub fn write(&self, record: &CheckpointRecord) -> bool {
        match self.try_write(record) {
            Ok(()) => {
                debug!(
                    exponent = record.exponent,
                    class = record.current_class,
                    "Checkpoint saved"
                );
                true
            }
            Err(e) => {
                warn!(exponent = record.exponent, error = %e, "Checkpoint not written");
                false
            }
        }
    }

    fn try_write(&self, record: &CheckpointRecord) -> Result<()> {
        record.validate()?;
        let line = CheckpointLine::from_record(record)?;
        let files = self.files(record.exponent);

        fs::create_dir_all(&self.dir)
            .map_err(|e| ResumeError::io("creating checkpoint dir", &self.dir, e))?;
        Self::write_staging(&files.staging, line.to_file_contents().as_bytes())?;
        Self::rotate(&files)
    }

    fn write_staging(path: &Path, contents: &[u8]) -> Result<()> {
        let mut file =
            File::create(path).map_err(|e| ResumeError::io("creating staging checkpoint", path, e))?;
        file.write_all(contents)
            .map_err(|e| ResumeError::io("writing staging checkpoint", path, e))?;
        file.sync_all()
            .map_err(|e| ResumeError::io("syncing staging checkpoint", path, e))
    }

    /// backup → gone, primary → backup, staging → primary.
    ///
    /// Not atomic as a whole; only the last rename is reported.
    fn rotate(files: &CheckpointFiles) -> Result<()> {
        // may not exist yet
        let _ = fs::remove_file(&files.backup);
        let _ = fs::rename(&files.primary, &files.backup);

        fs::rename(&files.staging, &files.primary)
            .map_err(|e| ResumeError::io("promoting staging checkpoint", &files.primary, e))
    }

    /// Load the checkpoint for `expected`, recovering from the backup if needed.
    ///
    /// Returns `None` for a fresh start: no checkpoint, an unreadable one, or
    /// one that failed validation with no usable backup behind it.
    pub fn read(&self, expected: &RunParams) -> Option<CheckpointRecord> {
        let files = self.files(expected.exponent);

        for attempt in 1..=MAX_READ_ATTEMPTS {
            let content = match self.read_primary(&files) {
                Ok(Some(content)) => content,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Cannot open checkpoint");
                    return None;
                }
            };

            match CheckpointLine::parse(&content, expected) {
                Ok(record) => {
                    if self.verbosity > 0 {
                        info!(
                            exponent = record.exponent,
                            class = record.current_class,
                            factors = record.num_factors,
                            "Resuming from checkpoint"
                        );
                    }
                    return Some(record);
                }
                Err(e) => {
                    if self.verbosity > 0 {
                        warn!(
                            path = %files.primary.display(),
                            error = %e,
                            content = %String::from_utf8_lossy(&content).trim_end(),
                            "Cannot use checkpoint file"
                        );
                    }
                    self.quarantine(&files, &content);
                    if attempt == MAX_READ_ATTEMPTS || !self.promote_backup(&files) {
                        return None;
                    }
                }
            }
        }

        None
    }

    fn read_primary(&self, files: &CheckpointFiles) -> Result<Option<Vec<u8>>> {
        let file = match File::open(&files.primary) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.verbosity > 1 {
                    info!(path = %files.primary.display(), "No checkpoint file found");
                }
                return Ok(None);
            }
            Err(e) => return Err(ResumeError::io("opening checkpoint", &files.primary, e)),
        };

        let mut content = Vec::with_capacity(MAX_LINE_LEN);
        file.take(MAX_LINE_LEN as u64)
            .read_to_end(&mut content)
            .map_err(|e| ResumeError::io("reading checkpoint", &files.primary, e))?;
        Ok(Some(content))
    }

    /// Move a rejected primary aside; identical bad content maps to the same name.
    fn quarantine(&self, files: &CheckpointFiles, content: &[u8]) {
        let target = files.quarantine(checksum(content));
        match fs::rename(&files.primary, &target) {
            Ok(()) => {
                if self.verbosity > 0 {
                    info!(
                        from = %files.primary.display(),
                        to = %target.display(),
                        "Renamed bad checkpoint file"
                    );
                }
            }
            Err(e) => debug!(path = %files.primary.display(), error = %e, "Quarantine rename failed"),
        }
    }

    fn promote_backup(&self, files: &CheckpointFiles) -> bool {
        match fs::rename(&files.backup, &files.primary) {
            Ok(()) => {
                if self.verbosity > 1 {
                    info!(
                        from = %files.backup.display(),
                        to = %files.primary.display(),
                        "Renamed backup file, trying to load it"
                    );
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Remove primary, backup and staging files of a finished job.
    ///
    /// Quarantined files are kept.
    pub fn delete(&self, exponent: u32) {
        let files = self.files(exponent);
        for path in [&files.primary, &files.backup, &files.staging] {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed checkpoint file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot remove checkpoint file"),
            }
        }
    }

    /// Quarantined checkpoint files of a job, sorted by name.
    pub fn quarantined(&self, exponent: u32) -> Result<Vec<PathBuf>> {
        let pattern = self.files(exponent).quarantine_pattern();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| ResumeError::corrupt(format!("Invalid glob pattern: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Int96;
    use tempfile::TempDir;

    const EXPONENT: u32 = 66_362_159;

    fn params() -> RunParams {
        RunParams::new(EXPONENT, 60, 64, 4620)
    }

    fn record(class: i64, elapsed_ms: u64) -> CheckpointRecord {
        let mut record = CheckpointRecord::new(params(), "tfresume-test");
        record.current_class = class;
        record.elapsed_ms = elapsed_ms;
        record
    }

    fn setup() -> (TempDir, CheckpointStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 2);
        (temp_dir, store)
    }

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_read_without_files() {
        let (temp_dir, store) = setup();
        assert!(store.read(&params()).is_none());
        assert_eq!(dir_entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_write_then_read() {
        let (_temp_dir, store) = setup();
        let mut saved = record(1234, 3_600_000);
        saved.record_factor(Int96::from(906_748_141_857u64)).unwrap();
        saved
            .record_factor(Int96::decode("1234567890123456789012345"))
            .unwrap();
        saved.record_factor(Int96::from(132_724_319u64)).unwrap();

        assert!(store.write(&saved));
        assert!(store.exists(EXPONENT));

        let loaded = store.read(&params()).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(
            loaded.factors.to_field(),
            "906748141857,1234567890123456789012345,132724319"
        );
    }

    #[test]
    fn test_write_rotates_primary_to_backup() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);

        assert!(store.write(&record(5, 1000)));
        assert!(!files.backup.exists());
        let first = fs::read_to_string(&files.primary).unwrap();

        assert!(store.write(&record(9, 2000)));
        assert_eq!(fs::read_to_string(&files.backup).unwrap(), first);
        assert!(!files.staging.exists());
        assert_eq!(store.read(&params()).unwrap().current_class, 9);
    }

    #[test]
    fn test_write_no_factors_uses_sentinel() {
        let (_temp_dir, store) = setup();
        assert!(store.write(&record(0, 0)));
        let content = fs::read_to_string(store.files(EXPONENT).primary).unwrap();
        assert!(content.starts_with("66362159 60 64 4620 tfresume-test: 0 0 0 0 "));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_write_rejects_invalid_record() {
        let (temp_dir, store) = setup();
        let mut bad = record(3, 10);
        bad.num_factors = 1;
        assert!(!store.write(&bad));
        assert!(!store.write(&record(-1, 10)));
        assert_eq!(dir_entries(temp_dir.path()), 0);
    }

    #[test]
    fn test_failed_staging_keeps_existing_files() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        assert!(store.write(&record(6, 1100)));
        let primary = fs::read_to_string(&files.primary).unwrap();
        let backup = fs::read_to_string(&files.backup).unwrap();

        // a directory in the way makes the staging file impossible to create
        fs::create_dir(&files.staging).unwrap();
        assert!(!store.write(&record(7, 1200)));

        assert_eq!(fs::read_to_string(&files.primary).unwrap(), primary);
        assert_eq!(fs::read_to_string(&files.backup).unwrap(), backup);
    }

    #[test]
    fn test_header_mismatch_is_rejected() {
        let (_temp_dir, store) = setup();
        assert!(store.write(&record(5, 1000)));

        let other = RunParams::new(EXPONENT, 61, 64, 4620);
        assert!(store.read(&other).is_none());
        assert_eq!(store.quarantined(EXPONENT).unwrap().len(), 1);
    }

    #[test]
    fn test_class_count_mismatch_is_rejected() {
        let (_temp_dir, store) = setup();
        assert!(store.write(&record(5, 1000)));
        assert!(store.read(&RunParams::new(EXPONENT, 60, 64, 420)).is_none());
    }

    #[test]
    fn test_corrupt_primary_recovers_backup() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        assert!(store.write(&record(9, 2000)));

        let content = fs::read_to_string(&files.primary).unwrap();
        fs::write(&files.primary, content.replace(": 9 ", ": 8 ")).unwrap();

        let loaded = store.read(&params()).unwrap();
        assert_eq!(loaded, record(5, 1000));

        let quarantined = store.quarantined(EXPONENT).unwrap();
        assert_eq!(quarantined.len(), 1);
        assert!(quarantined[0]
            .to_string_lossy()
            .contains("M66362159.ckp.bad-"));
        assert!(!files.backup.exists());
        assert!(files.primary.exists());
    }

    #[test]
    fn test_corrupt_primary_without_backup() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        fs::write(&files.primary, "garbage\n").unwrap();

        assert!(store.read(&params()).is_none());
        assert!(!files.primary.exists());
        assert_eq!(
            store.quarantined(EXPONENT).unwrap(),
            vec![files.quarantine(checksum(b"garbage\n"))]
        );
    }

    #[test]
    fn test_corrupt_primary_and_backup() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        assert!(store.write(&record(9, 2000)));
        fs::write(&files.primary, "bad primary\n").unwrap();
        fs::write(&files.backup, "bad backup\n").unwrap();

        assert!(store.read(&params()).is_none());
        assert_eq!(store.quarantined(EXPONENT).unwrap().len(), 2);
        assert!(!files.primary.exists());
        assert!(!files.backup.exists());
    }

    #[test]
    fn test_same_bad_content_shares_quarantine_name() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        for _ in 0..2 {
            fs::write(&files.primary, "bad\n").unwrap();
            assert!(store.read(&params()).is_none());
        }
        assert_eq!(store.quarantined(EXPONENT).unwrap().len(), 1);
    }

    #[test]
    fn test_resumed_record_can_be_written_back() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        let line = CheckpointLine::from_parts(&params(), "v", 7, 2, "x,132724319", 500);
        fs::write(&files.primary, line.to_file_contents()).unwrap();

        let mut resumed = store.read(&params()).unwrap();
        assert_eq!(resumed.factors.to_field(), "132724319");
        resumed.current_class = 8;
        assert!(store.write(&resumed));
        assert_eq!(store.read(&params()).unwrap(), resumed);
    }

    #[test]
    fn test_factor_field_without_factors_is_rejected() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        let line = CheckpointLine::from_parts(&params(), "v", 7, 2, "x,-", 500);
        fs::write(&files.primary, line.to_file_contents()).unwrap();

        assert!(store.read(&params()).is_none());
        assert_eq!(store.quarantined(EXPONENT).unwrap().len(), 1);
    }

    #[test]
    fn test_crlf_checkpoint_is_accepted() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(42, 5000)));
        let content = fs::read_to_string(&files.primary).unwrap();
        fs::write(&files.primary, content.replace('\n', "\r\n")).unwrap();

        assert_eq!(store.read(&params()).unwrap().current_class, 42);
    }

    #[test]
    fn test_read_does_not_touch_backup_when_primary_missing() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        assert!(store.write(&record(6, 1000)));
        fs::remove_file(&files.primary).unwrap();

        assert!(store.read(&params()).is_none());
        assert!(files.backup.exists());
    }

    #[test]
    fn test_delete_removes_job_files() {
        let (_temp_dir, store) = setup();
        let files = store.files(EXPONENT);
        assert!(store.write(&record(5, 1000)));
        assert!(store.write(&record(6, 1000)));
        fs::write(&files.staging, "leftover").unwrap();
        fs::write(files.quarantine(0xDEAD_BEEF), "bad").unwrap();

        store.delete(EXPONENT);
        assert!(!files.primary.exists());
        assert!(!files.backup.exists());
        assert!(!files.staging.exists());
        assert_eq!(store.quarantined(EXPONENT).unwrap().len(), 1);

        // nothing left to delete is fine
        store.delete(EXPONENT);
    }

    #[test]
    fn test_file_names() {
        let files = CheckpointFiles::new(Path::new("ckp"), 1277);
        assert_eq!(files.primary, Path::new("ckp/M1277.ckp"));
        assert_eq!(files.backup, Path::new("ckp/M1277.ckp.bu"));
        assert_eq!(files.staging, Path::new("ckp/M1277.ckp.write"));
        assert_eq!(files.quarantine(0xAB), Path::new("ckp/M1277.ckp.bad-000000AB"));
    }
}
