//! Ledger persistence: an append-only JSON Lines file, one completed unit per
//! line.
//!
//! Every append is flushed to disk before it is visible in memory, so a unit
//! is either recorded durably or not at all. A torn final line left by a
//! crash is skipped on load; a file that cannot be read at all is moved aside
//! and the ledger starts empty.

use super::types::{ProgressRecord, UnitKey};
use crate::error::{PipelineError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the ledger inside the output directory.
pub const LEDGER_FILE_NAME: &str = ".pdf-speech-ledger.jsonl";

/// In-memory view of the ledger file.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    records: Vec<ProgressRecord>,
    index: HashSet<UnitKey>,
    /// File ends without a newline; the next append starts a fresh line
    needs_newline: bool,
}

impl ProgressLedger {
    /// Ledger file location for an output directory.
    pub fn path_in(output_dir: &Path) -> PathBuf {
        output_dir.join(LEDGER_FILE_NAME)
    }

    /// Create an empty ledger backed by `path`. Nothing is written until the
    /// first record.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            index: HashSet::new(),
            needs_newline: false,
        }
    }

    /// Load the ledger, degrading to an empty one when it is unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(ledger) => {
                log::debug!(
                    "Loaded {} completed unit(s) from {}",
                    ledger.len(),
                    path.display()
                );
                ledger
            }
            Err(err) => {
                log::warn!("{}; starting with an empty ledger", err);
                match quarantine(&path) {
                    Ok(Some(moved)) => log::warn!("Moved unreadable ledger to {}", moved.display()),
                    Ok(None) => {}
                    Err(e) => log::warn!("Could not move unreadable ledger aside: {}", e),
                }
                Self::empty(path)
            }
        }
    }

    /// Load the ledger, reporting `LedgerCorrupt` when the file exists but
    /// holds no usable records.
    pub fn try_load(path: &Path) -> Result<Self> {
        let corrupt = |reason: String| PipelineError::LedgerCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(e) => return Err(corrupt(e.to_string())),
        };
        let content = String::from_utf8(bytes).map_err(|e| corrupt(e.to_string()))?;

        let mut ledger = Self::empty(path);
        ledger.needs_newline = !content.is_empty() && !content.ends_with('\n');

        let mut malformed = 0;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProgressRecord>(line) {
                Ok(record) => ledger.insert(record),
                Err(e) => {
                    malformed += 1;
                    log::warn!(
                        "{}:{}: ignoring malformed ledger line: {}",
                        path.display(),
                        line_no + 1,
                        e
                    );
                }
            }
        }

        if malformed > 0 && ledger.records.is_empty() {
            return Err(corrupt(format!("{} malformed line(s), no valid records", malformed)));
        }

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every completed (document, ordinal) pair.
    pub fn completed_units(&self) -> &HashSet<UnitKey> {
        &self.index
    }

    /// True iff a record exists for exactly this unit.
    pub fn is_complete(&self, document_id: &str, ordinal: usize) -> bool {
        self.index.contains(&UnitKey::new(document_id, ordinal))
    }

    /// Records belonging to one document.
    pub fn records_for<'a>(
        &'a self,
        document_id: &'a str,
    ) -> impl Iterator<Item = &'a ProgressRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.document_id == document_id)
    }

    /// Durably record a completed unit.
    pub fn record_complete(
        &mut self,
        document_id: &str,
        ordinal: usize,
        artifact: &Path,
    ) -> Result<()> {
        self.append(ProgressRecord::new(document_id, ordinal, "", artifact))
    }

    /// Append a record and flush it to disk before returning. On error the
    /// unit is not considered complete.
    pub fn append(&mut self, record: ProgressRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record).map_err(io::Error::other)?;
        line.push('\n');
        if self.needs_newline {
            line.insert(0, '\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.write_line(&mut file, line.as_bytes(), |f| f.sync_data())?;

        self.insert(record);
        Ok(())
    }

    /// Write one line and sync it. A failure may leave part of the line in
    /// the file, so the next append starts on a fresh line.
    fn write_line<W: Write>(
        &mut self,
        out: &mut W,
        line: &[u8],
        sync: impl FnOnce(&mut W) -> io::Result<()>,
    ) -> io::Result<()> {
        let result = out.write_all(line).and_then(|_| sync(out));
        self.needs_newline = result.is_err();
        result
    }

    /// Remove every record of a document, rewriting the file atomically.
    ///
    /// Returns the number of records removed.
    pub fn forget_document(&mut self, document_id: &str) -> Result<usize> {
        let kept: Vec<ProgressRecord> = self
            .records
            .iter()
            .filter(|r| r.document_id != document_id)
            .cloned()
            .collect();
        let removed = self.records.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        self.rewrite(&kept)?;

        self.index = kept.iter().map(ProgressRecord::key).collect();
        self.records = kept;
        self.needs_newline = false;
        Ok(removed)
    }

    fn insert(&mut self, record: ProgressRecord) {
        if self.index.insert(record.key()) {
            self.records.push(record);
        } else if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.document_id == record.document_id && r.ordinal == record.ordinal)
        {
            // Later lines win
            *existing = record;
        }
    }

    fn rewrite(&self, records: &[ProgressRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        for record in records {
            serde_json::to_writer(&mut tmp, record).map_err(io::Error::other)?;
            tmp.write_all(b"\n")?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Move an unreadable ledger out of the way so new appends start clean.
fn quarantine(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", timestamp));
    let target = PathBuf::from(name);
    fs::rename(path, &target)?;
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_path(dir: &TempDir) -> PathBuf {
        ProgressLedger::path_in(dir.path())
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = ProgressLedger::load(ledger_path(&dir));
        assert!(ledger.is_empty());
        assert!(!ledger_path(&dir).exists());
    }

    #[test]
    fn test_record_and_query() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ProgressLedger::load(ledger_path(&dir));

        ledger
            .record_complete("d", 3, Path::new("/out/d_segment_4.mp3"))
            .unwrap();

        assert!(ledger.is_complete("d", 3));
        assert!(!ledger.is_complete("d", 4));
        assert!(!ledger.is_complete("other", 3));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_record_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        {
            let mut ledger = ProgressLedger::load(&path);
            ledger.record_complete("d", 0, Path::new("a.mp3")).unwrap();
            ledger.record_complete("d", 1, Path::new("b.mp3")).unwrap();
            // Dropped without any close or flush call
        }

        let reloaded = ProgressLedger::load(&path);
        assert!(reloaded.is_complete("d", 0));
        assert!(reloaded.is_complete("d", 1));
        assert_eq!(
            reloaded.completed_units(),
            &HashSet::from([UnitKey::new("d", 0), UnitKey::new("d", 1)])
        );
    }

    #[test]
    fn test_file_is_one_line_per_unit() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = ProgressLedger::load(&path);
        ledger
            .append(ProgressRecord::new("d", 0, "Chapter 1", "d_segment_1.ogg"))
            .unwrap();
        ledger
            .append(ProgressRecord::new("d", 1, "Chapter 2", "d_segment_2.ogg"))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Chapter 1"));
        assert!(lines[1].contains("d_segment_2.ogg"));
    }

    #[test]
    fn test_torn_last_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        {
            let mut ledger = ProgressLedger::load(&path);
            ledger.record_complete("d", 0, Path::new("a.mp3")).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"document_id":"d","ordi"#).unwrap();
        drop(file);

        let mut ledger = ProgressLedger::load(&path);
        assert!(ledger.is_complete("d", 0));
        assert_eq!(ledger.len(), 1);

        ledger.record_complete("d", 1, Path::new("b.mp3")).unwrap();
        let reloaded = ProgressLedger::load(&path);
        assert!(reloaded.is_complete("d", 0));
        assert!(reloaded.is_complete("d", 1));
    }

    /// Accepts `budget` bytes, then fails like a full disk.
    struct FillingDisk {
        file: fs::File,
        budget: usize,
    }

    impl Write for FillingDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.budget);
            if n == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            self.budget -= n;
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    #[test]
    fn test_failed_write_does_not_swallow_next_record() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = ProgressLedger::load(&path);
        ledger.record_complete("d", 0, Path::new("a.mp3")).unwrap();

        let line = serde_json::to_string(&ProgressRecord::new("d", 5, "", "f.mp3")).unwrap();
        let mut disk = FillingDisk {
            file: OpenOptions::new().append(true).open(&path).unwrap(),
            budget: 20,
        };
        assert!(ledger
            .write_line(&mut disk, format!("{line}\n").as_bytes(), |_| Ok(()))
            .is_err());
        assert!(!fs::read_to_string(&path).unwrap().ends_with('\n'));

        ledger.record_complete("d", 1, Path::new("b.mp3")).unwrap();

        let reloaded = ProgressLedger::load(&path);
        assert!(reloaded.is_complete("d", 0));
        assert!(reloaded.is_complete("d", 1));
        assert!(!reloaded.is_complete("d", 5));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_garbage_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        fs::write(&path, "this is not json\nneither is this\n").unwrap();

        assert!(matches!(
            ProgressLedger::try_load(&path),
            Err(PipelineError::LedgerCorrupt { .. })
        ));

        let mut ledger = ProgressLedger::load(&path);
        assert!(ledger.is_empty());
        assert!(!path.exists(), "corrupt ledger should be moved aside");

        ledger.record_complete("d", 0, Path::new("a.mp3")).unwrap();
        assert!(ProgressLedger::load(&path).is_complete("d", 0));
    }

    #[test]
    fn test_invalid_utf8_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let ledger = ProgressLedger::load(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_forget_document() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = ProgressLedger::load(&path);
        ledger.record_complete("a", 0, Path::new("a1.mp3")).unwrap();
        ledger.record_complete("b", 0, Path::new("b1.mp3")).unwrap();
        ledger.record_complete("a", 1, Path::new("a2.mp3")).unwrap();

        assert_eq!(ledger.forget_document("a").unwrap(), 2);
        assert!(!ledger.is_complete("a", 0));
        assert!(ledger.is_complete("b", 0));
        assert_eq!(ledger.forget_document("missing").unwrap(), 0);

        let reloaded = ProgressLedger::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.is_complete("b", 0));
        assert_eq!(reloaded.records_for("a").count(), 0);
    }

    #[test]
    fn test_duplicate_lines_later_wins() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = ProgressLedger::load(&path);
        ledger.record_complete("d", 0, Path::new("old.mp3")).unwrap();
        ledger.record_complete("d", 0, Path::new("new.mp3")).unwrap();

        let reloaded = ProgressLedger::load(&path);
        assert_eq!(reloaded.len(), 1);
        let record = reloaded.records_for("d").next().unwrap();
        assert_eq!(record.artifact, PathBuf::from("new.mp3"));
    }

    #[test]
    fn test_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(LEDGER_FILE_NAME);
        let mut ledger = ProgressLedger::load(&path);
        ledger.record_complete("d", 0, Path::new("a.mp3")).unwrap();
        assert!(path.exists());
    }
}
