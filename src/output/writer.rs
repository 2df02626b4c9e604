//! Persistence sink: CSV lines and image files, written atomically per sample.
//!
//! A sample is either fully on disk (image in place and its CSV line flushed)
//! or not at all:
//! 1. image bytes go to `<name>.partial` and are synced
//! 2. the CSV line is written and flushed
//! 3. the `.partial` file is renamed into place
//!
//! If step 2 fails the `.partial` file is removed. A crash before step 2
//! leaves an unreferenced `.partial`, a crash between 2 and 3 a referenced
//! one. The next `open` deletes the former and completes the latter.

use crate::models::{Result, SampleData, SweepError};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PARTIAL_SUFFIX: &str = ".partial";

/// Exclusive owner of the CSV handle for the duration of a run.
pub struct SampleWriter {
    folder: PathBuf,
    csv_path: PathBuf,
    writer: Option<BufWriter<File>>,
    written_names: HashSet<String>,
    lines_written: u64,
}

impl SampleWriter {
    /// Open `folder/csv_file` for appending, creating both if needed.
    ///
    /// The header is written only when the file is new or empty.
    pub fn open(folder: &Path, csv_file: &str, header: &str) -> Result<Self> {
        fs::create_dir_all(folder).map_err(|e| SweepError::io("creating output folder", e))?;

        let csv_path = folder.join(csv_file);
        let recovered = Self::recover(folder, &csv_path)?;
        if recovered.completed > 0 || recovered.removed > 0 {
            warn!(
                completed = recovered.completed,
                removed = recovered.removed,
                "Recovered partial images from an interrupted run"
            );
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .map_err(|e| SweepError::io("opening csv file", e))?;
        let is_new = file
            .metadata()
            .map_err(|e| SweepError::io("reading csv metadata", e))?
            .len()
            == 0;

        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{header}").map_err(|e| SweepError::io("writing csv header", e))?;
            writer
                .flush()
                .map_err(|e| SweepError::io("flushing csv header", e))?;
            debug!(path = %csv_path.display(), "Created csv with header");
        }

        Ok(Self {
            folder: folder.to_path_buf(),
            csv_path,
            writer: Some(writer),
            written_names: HashSet::new(),
            lines_written: 0,
        })
    }

    /// Settle `*.partial` images left by an interrupted run.
    ///
    /// A partial image whose name appears as a field of a line in `csv_path`
    /// is renamed into place; every other one is removed.
    pub fn recover(folder: &Path, csv_path: &Path) -> Result<Recovered> {
        let escaped = glob::Pattern::escape(&folder.to_string_lossy());
        let pattern = Path::new(&escaped).join(format!("*{PARTIAL_SUFFIX}"));
        let pattern_str = pattern.to_string_lossy();

        let partials: Vec<PathBuf> = glob::glob(&pattern_str)
            .map_err(|e| SweepError::Internal(format!("Invalid glob pattern: {e}")))?
            .filter_map(|r| r.ok())
            .collect();

        let mut recovered = Recovered::default();
        if partials.is_empty() {
            return Ok(recovered);
        }

        let referenced = referenced_names(csv_path)?;
        for partial in &partials {
            let target = partial.with_extension("");
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if referenced.contains(&name) && !target.exists() {
                fs::rename(partial, &target)
                    .map_err(|e| SweepError::io("completing partial image", e))?;
                debug!(image = %name, "Completed partial image");
                recovered.completed += 1;
            } else {
                fs::remove_file(partial)
                    .map_err(|e| SweepError::io("removing partial image", e))?;
                recovered.removed += 1;
            }
        }
        Ok(recovered)
    }

    /// Write one sample: image file plus CSV line, or neither.
    pub fn write_sample(&mut self, sample: &SampleData) -> Result<()> {
        let image_path = self.image_path(&sample.image_name)?;
        if self.written_names.contains(&sample.image_name) || image_path.exists() {
            return Err(SweepError::DuplicateImageName(sample.image_name.clone()));
        }

        let partial = partial_path(&image_path);
        if let Err(e) = write_synced(&partial, &sample.image) {
            discard(&partial);
            return Err(e);
        }

        if let Err(e) = self.write_line(&sample.data_line) {
            discard(&partial);
            self.abandon();
            return Err(e);
        }

        // The line is on disk; a failed rename is completed by the next open
        fs::rename(&partial, &image_path).map_err(|e| SweepError::io("renaming image file", e))?;

        self.written_names.insert(sample.image_name.clone());
        self.lines_written += 1;
        debug!(image = %sample.image_name, "Sample written");
        Ok(())
    }

    /// Flush and close the CSV.
    pub fn close(mut self) -> Result<()> {
        self.flush_and_release()
    }

    /// Data lines written by this writer (the header excluded).
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn image_path(&self, name: &str) -> Result<PathBuf> {
        let as_path = Path::new(name);
        let plain = !name.is_empty() && as_path.file_name() == Some(as_path.as_os_str());
        if !plain || name.ends_with(PARTIAL_SUFFIX) {
            return Err(SweepError::InvalidImageName(name.to_string()));
        }
        let path = self.folder.join(name);
        if path == self.csv_path {
            return Err(SweepError::InvalidImageName(name.to_string()));
        }
        Ok(path)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SweepError::Internal("csv writer already closed".to_string()))?;
        writeln!(writer, "{line}").map_err(|e| SweepError::io("writing csv line", e))?;
        writer
            .flush()
            .map_err(|e| SweepError::io("flushing csv line", e))
    }

    /// Drop the CSV handle without flushing whatever a failed write buffered.
    fn abandon(&mut self) {
        if let Some(writer) = self.writer.take() {
            let (_file, _unflushed) = writer.into_parts();
            warn!(path = %self.csv_path.display(), "Closed csv after a failed line write");
        }
    }

    fn flush_and_release(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer
                .flush()
                .map_err(|e| SweepError::io("flushing csv file", e)),
            None => Ok(()),
        }
    }
}

/// Outcome of `SampleWriter::recover`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovered {
    /// Partial images whose CSV line was on disk, renamed into place
    pub completed: usize,
    /// Partial images without a CSV line, deleted
    pub removed: usize,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    PathBuf::from(partial)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| SweepError::io("creating image file", e))?;
    file.write_all(bytes)
        .map_err(|e| SweepError::io("writing image file", e))?;
    file.sync_all()
        .map_err(|e| SweepError::io("syncing image file", e))
}

fn discard(partial: &Path) {
    if partial.exists() {
        if let Err(e) = fs::remove_file(partial) {
            warn!(path = %partial.display(), error = %e, "Failed to remove partial image");
        }
    }
}

/// Every comma-separated field of every line of the CSV, if it exists.
fn referenced_names(csv_path: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    let file = match File::open(csv_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(SweepError::io("reading csv for recovery", e)),
    };
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| SweepError::io("reading csv for recovery", e))?;
        names.extend(line.split(',').map(|field| field.trim().to_string()));
    }
    Ok(names)
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush_and_release() {
            warn!(error = %e, path = %self.csv_path.display(), "Failed to flush csv on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(name: &str, line: &str) -> SampleData {
        SampleData {
            data_line: line.to_string(),
            image_name: name.to_string(),
            image: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        writer.write_sample(&sample("a.png", "a,1")).unwrap();
        writer.close().unwrap();

        let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        writer.write_sample(&sample("b.png", "b,2")).unwrap();
        assert_eq!(writer.lines_written(), 1);
        writer.close().unwrap();

        let csv = fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(csv, "h\na,1\nb,2\n");
        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), vec![1, 2, 3]);
        assert!(dir.path().join("b.png").exists());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = TempDir::new().unwrap();
        let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        writer.write_sample(&sample("a.png", "a,1")).unwrap();

        match writer.write_sample(&sample("a.png", "a,2")) {
            Err(SweepError::DuplicateImageName(name)) => assert_eq!(name, "a.png"),
            other => panic!("unexpected: {other:?}"),
        }
        writer.close().unwrap();

        let csv = fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        for name in ["", "../x.png", "sub/x.png", "x.png.partial", "data.csv"] {
            assert!(
                matches!(
                    writer.write_sample(&sample(name, "x")),
                    Err(SweepError::InvalidImageName(_))
                ),
                "{name} accepted"
            );
        }
        assert_eq!(writer.lines_written(), 0);
    }

    #[test]
    fn test_recover_removes_partials() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png.partial"), b"x").unwrap();
        fs::write(dir.path().join("keep.png"), b"x").unwrap();

        let writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        drop(writer);

        assert!(!dir.path().join("a.png.partial").exists());
        assert!(dir.path().join("keep.png").exists());
    }

    #[test]
    fn test_failed_line_write_discards_image() {
        let dir = TempDir::new().unwrap();
        let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        writer.write_sample(&sample("a.png", "a,1")).unwrap();
        writer.flush_and_release().unwrap();

        assert!(matches!(
            writer.write_sample(&sample("b.png", "b,2")),
            Err(SweepError::Internal(_))
        ));
        assert!(!dir.path().join("b.png").exists());
        assert!(!dir.path().join("b.png.partial").exists());
        assert_eq!(writer.lines_written(), 1);

        let csv = fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(csv, "h\na,1\n");
    }

    #[test]
    fn test_recover_completes_referenced_partials() {
        let dir = TempDir::new().unwrap();
        // Killed after the line of a.png was flushed but before its rename,
        // and while b.png was still being written
        fs::write(dir.path().join("data.csv"), "h\nold.png,0\na.png,1\n").unwrap();
        fs::write(dir.path().join("old.png"), b"old").unwrap();
        fs::write(dir.path().join("a.png.partial"), b"img").unwrap();
        fs::write(dir.path().join("b.png.partial"), b"im").unwrap();

        let writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
        drop(writer);

        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"img");
        assert!(!dir.path().join("a.png.partial").exists());
        assert!(!dir.path().join("b.png").exists());
        assert!(!dir.path().join("b.png.partial").exists());
        assert_eq!(fs::read(dir.path().join("old.png")).unwrap(), b"old");
    }

    #[test]
    fn test_recover_reports_counts() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("data.csv");
        fs::write(&csv, "h\na.png,1\n").unwrap();
        fs::write(dir.path().join("a.png.partial"), b"x").unwrap();
        fs::write(dir.path().join("c.png.partial"), b"x").unwrap();

        let recovered = SampleWriter::recover(dir.path(), &csv).unwrap();
        assert_eq!(
            recovered,
            Recovered {
                completed: 1,
                removed: 1
            }
        );
        assert_eq!(
            SampleWriter::recover(dir.path(), &csv).unwrap(),
            Recovered::default()
        );
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = SampleWriter::open(dir.path(), "data.csv", "h").unwrap();
            writer.write_sample(&sample("a.png", "a,1")).unwrap();
        }
        let csv = fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(csv, "h\na,1\n");
    }
}
