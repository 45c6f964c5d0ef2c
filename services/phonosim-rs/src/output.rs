//! Table file I/O.
//!
//! Output tables are written to a temporary file next to the destination and
//! renamed into place on [`TableWriter::commit`]. A writer or [`StagedTable`]
//! dropped before it is persisted removes its temporary file, so an aborted
//! run never leaves a partial table behind. Several staged tables are moved
//! into place together with [`persist_all`]. Paths ending in `.gz` are
//! gzip-compressed.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::{NamedTempFile, TempPath};
use tracing::warn;

use crate::error::{Error, Result};

pub fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Open a table for reading, transparently decompressing `.gz` files
pub fn open_table(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

impl Sink {
    fn finish(self) -> io::Result<File> {
        let buffered = match self {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w.finish()?,
        };
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(file)
    }
}

/// Temporary file beside `dest`, compressed when `dest` ends in `.gz`
fn temp_sink(dest: &Path) -> Result<(Sink, TempPath)> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    let (file, temp_path) = temp.into_parts();

    let buffered = BufWriter::new(file);
    let sink = if is_gzip(dest) {
        Sink::Gzip(GzEncoder::new(buffered, Compression::default()))
    } else {
        Sink::Plain(buffered)
    };
    Ok((sink, temp_path))
}

/// A fully written file waiting to be renamed into place
#[derive(Debug)]
pub struct StagedTable {
    temp_path: TempPath,
    dest: PathBuf,
}

impl StagedTable {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn persist(self) -> Result<()> {
        let dest = self.dest;
        self.temp_path
            .persist(&dest)
            .map_err(|e| Error::io(&dest, e.error))
    }
}

/// Move every staged table into place. If one fails, tables already moved
/// by this call are removed again and the rest are discarded.
pub fn persist_all(tables: Vec<StagedTable>) -> Result<()> {
    let mut persisted: Vec<PathBuf> = Vec::with_capacity(tables.len());
    for table in tables {
        let dest = table.dest.clone();
        if let Err(err) = table.persist() {
            for path in &persisted {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to roll back output");
                }
            }
            return Err(err);
        }
        persisted.push(dest);
    }
    Ok(())
}

/// Write `text` to `dest` atomically
pub fn write_text(dest: &Path, text: &str) -> Result<()> {
    let (mut sink, temp_path) = temp_sink(dest)?;
    sink.write_all(text.as_bytes())
        .map_err(|e| Error::io(dest, e))?;
    sink.finish().map_err(|e| Error::io(dest, e))?;
    StagedTable {
        temp_path,
        dest: dest.to_path_buf(),
    }
    .persist()
}

/// Tab-separated table writer with all-or-nothing semantics
pub struct TableWriter {
    writer: csv::Writer<Sink>,
    temp_path: TempPath,
    dest: PathBuf,
}

impl TableWriter {
    /// Start a table at `dest` and write its header row
    pub fn create(dest: &Path, header: &[&str]) -> Result<Self> {
        let (sink, temp_path) = temp_sink(dest)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(sink);
        writer
            .write_record(header)
            .map_err(|e| Error::csv(dest, e))?;

        Ok(Self {
            writer,
            temp_path,
            dest: dest.to_path_buf(),
        })
    }

    pub fn write_row(&mut self, row: &[&str]) -> Result<()> {
        self.writer
            .write_record(row)
            .map_err(|e| Error::csv(&self.dest, e))
    }

    /// Flush and sync everything, leaving the table in its temporary file
    pub fn stage(self) -> Result<StagedTable> {
        let dest = self.dest;
        let sink = self
            .writer
            .into_inner()
            .map_err(|e| Error::io(&dest, e.into_error()))?;
        sink.finish().map_err(|e| Error::io(&dest, e))?;
        Ok(StagedTable {
            temp_path: self.temp_path,
            dest,
        })
    }

    /// Flush everything and move the table into place
    pub fn commit(self) -> Result<()> {
        self.stage()?.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(path: &Path) -> String {
        let mut text = String::new();
        open_table(path).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_plain_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        let mut writer = TableWriter::create(&path, &["a", "b"]).unwrap();
        writer.write_row(&["x", ""]).unwrap();
        writer.commit().unwrap();
        assert_eq!(read_all(&path), "a\tb\nx\t\n");
    }

    #[test]
    fn test_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv.gz");
        let mut writer = TableWriter::create(&path, &["word1"]).unwrap();
        writer.write_row(&["pata"]).unwrap();
        writer.commit().unwrap();

        let mut magic = [0u8; 2];
        File::open(&path).unwrap().read_exact(&mut magic).unwrap();
        assert_eq!(magic, [0x1f, 0x8b]);
        assert_eq!(read_all(&path), "word1\npata\n");
    }

    #[test]
    fn test_uncommitted_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        {
            let mut writer = TableWriter::create(&path, &["a"]).unwrap();
            writer.write_row(&["x"]).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staged_table_waits_for_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        let mut writer = TableWriter::create(&path, &["a"]).unwrap();
        writer.write_row(&["x"]).unwrap();

        let staged = writer.stage().unwrap();
        assert!(!path.exists());
        assert_eq!(staged.dest(), path.as_path());
        staged.persist().unwrap();
        assert_eq!(read_all(&path), "a\nx\n");
    }

    #[test]
    fn test_persist_all_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.tsv");
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let second = sub.join("second.tsv");

        let staged_first = TableWriter::create(&first, &["a"]).unwrap().stage().unwrap();
        let staged_second = TableWriter::create(&second, &["b"]).unwrap().stage().unwrap();

        // The second rename fails once its temporary file is gone
        std::fs::remove_dir_all(&sub).unwrap();

        assert!(persist_all(vec![staged_first, staged_second]).is_err());
        assert!(!first.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.json.gz");
        write_text(&path, "[]\n").unwrap();
        assert_eq!(read_all(&path), "[]\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
