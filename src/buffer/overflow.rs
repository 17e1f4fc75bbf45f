//! On-disk overflow store.
//!
//! Records are newline-delimited JSON inside gzip. Each append writes one
//! complete gzip member, so the file is a multi-member gzip stream that is
//! always readable up to the last fully written record.
//!
//! Reading is read-then-delete, not crash safe: a crash between [`take`]
//! returning and the caller shipping the records loses nothing, but a crash
//! after the records were shipped and before the file was removed replays
//! them on the next start. Delivery is at-least-once, so duplicates are
//! tolerated.
//!
//! [`take`]: OverflowFile::take

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use log::warn;

use crate::line::BufferedLine;

#[derive(Debug)]
pub struct OverflowFile {
    path: PathBuf,
}

impl OverflowFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record as its own gzip member.
    pub fn append(&self, line: &BufferedLine) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_record(&mut encoder, line)?;
        encoder.finish()?.sync_data()
    }

    /// Read every intact record. A missing file reads as empty.
    ///
    /// Corrupt records are skipped; a torn final member ends the read.
    pub fn read_all(&self) -> io::Result<Vec<BufferedLine>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(
                        "logship: overflow file {} is damaged after {} records: {err}",
                        self.path.display(),
                        records.len()
                    );
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    "logship: skipping corrupt overflow record {} in {}: {err}",
                    index + 1,
                    self.path.display()
                ),
            }
        }
        Ok(records)
    }

    /// Read every record, then delete the file.
    pub fn take(&self) -> io::Result<Vec<BufferedLine>> {
        let records = self.read_all()?;
        self.remove()?;
        Ok(records)
    }

    /// Delete the file if present.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Rewrite the file with `lines` ahead of the records already stored.
    ///
    /// The new content is written to a sibling temporary file and renamed
    /// over the original.
    pub fn prepend(&self, lines: &[BufferedLine]) -> io::Result<()> {
        let existing = self.read_all()?;
        let tmp = self.path.with_extension("gz.tmp");
        let file = File::create(&tmp)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        for line in lines.iter().chain(existing.iter()) {
            write_record(&mut encoder, line)?;
        }
        encoder.finish()?.sync_all()?;
        fs::rename(&tmp, &self.path)
    }
}

fn write_record<W: Write>(writer: &mut W, line: &BufferedLine) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, line).map_err(io::Error::other)?;
    writer.write_all(b"\n")
}
