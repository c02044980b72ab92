//! Append-only row log with a write-once header.
//!
//! [`SchemaWriter`] owns one output file. On open, an empty or missing file
//! gets the header row first; a file that already has content is appended to
//! as-is, provided its header has the same number of columns. Every row must
//! have exactly as many fields as the header.
//!
//! Each append is written out before `append` returns, so a crash loses at
//! most the record in flight. With [`Compression::Gzip`] every line becomes
//! its own gzip member: the file is a multi-member gzip stream that decodes
//! cleanly up to the last completed append, and restarts simply add members.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression as GzLevel;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::{info, warn};

use crate::error::RecorderError;

/// On-disk encoding of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
}

impl Compression {
    /// `.gz` suffix selects gzip.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Self::Gzip,
            _ => Self::Plain,
        }
    }
}

/// Destination for encoded rows.
pub trait RowSink {
    fn append(&mut self, fields: &[String]) -> Result<(), RecorderError>;
}

/// Owner of one output log.
#[derive(Debug)]
pub struct SchemaWriter {
    path: PathBuf,
    file: File,
    compression: Compression,
    columns: usize,
    rows_written: u64,
}

fn persist_err<'a>(
    path: &'a Path,
    what: &'static str,
) -> impl FnOnce(io::Error) -> RecorderError + 'a {
    move |e| RecorderError::Persistence(format!("{what} {}: {e}", path.display()))
}

impl SchemaWriter {
    /// Open `path` for appending, writing `header` if the file is empty.
    ///
    /// A non-empty file whose header has a different column count is refused
    /// with [`RecorderError::Schema`]; the file is left untouched.
    pub fn open(
        path: &Path,
        header: &[String],
        compression: Compression,
    ) -> Result<Self, RecorderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persist_err(parent, "create dir"))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(persist_err(path, "open"))?;
        let existing_len = file.metadata().map_err(persist_err(path, "stat"))?.len();

        let header_line = encode_row(header);
        if existing_len > 0 {
            match read_first_line(path, compression) {
                Ok(Some(found)) if found != header_line => {
                    let on_disk = count_fields(&found);
                    if on_disk != header.len() {
                        return Err(RecorderError::Schema {
                            expected: on_disk,
                            got: header.len(),
                        });
                    }
                    warn!(
                        "[writer] {} has different column names; keeping the existing header",
                        path.display()
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("[writer] could not verify header of {}: {e}", path.display()),
            }
        }

        let mut writer = Self {
            path: path.to_path_buf(),
            file,
            compression,
            columns: header.len(),
            rows_written: 0,
        };

        if existing_len == 0 {
            writer.write_line(&header_line)?;
            info!("[writer] created {} ({} columns)", path.display(), header.len());
        } else {
            info!("[writer] appending to {} ({existing_len} bytes)", path.display());
        }

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle (header excluded).
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_line(&mut self, line: &str) -> Result<(), RecorderError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let payload = match self.compression {
            Compression::Plain => bytes,
            Compression::Gzip => {
                gzip_member(&bytes).map_err(persist_err(&self.path, "compress row for"))?
            }
        };

        self.file
            .write_all(&payload)
            .and_then(|_| self.file.flush())
            .map_err(persist_err(&self.path, "write"))
    }
}

impl RowSink for SchemaWriter {
    fn append(&mut self, fields: &[String]) -> Result<(), RecorderError> {
        if fields.len() != self.columns {
            return Err(RecorderError::Schema {
                expected: self.columns,
                got: fields.len(),
            });
        }
        self.write_line(&encode_row(fields))?;
        self.rows_written += 1;
        Ok(())
    }
}

/// Compress `data` into one self-contained gzip member.
fn gzip_member(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len()), GzLevel::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Join fields with commas, quoting only fields that need it.
pub fn encode_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn open_reader(path: &Path, compression: Compression) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let inner: Box<dyn Read> = match compression {
        Compression::Plain => Box::new(file),
        Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
    };
    Ok(Box::new(BufReader::new(inner)))
}

/// Fields in one encoded row. Commas inside quotes do not split.
fn count_fields(line: &str) -> usize {
    let mut count = 1;
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => count += 1,
            _ => {}
        }
    }
    count
}

fn read_first_line(path: &Path, compression: Compression) -> io::Result<Option<String>> {
    let mut reader = open_reader(path, compression)?;
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Read every line of a log, header included.
pub fn read_lines(path: &Path, compression: Compression) -> Result<Vec<String>, RecorderError> {
    open_reader(path, compression)
        .and_then(|reader| reader.lines().collect())
        .map_err(persist_err(path, "read"))
}
