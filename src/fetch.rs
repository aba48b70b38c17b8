use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::IngestError;

// Compression of the source file, as passed to DuckDB's read_csv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    None,
}

impl Compression {
    pub fn as_read_csv_option(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::None => "none",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_read_csv_option())
    }
}

/// A source file ready to be read.
/// Downloads live in a temporary file that is removed when this is dropped.
#[derive(Debug)]
pub struct FetchedSource {
    path: PathBuf,
    compression: Compression,
    _download: Option<NamedTempFile>,
}

impl FetchedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn is_download(&self) -> bool {
        self._download.is_some()
    }
}

// Resolve the source reference: remote URLs are downloaded, anything else is a local path
pub fn fetch_source(url: &str) -> Result<FetchedSource, IngestError> {
    let (path, download) = if url.starts_with("http://") || url.starts_with("https://") {
        let file = download(url)?;
        (file.path().to_path_buf(), Some(file))
    } else {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        if !path.is_file() {
            return Err(IngestError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Source file '{}' does not exist", path.display()),
            )));
        }
        (path, None)
    };

    let compression = detect_compression(&path)?;
    debug!(path = %path.display(), %compression, "resolved source");

    Ok(FetchedSource {
        path,
        compression,
        _download: download,
    })
}

// Stream the response body into a temporary file
fn download(url: &str) -> Result<NamedTempFile, IngestError> {
    let start = Instant::now();
    let fetch_error = |source| IngestError::Fetch {
        url: url.to_string(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(fetch_error)?;

    let mut file = tempfile::Builder::new().prefix("ingest-").tempfile()?;
    let bytes = response.copy_to(&mut file).map_err(fetch_error)?;

    info!(url, bytes, elapsed = ?start.elapsed(), "downloaded source");
    Ok(file)
}

// Determine the compression based on the magic number
pub fn detect_compression(path: &Path) -> io::Result<Compression> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 2];
    let bytes_read = file.read(&mut header)?;
    Ok(match_magic_numbers(&header[..bytes_read]))
}

fn match_magic_numbers(buffer: &[u8]) -> Compression {
    match buffer {
        [0x1F, 0x8B, ..] => Compression::Gzip,
        _ => Compression::None,
    }
}
