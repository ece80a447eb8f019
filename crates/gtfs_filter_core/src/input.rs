use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use gtfs_model::GtfsFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::csv_reader::CsvParseError;

#[derive(Debug, thiserror::Error)]
pub enum GtfsInputError {
    #[error("input path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("input is neither a directory nor a zip archive: {0}")]
    InvalidPath(PathBuf),
    #[error("invalid zip archive {0}")]
    InvalidZip(PathBuf),
    #[error("GTFS is invalid: file '{0}' is missing.")]
    MissingRequiredFile(&'static str),
    #[error("No columns to parse from file '{0}'.")]
    EmptyFile(&'static str),
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {file} from archive: {source}")]
    ZipFile {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error(transparent)]
    Csv(#[from] CsvParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtfsInputSource {
    Directory,
    Zip,
}

/// An unzipped feed directory or a feed archive on disk.
#[derive(Debug, Clone)]
pub struct GtfsInput {
    path: PathBuf,
    source: GtfsInputSource,
    /// Folder inside the archive that holds the feed, empty for the archive root.
    zip_root: String,
}

impl GtfsInput {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GtfsInputError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GtfsInputError::MissingPath(path.to_path_buf()));
        }
        let (source, zip_root) = if path.is_dir() {
            (GtfsInputSource::Directory, String::new())
        } else if path.is_file() {
            let file = File::open(path).map_err(|source| GtfsInputError::Io {
                file: path.display().to_string(),
                source,
            })?;
            let archive = ZipArchive::new(file)
                .map_err(|_| GtfsInputError::InvalidZip(path.to_path_buf()))?;
            (GtfsInputSource::Zip, feed_root(&archive))
        } else {
            return Err(GtfsInputError::InvalidPath(path.to_path_buf()));
        };
        Ok(Self {
            path: path.to_path_buf(),
            source,
            zip_root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> GtfsInputSource {
        self.source
    }

    /// Raw bytes of `file_name`, or `None` when the feed does not contain it.
    pub fn read_file(&self, file_name: &str) -> Result<Option<Vec<u8>>, GtfsInputError> {
        match self.source {
            GtfsInputSource::Directory => self.read_directory_file(file_name),
            GtfsInputSource::Zip => self.read_zip_file(file_name),
        }
    }

    fn read_directory_file(&self, file_name: &str) -> Result<Option<Vec<u8>>, GtfsInputError> {
        let path = self.path.join(file_name);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(GtfsInputError::Io {
                file: file_name.to_string(),
                source,
            }),
        }
    }

    fn read_zip_file(&self, file_name: &str) -> Result<Option<Vec<u8>>, GtfsInputError> {
        let file = File::open(&self.path).map_err(|source| GtfsInputError::Io {
            file: self.path.display().to_string(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(file).map_err(|_| GtfsInputError::InvalidZip(self.path.clone()))?;
        let entry_name = format!("{}{}", self.zip_root, file_name);
        let mut entry = match archive.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(GtfsInputError::ZipFile {
                    file: file_name.to_string(),
                    source,
                })
            }
        };
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|source| GtfsInputError::Io {
                file: file_name.to_string(),
                source,
            })?;
        Ok(Some(data))
    }
}

/// Prefix of the first required feed file in the archive, so a feed zipped inside a
/// folder still loads. Every other file is looked up next to it.
fn feed_root<R: Read + io::Seek>(archive: &ZipArchive<R>) -> String {
    for name in archive.file_names() {
        if name.starts_with("__MACOSX/") || name.ends_with('/') {
            continue;
        }
        let (prefix, base) = match name.rfind('/') {
            Some(slash) => name.split_at(slash + 1),
            None => ("", name),
        };
        if GtfsFile::from_file_name(base).is_some_and(GtfsFile::is_required) {
            return prefix.to_string();
        }
    }
    String::new()
}
