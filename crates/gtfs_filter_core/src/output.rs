use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use gtfs_model::GtfsFile;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::csv_writer::write_table;
use crate::progress::{NoOpProgressHandler, ProgressHandler};
use crate::GtfsFeed;

#[derive(Debug, thiserror::Error)]
pub enum GtfsOutputError {
    #[error("File '{}' already exists.", .0.display())]
    OutputExists(PathBuf),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write zip archive {path}: {source}")]
    Zip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
}

fn io_error(path: &Path, source: io::Error) -> GtfsOutputError {
    GtfsOutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Where a filtered feed is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    Zip(PathBuf),
}

impl OutputTarget {
    /// A path ending in `.zip` is an archive, anything else a directory.
    ///
    /// An existing archive or non-empty directory is only accepted with `overwrite`.
    /// Missing directories are created on save.
    pub fn resolve(path: impl AsRef<Path>, overwrite: bool) -> Result<Self, GtfsOutputError> {
        let path = path.as_ref();
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_zip {
            if path.is_file() && !overwrite {
                return Err(GtfsOutputError::OutputExists(path.to_path_buf()));
            }
            Ok(OutputTarget::Zip(path.to_path_buf()))
        } else {
            if path.is_file() {
                return Err(GtfsOutputError::OutputExists(path.to_path_buf()));
            }
            if path.is_dir() && !overwrite && !is_empty_dir(path)? {
                return Err(GtfsOutputError::OutputExists(path.to_path_buf()));
            }
            Ok(OutputTarget::Directory(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Directory(path) | OutputTarget::Zip(path) => path,
        }
    }

    pub fn save(
        &self,
        feed: &GtfsFeed,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<(), GtfsOutputError> {
        let progress = progress.unwrap_or(&NoOpProgressHandler);
        match self {
            OutputTarget::Directory(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
                remove_feed_files(dir)?;
                save_feed_with_progress(feed, dir, progress)
            }
            OutputTarget::Zip(path) => save_feed_zip_with_progress(feed, path, progress),
        }
    }
}

fn is_empty_dir(path: &Path) -> Result<bool, GtfsOutputError> {
    let mut entries = std::fs::read_dir(path).map_err(|source| io_error(path, source))?;
    Ok(entries.next().is_none())
}

/// Deletes the known feed files left by a previous run. Other files are kept.
fn remove_feed_files(dir: &Path) -> Result<(), GtfsOutputError> {
    for file in GtfsFile::ALL {
        let path = dir.join(file.file_name());
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("removed existing {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(io_error(&path, source)),
        }
    }
    Ok(())
}

/// Writes every present table as `<table>.txt` into an existing directory.
pub fn save_feed(feed: &GtfsFeed, directory: impl AsRef<Path>) -> Result<(), GtfsOutputError> {
    save_feed_with_progress(feed, directory.as_ref(), &NoOpProgressHandler)
}

fn save_feed_with_progress(
    feed: &GtfsFeed,
    directory: &Path,
    progress: &dyn ProgressHandler,
) -> Result<(), GtfsOutputError> {
    if !directory.is_dir() {
        return Err(io_error(
            directory,
            io::Error::new(io::ErrorKind::NotFound, "output directory does not exist"),
        ));
    }
    for (file, table) in feed.tables() {
        let name = file.file_name();
        progress.on_start_file_save(name);
        let path = directory.join(name);
        let handle = File::create(&path).map_err(|source| io_error(&path, source))?;
        write_table(table, BufWriter::new(handle)).map_err(|source| GtfsOutputError::Csv {
            file: name.to_string(),
            source,
        })?;
        debug!("wrote {} rows to {}", table.len(), path.display());
        progress.on_finish_file_save(name);
    }
    Ok(())
}

/// Writes every present table as a deflated entry of a zip archive at `path`.
pub fn save_feed_zip(feed: &GtfsFeed, path: impl AsRef<Path>) -> Result<(), GtfsOutputError> {
    save_feed_zip_with_progress(feed, path.as_ref(), &NoOpProgressHandler)
}

fn save_feed_zip_with_progress(
    feed: &GtfsFeed,
    path: &Path,
    progress: &dyn ProgressHandler,
) -> Result<(), GtfsOutputError> {
    let zip_error = |source| GtfsOutputError::Zip {
        path: path.display().to_string(),
        source,
    };
    let handle = File::create(path).map_err(|source| io_error(path, source))?;
    let mut zip = ZipWriter::new(BufWriter::new(handle));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (file, table) in feed.tables() {
        let name = file.file_name();
        progress.on_start_file_save(name);
        zip.start_file(name, options).map_err(zip_error)?;
        write_table(table, &mut zip).map_err(|source| GtfsOutputError::Csv {
            file: name.to_string(),
            source,
        })?;
        debug!("wrote {} rows to {}", table.len(), name);
        progress.on_finish_file_save(name);
    }

    let mut writer = zip.finish().map_err(zip_error)?;
    writer.flush().map_err(|source| io_error(path, source))?;
    Ok(())
}
