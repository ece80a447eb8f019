/// Trait for handling progress events while a feed is read and written
pub trait ProgressHandler: Send + Sync {
    /// Set total number of files to load
    fn set_total_files(&self, count: usize) {
        let _ = count;
    }

    /// Called when starting to load a file
    fn on_start_file_load(&self, file: &str);

    /// Called when finished loading a file, whether it was present or not
    fn on_finish_file_load(&self, file: &str);

    /// Called when starting to write a file
    fn on_start_file_save(&self, file: &str);

    /// Called when finished writing a file
    fn on_finish_file_save(&self, file: &str);
}

/// A no-op progress handler
pub struct NoOpProgressHandler;

impl ProgressHandler for NoOpProgressHandler {
    fn on_start_file_load(&self, _file: &str) {}
    fn on_finish_file_load(&self, _file: &str) {}
    fn on_start_file_save(&self, _file: &str) {}
    fn on_finish_file_save(&self, _file: &str) {}
}
