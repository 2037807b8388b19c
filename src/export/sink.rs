use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{CanvasError, CanvasResult};

/// One encoded output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFile {
    /// File name including extension.
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Delivery target for exported files (a browser download, a directory, a test buffer).
pub trait DownloadSink {
    fn deliver(&mut self, file: ExportedFile) -> CanvasResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pub(crate) files: Vec<ExportedFile>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files in delivery order.
    pub fn files(&self) -> &[ExportedFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<ExportedFile> {
        self.files
    }
}

impl DownloadSink for InMemorySink {
    fn deliver(&mut self, file: ExportedFile) -> CanvasResult<()> {
        self.files.push(file);
        Ok(())
    }
}

/// Writes every delivered file into a directory, creating it on first use.
#[derive(Debug)]
pub struct DirSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl DownloadSink for DirSink {
    fn deliver(&mut self, file: ExportedFile) -> CanvasResult<()> {
        let mut parts = Path::new(&file.file_name).components();
        if !matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None)) {
            return Err(CanvasError::validation(format!(
                "file name '{}' must be a single path component",
                file.file_name
            )));
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir '{}'", self.dir.display()))?;
        let path = self.dir.join(&file.file_name);
        std::fs::write(&path, &file.bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "wrote export");
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/sink.rs"]
mod tests;
