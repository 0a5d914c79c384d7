//! Filesystem emitter.

use super::{TutorialDocument, TutorialEmitter};
use crate::errors::EmissionError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes `<output_dir>/<project_name>/index.md` and the chapter files.
#[derive(Debug, Clone)]
pub struct FsEmitter {
    output_dir: PathBuf,
}

impl FsEmitter {
    /// Creates an emitter writing below `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory a document for `project_name` is written to.
    ///
    /// # Errors
    ///
    /// Returns an error unless the name is a single plain path component,
    /// so a project can never be written outside the output directory.
    pub fn destination(&self, project_name: &str) -> Result<PathBuf, EmissionError> {
        let mut components = Path::new(project_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.output_dir.join(name)),
            _ => Err(EmissionError::new(
                self.output_dir.display().to_string(),
                format!("project name '{project_name}' is not a plain directory name"),
            )),
        }
    }

    fn write_all(dir: &Path, document: &TutorialDocument) -> Result<(), EmissionError> {
        let error = |path: &Path, e: std::io::Error| EmissionError::new(path.display().to_string(), e.to_string());

        std::fs::create_dir_all(dir).map_err(|e| error(dir, e))?;
        for file in document.files() {
            let path = dir.join(&file.filename);
            std::fs::write(&path, &file.content).map_err(|e| error(&path, e))?;
            tracing::info!(path = %path.display(), "Wrote tutorial file");
        }
        Ok(())
    }
}

#[async_trait]
impl TutorialEmitter for FsEmitter {
    async fn emit(&self, document: &TutorialDocument) -> Result<String, EmissionError> {
        let dir = self.destination(&document.project_name)?;
        let owned = document.clone();
        let target = dir.clone();
        tokio::task::spawn_blocking(move || Self::write_all(&target, &owned))
            .await
            .map_err(|e| EmissionError::new(dir.display().to_string(), e.to_string()))??;
        Ok(dir.display().to_string())
    }
}
