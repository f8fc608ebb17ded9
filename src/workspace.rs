//! Compilation workspace
//!
//! Every compiler owns one scoped directory. Fetched schema documents are staged in a
//! content-addressed store inside it (through `cacache`) and the compiler parses the
//! staged, integrity-checked copies. The compiled type descriptors are dumped next to
//! them as `model.json` for inspection only; nothing reads it back. The directory is
//! removed when the owner closes it or drops it; removal failures are logged and
//! swallowed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};
use uuid::Uuid;

use crate::binding::BindingModel;
use crate::error::{Result, TransformError};

const ARTIFACTS_DIR: &str = "artifacts";
const MODEL_FILE: &str = "model.json";

pub struct CompilationWorkspace {
    root: PathBuf,
    released: AtomicBool,
}

impl CompilationWorkspace {
    /// Create a fresh workspace directory below `base`
    pub async fn create(base: &Path) -> Result<Self> {
        let root = base.join(format!("compile-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "created compilation workspace");
        Ok(Self {
            root,
            released: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn artifacts(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    fn staging_key(location: &str) -> String {
        format!("schema:{}", location)
    }

    /// Stage a fetched schema document and return the staged copy
    pub async fn stage_document(&self, location: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.ensure_open()?;
        cacache::write(self.artifacts(), Self::staging_key(location), data)
            .await
            .map_err(|e| TransformError::Cache(format!("Failed to stage {}: {}", location, e)))?;
        self.staged_document(location).await?.ok_or_else(|| {
            TransformError::Cache(format!("staged {} vanished from the workspace", location))
        })
    }

    /// Read a staged document back, `None` when it was never staged
    pub async fn staged_document(&self, location: &str) -> Result<Option<Vec<u8>>> {
        match cacache::read(self.artifacts(), Self::staging_key(location)).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(TransformError::Cache(format!(
                "Failed to read staged {}: {}",
                location, e
            ))),
        }
    }

    /// Locations of every staged document
    pub fn staged_locations(&self) -> Vec<String> {
        cacache::index::ls(&self.artifacts())
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.key.strip_prefix("schema:").map(str::to_string))
            .collect()
    }

    /// Dump the compiled type descriptors as JSON
    pub async fn write_model(&self, model: &BindingModel) -> Result<PathBuf> {
        self.ensure_open()?;
        let json = serde_json::to_vec_pretty(model)
            .map_err(|e| TransformError::Cache(format!("Failed to serialize model: {}", e)))?;
        let path = self.root.join(MODEL_FILE);
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_released() {
            return Err(TransformError::Cache(format!(
                "workspace {} has been released",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Remove the workspace directory. Only the first call does any work.
    pub fn try_release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(path = %self.root.display(), "released compilation workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TransformError::ResourceRelease {
                path: self.root.clone(),
                source,
            }),
        }
    }

    /// Best-effort release; failures are logged
    pub fn release(&self) {
        if let Err(e) = self.try_release() {
            error!(error = %e, "failed to release compilation workspace");
        }
    }
}

impl Drop for CompilationWorkspace {
    fn drop(&mut self) {
        self.release();
    }
}
