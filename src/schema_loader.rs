use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, TransformError};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};

/// Where a schema document lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaReference {
    pub location: String,
    pub source_type: SchemaSourceType,
}

/// Type of schema source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaSourceType {
    Local(PathBuf),
    Remote(String),
}

impl SchemaReference {
    /// Classify a configured location: `http(s)://` URLs are remote, `file://` URLs and
    /// everything else are local paths
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(TransformError::SchemaUnavailable {
                location: location.to_string(),
                reason: "schema location is empty".to_string(),
            });
        }
        let source_type = Self::determine_source_type(location, Path::new(""));
        Ok(Self {
            location: location.to_string(),
            source_type,
        })
    }

    /// Resolve a `schemaLocation` found inside this document
    pub fn resolve(&self, relative: &str) -> Result<Self> {
        let relative = relative.trim();
        match &self.source_type {
            SchemaSourceType::Remote(base) => {
                let joined = Url::parse(base)
                    .and_then(|base| base.join(relative))
                    .map_err(|e| TransformError::SchemaUnavailable {
                        location: relative.to_string(),
                        reason: format!("cannot resolve against {}: {}", base, e),
                    })?;
                Self::parse(joined.as_str())
            }
            SchemaSourceType::Local(path) => {
                let source_type = Self::determine_source_type(relative, path);
                let location = match &source_type {
                    SchemaSourceType::Local(path) => path.display().to_string(),
                    SchemaSourceType::Remote(url) => url.clone(),
                };
                Ok(Self {
                    location,
                    source_type,
                })
            }
        }
    }

    /// Determine if a schema location is local or remote
    fn determine_source_type(location: &str, base_path: &Path) -> SchemaSourceType {
        if location.starts_with("http://") || location.starts_with("https://") {
            return SchemaSourceType::Remote(location.to_string());
        }
        if location.starts_with("file:")
            && let Some(path) = Url::parse(location)
                .ok()
                .and_then(|url| url.to_file_path().ok())
        {
            return SchemaSourceType::Local(path);
        }
        // Resolve relative paths against the including document's directory
        let path = Path::new(location);
        if path.is_absolute() {
            SchemaSourceType::Local(path.to_path_buf())
        } else {
            SchemaSourceType::Local(base_path.parent().unwrap_or(Path::new("")).join(path))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source_type, SchemaSourceType::Remote(_))
    }
}

/// Raw bytes of one schema document
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub reference: SchemaReference,
    pub data: Vec<u8>,
}

impl SchemaDocument {
    pub fn location(&self) -> &str {
        &self.reference.location
    }

    /// An owned reader over the document bytes
    pub fn reader(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.data.clone())
    }
}

/// Network seam of the resolver
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl SchemaFetch for AsyncHttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.download_schema(url).await
    }
}

/// Resolves schema references to their bytes, from disk or over HTTP
#[derive(Clone)]
pub struct SchemaLoader {
    fetcher: Arc<dyn SchemaFetch>,
}

impl SchemaLoader {
    pub fn new(fetcher: Arc<dyn SchemaFetch>) -> Self {
        Self { fetcher }
    }

    pub fn with_http_config(config: HttpClientConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(AsyncHttpClient::new(config)?)))
    }

    /// Load a schema by reference (local or remote)
    pub async fn load(&self, reference: &SchemaReference) -> Result<SchemaDocument> {
        let data = match &reference.source_type {
            SchemaSourceType::Local(path) => self.load_local_schema(path).await?,
            SchemaSourceType::Remote(url) => self.load_remote_schema(url).await?,
        };
        Ok(SchemaDocument {
            reference: reference.clone(),
            data,
        })
    }

    /// Parse and load a configured location
    pub async fn load_location(&self, location: &str) -> Result<SchemaDocument> {
        self.load(&SchemaReference::parse(location)?).await
    }

    /// Load a local schema file
    pub async fn load_local_schema(&self, schema_path: &Path) -> Result<Vec<u8>> {
        let data = tokio::fs::read(schema_path)
            .await
            .map_err(|e| TransformError::SchemaUnavailable {
                location: schema_path.display().to_string(),
                reason: match e.kind() {
                    std::io::ErrorKind::NotFound => "file not found".to_string(),
                    _ => e.to_string(),
                },
            })?;
        debug!(path = %schema_path.display(), bytes = data.len(), "read local schema");
        Ok(data)
    }

    /// Fetch a remote schema; no caching of the bytes happens here
    pub async fn load_remote_schema(&self, url: &str) -> Result<Vec<u8>> {
        info!(location = url, "fetching remote schema");
        self.fetcher.fetch(url).await
    }
}
