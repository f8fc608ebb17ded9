use crate::error::{ConfigError, Result, TransformError};
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Finds the XML documents to convert below a set of input paths
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include, lowercase without the dot
    extensions: Vec<String>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    /// Maximum directory depth below the root (None = unlimited)
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

fn check_patterns(patterns: &[String]) -> Result<()> {
    let mut builder = OverrideBuilder::new(".");
    for pattern in patterns {
        builder.add(pattern).map_err(|e| {
            TransformError::Config(ConfigError::InvalidValue {
                field: "files.patterns".to_string(),
                value: pattern.clone(),
                reason: e.to_string(),
            })
        })?;
    }
    Ok(())
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|ext| ext.to_lowercase()).collect();
        self
    }

    /// Only keep files matching one of these globs
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        check_patterns(&patterns)?;
        self.include_patterns = patterns;
        Ok(self)
    }

    /// Skip files and directories matching any of these globs
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        check_patterns(&patterns)?;
        self.exclude_patterns = patterns;
        Ok(self)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Discover files in the given path (file or directory), sorted by path.
    ///
    /// An explicitly named file is returned as long as its extension matches.
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.walk(path).await?.0)
    }

    /// Discover files below every input, without duplicates
    pub async fn discover_all(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            files.extend(self.discover_files(input).await?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn walk(&self, path: &Path) -> Result<(Vec<PathBuf>, usize)> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_file() {
            let files = if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
            return Ok((files, 0));
        }

        let overrides = self.overrides(path)?;
        let discovery = self.clone();
        let root = path.to_path_buf();
        tokio::task::spawn_blocking(move || discovery.walk_blocking(&root, overrides))
            .await
            .map_err(|e| TransformError::Io(std::io::Error::other(e)))
    }

    fn overrides(&self, root: &Path) -> Result<Override> {
        let mut builder = OverrideBuilder::new(root);
        let invalid = |pattern: &str, e: ignore::Error| {
            TransformError::Config(ConfigError::InvalidValue {
                field: "files.patterns".to_string(),
                value: pattern.to_string(),
                reason: e.to_string(),
            })
        };
        for pattern in &self.include_patterns {
            builder.add(pattern).map_err(|e| invalid(pattern, e))?;
        }
        for pattern in &self.exclude_patterns {
            let negated = format!("!{}", pattern);
            builder.add(&negated).map_err(|e| invalid(pattern, e))?;
        }
        builder.build().map_err(|e| invalid("<overrides>", e))
    }

    fn walk_blocking(&self, root: &Path, overrides: Override) -> (Vec<PathBuf>, usize) {
        let mut walker = WalkBuilder::new(root);
        walker
            .standard_filters(false)
            .follow_links(self.follow_symlinks)
            .overrides(overrides)
            // The walker counts the root itself as depth 0
            .max_depth(self.max_depth.map(|depth| depth + 1));

        let mut files = Vec::new();
        let mut errors = 0;
        for entry in walker.build() {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|kind| kind.is_file());
                    if is_file && self.should_process(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    errors += 1;
                    warn!(error = %e, "skipping unreadable path");
                }
            }
        }
        files.sort();
        debug!(root = %root.display(), files = files.len(), errors, "discovered files");
        (files, errors)
    }

    /// Check a file's extension against the configured list
    pub fn should_process(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    pub async fn get_discovery_stats(&self, root: &Path) -> Result<DiscoveryStats> {
        let (files, errors) = self.walk(root).await?;
        Ok(DiscoveryStats {
            files_found: files.len(),
            errors,
        })
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone)]
pub struct DiscoveryStats {
    pub files_found: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;
    use tokio::fs;

    async fn create_test_directory() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("subdir1")).await.unwrap();
        fs::create_dir_all(root.join("subdir2/nested")).await.unwrap();

        fs::write(root.join("file1.xml"), "<a/>").await.unwrap();
        fs::write(root.join("file2.XML"), "<a/>").await.unwrap();
        fs::write(root.join("file3.txt"), "text file").await.unwrap();
        fs::write(root.join("subdir1/nested.xml"), "<a/>").await.unwrap();
        fs::write(root.join("subdir2/nested/deep.xml"), "<a/>").await.unwrap();
        fs::write(root.join("subdir2/nested/other.msg"), "<a/>").await.unwrap();

        temp_dir
    }

    fn names(files: &[PathBuf]) -> HashSet<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_discover_xml_files() {
        let temp_dir = create_test_directory().await;
        let files = FileDiscovery::new()
            .discover_files(temp_dir.path())
            .await
            .unwrap();

        assert_eq!(files.len(), 4);
        let file_names = names(&files);
        assert!(file_names.contains("file1.xml"));
        assert!(file_names.contains("file2.XML"));
        assert!(file_names.contains("nested.xml"));
        assert!(file_names.contains("deep.xml"));

        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[tokio::test]
    async fn test_discover_multiple_extensions() {
        let temp_dir = create_test_directory().await;
        let discovery =
            FileDiscovery::new().with_extensions(vec!["xml".to_string(), "MSG".to_string()]);

        let files = discovery.discover_files(temp_dir.path()).await.unwrap();
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn test_max_depth_limit() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new().with_max_depth(Some(1));

        let files = discovery.discover_files(temp_dir.path()).await.unwrap();

        // root files, then subdir1/nested.xml; subdir2/nested/deep.xml is too deep
        assert_eq!(files.len(), 3);
        assert!(!names(&files).contains("deep.xml"));
    }

    #[tokio::test]
    async fn test_include_patterns() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new()
            .with_include_patterns(vec!["**/nested*".to_string()])
            .unwrap();

        let files = discovery.discover_files(temp_dir.path()).await.unwrap();
        assert_eq!(names(&files), HashSet::from(["nested.xml".to_string()]));
    }

    #[tokio::test]
    async fn test_exclude_patterns() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new()
            .with_exclude_patterns(vec!["subdir2".to_string()])
            .unwrap();

        let files = discovery.discover_files(temp_dir.path()).await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(!names(&files).contains("deep.xml"));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = FileDiscovery::new().with_include_patterns(vec!["a[".to_string()]);
        assert!(matches!(result, Err(TransformError::Config(_))));
    }

    #[tokio::test]
    async fn test_should_process() {
        let discovery = FileDiscovery::new();

        assert!(discovery.should_process(Path::new("test.xml")));
        assert!(discovery.should_process(Path::new("TEST.Xml")));
        assert!(!discovery.should_process(Path::new("test.txt")));
        assert!(!discovery.should_process(Path::new("test")));
    }

    #[tokio::test]
    async fn test_explicit_file_and_discover_all() {
        let temp_dir = create_test_directory().await;
        let discovery = FileDiscovery::new();

        let single = temp_dir.path().join("file1.xml");
        assert_eq!(discovery.discover_files(&single).await.unwrap(), vec![single.clone()]);

        let all = discovery
            .discover_all(&[single.clone(), temp_dir.path().to_path_buf()])
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_discovery_stats() {
        let temp_dir = create_test_directory().await;
        let stats = FileDiscovery::new()
            .get_discovery_stats(temp_dir.path())
            .await
            .unwrap();

        assert_eq!(stats.files_found, 4);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_nonexistent_directory() {
        let result = FileDiscovery::new()
            .discover_files(Path::new("/nonexistent/path"))
            .await;
        assert!(matches!(result, Err(TransformError::Io(_))));
    }
}
