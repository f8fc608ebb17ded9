//! Batch conversion of many documents against one configured transform

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, TransformError};
use crate::record::StructuredRecord;
use crate::transform::{FieldInput, FromXml};

/// Outcome of converting one file
#[derive(Debug, Clone)]
pub enum ConversionStatus {
    Converted(StructuredRecord),
    /// The document did not bind or map; the message names the cause
    Rejected { message: String },
    /// The file could not be read, or the transform could not run
    Error { message: String },
}

impl ConversionStatus {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionStatus::Converted(_))
    }
}

#[derive(Debug, Clone)]
pub struct FileConversionResult {
    pub path: PathBuf,
    pub status: ConversionStatus,
    pub duration: Duration,
}

impl FileConversionResult {
    fn from_outcome(path: PathBuf, outcome: Result<StructuredRecord>, duration: Duration) -> Self {
        let status = match outcome {
            Ok(record) => ConversionStatus::Converted(record),
            Err(e) if e.is_record_error() => ConversionStatus::Rejected {
                message: e.to_string(),
            },
            Err(e) => ConversionStatus::Error {
                message: e.to_string(),
            },
        };
        Self {
            path,
            status,
            duration,
        }
    }

    pub fn record(&self) -> Option<&StructuredRecord> {
        match &self.status {
            ConversionStatus::Converted(record) => Some(record),
            _ => None,
        }
    }
}

/// Aggregated results of one batch
#[derive(Debug, Clone)]
pub struct ConversionResults {
    pub total_files: usize,
    pub converted_files: usize,
    pub rejected_files: usize,
    pub error_files: usize,
    /// Wall-clock time of the whole batch
    pub total_duration: Duration,
    pub threads: usize,
    pub file_results: Vec<FileConversionResult>,
}

impl ConversionResults {
    pub fn aggregate(
        file_results: Vec<FileConversionResult>,
        total_duration: Duration,
        threads: usize,
    ) -> Self {
        let mut converted_files = 0;
        let mut rejected_files = 0;
        let mut error_files = 0;
        for result in &file_results {
            match result.status {
                ConversionStatus::Converted(_) => converted_files += 1,
                ConversionStatus::Rejected { .. } => rejected_files += 1,
                ConversionStatus::Error { .. } => error_files += 1,
            }
        }

        Self {
            total_files: file_results.len(),
            converted_files,
            rejected_files,
            error_files,
            total_duration,
            threads,
            file_results,
        }
    }

    pub fn all_converted(&self) -> bool {
        self.converted_files == self.total_files && self.total_files > 0
    }

    pub fn has_failures(&self) -> bool {
        self.rejected_files > 0 || self.error_files > 0
    }

    /// Percentage of files converted
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.converted_files as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn throughput(&self) -> f64 {
        let seconds = self.total_duration.as_secs_f64();
        if seconds > 0.0 {
            self.total_files as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Converts files in parallel on a dedicated rayon pool
pub struct BatchConverter<'a> {
    transform: &'a FromXml,
    threads: usize,
}

impl<'a> BatchConverter<'a> {
    pub fn new(transform: &'a FromXml, threads: usize) -> Self {
        Self {
            transform,
            threads: threads.max(1),
        }
    }

    /// Convert every file; results keep the order of `files`
    pub fn convert_files(&self, files: &[PathBuf]) -> Result<ConversionResults> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|index| format!("from-xml-{}", index))
            .build()
            .map_err(|e| TransformError::Io(std::io::Error::other(e)))?;

        let started = Instant::now();
        let file_results: Vec<_> = pool.install(|| {
            files
                .par_iter()
                .map(|path| self.convert_file(path))
                .collect()
        });

        let results = ConversionResults::aggregate(file_results, started.elapsed(), self.threads);
        info!(
            files = results.total_files,
            converted = results.converted_files,
            rejected = results.rejected_files,
            errors = results.error_files,
            threads = self.threads,
            "batch finished"
        );
        Ok(results)
    }

    pub fn convert_file(&self, path: &Path) -> FileConversionResult {
        let started = Instant::now();
        let outcome = std::fs::read(path)
            .map_err(TransformError::from)
            .and_then(|bytes| self.transform.transform(FieldInput::Bytes(&bytes)));
        let duration = started.elapsed();
        debug!(path = %path.display(), ok = outcome.is_ok(), ?duration, "converted file");
        FileConversionResult::from_outcome(path.to_path_buf(), outcome, duration)
    }
}
