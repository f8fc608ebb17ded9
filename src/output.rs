//! Rendering of conversion results
//!
//! Records go to stdout (one JSON document per line, or indented), failures and the
//! summary go to stderr.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use serde::Serialize;

use crate::batch::{ConversionResults, ConversionStatus, FileConversionResult};
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::record::Value;

#[derive(Serialize)]
struct RecordLine<'a> {
    path: String,
    record: &'a Value,
}

pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: io::stderr().is_terminal(),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Write records to `out`, failures and the summary to `err`
    pub fn write_results(
        &self,
        results: &ConversionResults,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> io::Result<()> {
        for result in &results.file_results {
            if let Some(line) = self.format_record(result)? {
                writeln!(out, "{}", line)?;
            }
            if let Some(line) = self.format_file_result(result) {
                writeln!(err, "{}", line)?;
            }
        }

        match self.verbosity {
            VerbosityLevel::Quiet => {
                if results.has_failures() {
                    writeln!(
                        err,
                        "Rejected: {} Errors: {}",
                        results.rejected_files, results.error_files
                    )?;
                }
            }
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                write!(err, "{}", self.format_summary(results))?;
            }
        }
        Ok(())
    }

    /// The JSON rendering of a converted file, if this format prints records
    pub fn format_record(&self, result: &FileConversionResult) -> io::Result<Option<String>> {
        let Some(record) = result.record() else {
            return Ok(None);
        };
        let document = RecordLine {
            path: result.path.display().to_string(),
            record: record.value(),
        };
        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string(&document),
            OutputFormat::Pretty => serde_json::to_string_pretty(&document),
            OutputFormat::Summary => return Ok(None),
        };
        rendered.map(Some).map_err(io::Error::other)
    }

    /// A status line for stderr; converted files only get one when verbose
    pub fn format_file_result(&self, result: &FileConversionResult) -> Option<String> {
        let path = result.path.display();
        let duration = format_duration(result.duration);
        match &result.status {
            ConversionStatus::Converted(_) if self.verbosity >= VerbosityLevel::Verbose => Some(
                format!("{}  {} ({})", self.colorize("✓ CONVERTED", "32"), path, duration),
            ),
            ConversionStatus::Converted(_) => None,
            ConversionStatus::Rejected { message } => Some(format!(
                "{}  {} ({}) - {}",
                self.colorize("✗ REJECTED", "31"),
                path,
                duration,
                message
            )),
            ConversionStatus::Error { message } => Some(format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path,
                duration,
                message
            )),
        }
    }

    pub fn format_summary(&self, results: &ConversionResults) -> String {
        let mut output = String::new();
        output.push_str("Conversion Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Converted:", "32"),
            results.converted_files
        ));
        if results.rejected_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Rejected:", "31"),
                results.rejected_files
            ));
        }
        if results.error_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_files
            ));
        }
        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.total_duration)
        ));

        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  Throughput: {:.1} files/sec on {} threads\n",
                results.throughput(),
                results.threads
            ));
        }
        output
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Schema, SchemaKind, Struct, StructSchemaBuilder, StructuredRecord};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn record() -> StructuredRecord {
        let schema = Arc::new(
            StructSchemaBuilder::new("Note")
                .field("to", Schema::new(SchemaKind::String))
                .unwrap()
                .build(),
        );
        let mut value = Struct::new(schema).unwrap();
        value.put("to", Value::String("Ann".to_string())).unwrap();
        StructuredRecord::from_struct(value).unwrap()
    }

    fn results() -> ConversionResults {
        ConversionResults::aggregate(
            vec![
                FileConversionResult {
                    path: PathBuf::from("a.xml"),
                    status: ConversionStatus::Converted(record()),
                    duration: Duration::from_millis(3),
                },
                FileConversionResult {
                    path: PathBuf::from("b.xml"),
                    status: ConversionStatus::Rejected {
                        message: "XML parse error: malformed XML".to_string(),
                    },
                    duration: Duration::from_millis(1),
                },
            ],
            Duration::from_millis(10),
            2,
        )
    }

    fn render(output: &Output) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        output.write_results(&results(), &mut out, &mut err).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_json_lines() {
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Json).with_colors(false);
        let (out, err) = render(&output);

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["path"], "a.xml");
        assert_eq!(parsed["record"]["to"], "Ann");

        assert!(err.contains("✗ REJECTED  b.xml"));
        assert!(err.contains("Conversion Summary:"));
        assert!(err.contains("Success rate: 50.0%"));
    }

    #[test]
    fn test_summary_prints_no_records() {
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Summary).with_colors(false);
        let (out, err) = render(&output);
        assert!(out.is_empty());
        assert!(err.contains("Converted: 1"));
        assert!(err.contains("Rejected: 1"));
    }

    #[test]
    fn test_quiet_reports_failures_only() {
        let output = Output::new(VerbosityLevel::Quiet, OutputFormat::Pretty).with_colors(false);
        let (out, err) = render(&output);
        assert!(out.contains("\n  \"path\""));
        assert!(!err.contains("Conversion Summary"));
        assert!(err.contains("Rejected: 1 Errors: 0"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
