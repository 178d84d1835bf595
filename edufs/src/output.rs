//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use edufs_core::{NodeInfo, PublishResult, RootSource, UploadResult};
use serde::Serialize;
use std::io::{self, Write};

/// Exit status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    /// A root was produced, but some files or the root itself were not pinned.
    Partial,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Error => 1,
            Status::Partial => 2,
        }
    }
}

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error and its context chain.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `status` command.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub success: bool,
    pub result_code: u8,
    pub endpoint: String,
    #[serde(flatten)]
    pub node: NodeInfo,
}

/// Naming record bound during `publish`.
#[derive(Debug, Clone, Serialize)]
pub struct NameBinding {
    pub key: String,
    pub name: String,
    pub value: String,
    pub url: String,
}

/// Output for `add` and `publish` commands.
#[derive(Debug, Serialize)]
pub struct PublishOutput {
    pub success: bool,
    pub result_code: u8,
    pub status: Status,
    pub root_cid: String,
    pub root_source: RootSource,
    pub url: String,
    pub published: usize,
    pub upload_failures: usize,
    pub pin_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_pin_error: Option<String>,
    pub files: Vec<UploadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<NameBinding>,
}

impl PublishOutput {
    pub fn new(result: PublishResult, url: String) -> Self {
        let status = if result.is_complete() {
            Status::Success
        } else {
            Status::Partial
        };
        Self {
            success: true,
            result_code: status.code(),
            status,
            root_cid: result.root_cid.to_string(),
            root_source: result.root_source,
            url,
            published: result.published_count(),
            upload_failures: result.upload_failures(),
            pin_failures: result.pin_failures(),
            root_pin_error: result.root_pin_error,
            files: result.per_file,
            name: None,
        }
    }

    /// Human-readable summary.
    pub fn to_text(&self) -> String {
        let mut text = String::new();

        for file in &self.files {
            match (file.cid(), file.error()) {
                (Some(cid), None) => {
                    text.push_str(&format!("{} {}\n", cid, file.entry.relative_path))
                }
                (Some(cid), Some(err)) => text.push_str(&format!(
                    "{} {} (not pinned: {})\n",
                    cid, file.entry.relative_path, err
                )),
                (None, err) => text.push_str(&format!(
                    "FAILED {}: {}\n",
                    file.entry.relative_path,
                    err.unwrap_or("unknown error")
                )),
            }
        }

        text.push_str(&format!("Root: {}\n", self.root_cid));
        if let Some(err) = &self.root_pin_error {
            text.push_str(&format!("Root not pinned: {}\n", err));
        }
        text.push_str(&format!("URL: {}\n", self.url));
        if self.root_source == RootSource::FirstEntry {
            text.push_str("Note: root is the first uploaded file, not the whole directory\n");
        }
        if self.status == Status::Partial && self.published < self.files.len() {
            text.push_str(&format!(
                "Published {} of {} files ({} upload failures, {} pin failures)\n",
                self.published,
                self.files.len(),
                self.upload_failures,
                self.pin_failures
            ));
        }
        if let Some(binding) = &self.name {
            text.push_str(&format!("Name: {} -> {}\n", binding.name, binding.value));
            text.push_str(&format!("Name URL: {}\n", binding.url));
        }

        text
    }
}

/// Output for `add` and `publish` when the deadline stopped the publish.
#[derive(Debug, Serialize)]
pub struct CancelledOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
    pub files: Vec<UploadResult>,
}

impl CancelledOutput {
    pub fn new(error: String, files: Vec<UploadResult>) -> Self {
        Self {
            success: false,
            result_code: Status::Error.code(),
            error,
            files,
        }
    }

    /// Human-readable report of the files finished before cancellation.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for file in &self.files {
            match file.cid() {
                Some(cid) => text.push_str(&format!("{} {}\n", cid, file.entry.relative_path)),
                None => text.push_str(&format!(
                    "FAILED {}: {}\n",
                    file.entry.relative_path,
                    file.error().unwrap_or("unknown error")
                )),
            }
        }
        text.push_str(&format!("{}; no root identifier was produced\n", self.error));
        text
    }
}

/// Output for `download` command.
#[derive(Debug, Serialize)]
pub struct DownloadOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: String,
    pub destination: String,
    pub bytes: u64,
}

/// Output for `resolve` command.
#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
    pub cid: String,
    pub url: String,
}
