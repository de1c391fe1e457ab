use std::path::PathBuf;
use thiserror::Error;

use crate::tools::ToolKind;

#[derive(Error, Debug)]
pub enum RigError {
    #[error("{tool} not found at {}", path.display())]
    ToolMissing { tool: ToolKind, path: PathBuf },

    #[error("Failed to start {}: {source}", program.display())]
    SpawnFailure {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}", describe_exit(*code))]
    NonZeroExit { program: String, code: Option<i32> },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unexpected tool output: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// The three outcomes a front end reports differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    ToolMissing,
    Cancelled,
    Failed,
}

impl RigError {
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolMissing { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Self::ToolMissing { .. } => FailureCategory::ToolMissing,
            Self::Cancelled => FailureCategory::Cancelled,
            _ => FailureCategory::Failed,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, RigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let missing = RigError::ToolMissing {
            tool: ToolKind::Transcoder,
            path: PathBuf::from("/opt/ffmpeg"),
        };
        assert!(missing.is_tool_missing());
        assert_eq!(missing.category(), FailureCategory::ToolMissing);
        assert_eq!(RigError::Cancelled.category(), FailureCategory::Cancelled);

        let exit = RigError::NonZeroExit {
            program: "yt-dlp".to_string(),
            code: Some(2),
        };
        assert_eq!(exit.category(), FailureCategory::Failed);
        assert_eq!(exit.to_string(), "yt-dlp exited with exit code 2");
    }

    #[test]
    fn test_signal_exit_message() {
        let exit = RigError::NonZeroExit {
            program: "ffmpeg".to_string(),
            code: None,
        };
        assert!(exit.to_string().contains("terminated by signal"));
    }
}
