use std::{fmt, path::PathBuf};

use crate::preprocess::PreprocessError;
use crate::stage::Stage;

#[derive(Debug)]
pub enum EngineError {
    /// The `assets/` folder could not be found.
    AssetsNotFound { start_dir: PathBuf },
    /// I/O error reading or writing a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },
    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// An `#include<name>` could not be resolved.
    IncludeNotFound { name: String, line: usize, within: Option<String> },
    /// The include graph contains a cycle.
    CyclicInclude { chain: Vec<String> },
    /// An `#include` line that is not of the form `#include<name>`.
    MalformedInclude { line: usize, within: Option<String> },
    /// One stage failed to compile.
    StageCompile { stage: Stage, log: String },
    /// Both stages compiled but the program failed to link.
    Link { log: String },

    /// Save attempted while the persistence transport is down.
    TransportUnavailable,
    /// The transport accepted the request but failed to carry it out.
    Transport { msg: String },
    /// Save/update called with an empty key.
    NoKeySpecified,
    /// No shader or library group registered under this key.
    UnknownRecord { key: String },
    /// Save refused because the record has an unresolved compile error.
    HasError { key: String },
    /// A file-change notification for a path no record owns.
    UnknownPath { path: PathBuf },
    /// The file-watch service rejected a request.
    Watch { msg: String },
}

impl EngineError {
    /// Short status code, stable across releases (used by host status lines).
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::AssetsNotFound { .. } => "ERR_ASSETS_NOT_FOUND",
            EngineError::Io { .. } => "ERR_IO",
            EngineError::Json { .. } => "ERR_JSON",
            EngineError::InvalidConfig { .. } => "ERR_INVALID_CONFIG",
            EngineError::IncludeNotFound { .. } => "ERR_INCLUDE_NOT_FOUND",
            EngineError::CyclicInclude { .. } => "ERR_CYCLIC_INCLUDE",
            EngineError::MalformedInclude { .. } => "ERR_MALFORMED_INCLUDE",
            EngineError::StageCompile { .. } => "ERR_STAGE_COMPILE",
            EngineError::Link { .. } => "ERR_LINK",
            EngineError::TransportUnavailable => "ERR_SERVER_UNAVAILABLE",
            EngineError::Transport { .. } => "ERR_TRANSPORT",
            EngineError::NoKeySpecified => "ERR_NO_KEY_SPECIFIED",
            EngineError::UnknownRecord { .. } => "ERR_NO_SHADER_RECORD",
            EngineError::HasError { .. } => "ERR_SHADER_HAS_ERROR",
            EngineError::UnknownPath { .. } => "ERR_UNKNOWN_PATH",
            EngineError::Watch { .. } => "ERR_WATCH",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AssetsNotFound { start_dir } => {
                write!(f, "Could not locate assets/ starting from {}", start_dir.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
            EngineError::IncludeNotFound { name, line, within } => match within {
                Some(lib) => write!(f, "include <{name}> not found (library '{lib}', line {line})"),
                None => write!(f, "include <{name}> not found (line {line})"),
            },
            EngineError::CyclicInclude { chain } => {
                write!(f, "cyclic include: {}", chain.join(" -> "))
            }
            EngineError::MalformedInclude { line, within } => match within {
                Some(lib) => write!(f, "malformed #include (library '{lib}', line {line}), expected #include<name>"),
                None => write!(f, "malformed #include (line {line}), expected #include<name>"),
            },
            EngineError::StageCompile { stage, log } => {
                write!(f, "{} shader compile error:\n{}", stage.name(), log)
            }
            EngineError::Link { log } => write!(f, "program link error:\n{log}"),
            EngineError::TransportUnavailable => write!(f, "server is unavailable"),
            EngineError::Transport { msg } => write!(f, "transport error: {msg}"),
            EngineError::NoKeySpecified => write!(f, "no key specified"),
            EngineError::UnknownRecord { key } => write!(f, "'{key}' is not on record"),
            EngineError::HasError { key } => {
                write!(f, "'{key}' has unresolved compile errors, fix errors first")
            }
            EngineError::UnknownPath { path } => {
                write!(f, "no shader or library is bound to {}", path.display())
            }
            EngineError::Watch { msg } => write!(f, "file watch error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PreprocessError> for EngineError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::IncludeNotFound { name, line, within } => {
                EngineError::IncludeNotFound { name, line, within }
            }
            PreprocessError::CyclicInclude { chain } => EngineError::CyclicInclude { chain },
            PreprocessError::MalformedInclude { line, within } => {
                EngineError::MalformedInclude { line, within }
            }
        }
    }
}
