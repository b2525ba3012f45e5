use std::path::PathBuf;

use crate::compile::ErrorRecord;

/// Notifications for host UIs, drained with `Engine::drain_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A shader compiled and its new program is live.
    ShaderCompileOk { key: String },

    /// A shader failed to compile; the previous program stays live.
    ShaderCompileErr { key: String, errors: ErrorRecord },

    /// The shader has never compiled and is drawn with the fallback program.
    FallbackInUse { key: String },

    /// A user-supplied strategy callback failed.
    StrategyFailed { key: String, msg: String },

    /// A watched file changed on disk and its new text was taken in.
    SourceReloaded { path: PathBuf },
}
