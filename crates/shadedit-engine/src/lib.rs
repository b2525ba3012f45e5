//! shadedit engine: live editing of GLSL shader programs.
//!
//! Shaders are registered with their stage texts, edited (locally or through
//! file notifications), recompiled after a short debounce and saved back through
//! a transport. The engine owns no window and no GL context; it talks to the
//! graphics API through [`backend::CompileBackend`].

#[macro_use]
pub mod logging;

pub mod assets;
pub mod backend;
pub mod compile;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod loader;
pub mod persist;
pub mod preprocess;
pub mod protocol;
pub mod record;
pub mod scheduler;
pub mod stage;
pub mod strategy;
pub mod validate;
pub mod watch;

pub use engine::{Engine, EngineSettings, LibraryFanout};
pub use error::EngineError;
pub use events::EngineEvent;
pub use record::{RecordState, ShaderOptions, ShaderRecord};
pub use stage::{Stage, StageMap};
