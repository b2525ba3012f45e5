use std::fmt;
use std::path::{Path, PathBuf};

use crate::backend::CompileBackend;
use crate::compile::ErrorRecord;
use crate::stage::{Stage, StageMap};
use crate::strategy::CompileStrategy;

/// Lifecycle of a shader record.
///
/// `Editing` means a recompilation is scheduled; `Recompiling` only exists while
/// the strategy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Clean,
    Editing,
    Recompiling,
    Error,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordState::Clean => "clean",
            RecordState::Editing => "editing",
            RecordState::Recompiling => "recompiling",
            RecordState::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ShaderOptions {
    /// Files backing each stage. Watched and saved back to unless `readonly`.
    pub paths: StageMap<Option<PathBuf>>,
    pub readonly: bool,
    /// Compile as part of registration. When false the record stays on the
    /// fallback program until its first edit or an explicit recompile.
    pub compile_on_register: bool,
}

impl Default for ShaderOptions {
    fn default() -> Self {
        Self {
            paths: StageMap::default(),
            readonly: false,
            compile_on_register: true,
        }
    }
}

impl ShaderOptions {
    pub fn with_paths(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.paths = StageMap::new(Some(vertex.into()), Some(fragment.into()));
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn compile_on_register(mut self, compile: bool) -> Self {
        self.compile_on_register = compile;
        self
    }
}

/// Everything the engine knows about one registered shader.
pub struct ShaderRecord<B: CompileBackend> {
    pub(crate) key: String,
    pub(crate) stages: StageMap<String>,
    pub(crate) originals: StageMap<String>,
    pub(crate) program: Option<B::Program>,
    pub(crate) errors: ErrorRecord,
    pub(crate) state: RecordState,
    /// Where the record goes back to when a compilation attempt is abandoned.
    pub(crate) settled: RecordState,
    pub(crate) strategy: Box<dyn CompileStrategy<B>>,
    pub(crate) options: ShaderOptions,
}

impl<B: CompileBackend> ShaderRecord<B> {
    pub(crate) fn new(
        key: String,
        stages: StageMap<String>,
        strategy: Box<dyn CompileStrategy<B>>,
        options: ShaderOptions,
    ) -> Self {
        Self {
            key,
            originals: stages.clone(),
            stages,
            program: None,
            errors: ErrorRecord::default(),
            state: RecordState::Clean,
            settled: RecordState::Clean,
            strategy,
            options,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self, stage: Stage) -> &str {
        &self.stages[stage]
    }

    pub fn sources(&self) -> &StageMap<String> {
        &self.stages
    }

    /// Text as registered, before any edit.
    pub fn original(&self, stage: Stage) -> &str {
        &self.originals[stage]
    }

    /// The record's own last good program. `None` while the fallback stands in.
    pub fn program(&self) -> Option<B::Program> {
        self.program
    }

    pub fn errors(&self) -> &ErrorRecord {
        &self.errors
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn path(&self, stage: Stage) -> Option<&Path> {
        self.options.paths[stage].as_deref()
    }

    pub fn options(&self) -> &ShaderOptions {
        &self.options
    }

    pub fn is_readonly(&self) -> bool {
        self.options.readonly
    }

    pub(crate) fn watched_paths(&self) -> Vec<PathBuf> {
        if self.options.readonly {
            return Vec::new();
        }
        self.options.paths.iter().filter_map(|(_, p)| p.clone()).collect()
    }

    /// Every stage loaded from `path`.
    pub(crate) fn stages_for_path(&self, path: &Path) -> Vec<Stage> {
        self.options
            .paths
            .iter()
            .filter(|(_, p)| p.as_deref() == Some(path))
            .map(|(stage, _)| stage)
            .collect()
    }
}

impl<B: CompileBackend> fmt::Debug for ShaderRecord<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderRecord")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("program", &self.program)
            .field("errors", &self.errors)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
