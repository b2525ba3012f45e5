//! Shader and library registries plus the edit -> debounce -> recompile loop.
//!
//! The engine is single-threaded and never reads the clock: every entry point
//! that can start or run a timer takes `now`. Hosts call `tick` from their frame
//! loop (or sleep until `next_deadline`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::backend::CompileBackend;
use crate::compile::{compile_program, fallback_sources, Compiled};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::library::{LibGroupRecord, LibraryEntry, LibraryMap};
use crate::preprocess::referenced_libraries;
use crate::protocol::Message;
use crate::record::{RecordState, ShaderOptions, ShaderRecord};
use crate::scheduler::Debouncer;
use crate::stage::{Stage, StageMap};
use crate::strategy::CompileStrategy;
use crate::watch::FileWatch;

/// Which shaders a library edit recompiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryFanout {
    /// Every registered shader.
    #[default]
    All,
    /// Only shaders that include the library, directly or through another library.
    Dependents,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Debounce after an edit to a record that compiled cleanly last time.
    pub recompile_delay: Duration,
    /// Debounce after an edit to a record currently in error.
    pub recompile_delay_error: Duration,
    /// Destination for saves of records without configured paths.
    pub output_dir: PathBuf,
    pub library_fanout: LibraryFanout,
    /// `#version` used for the fallback program.
    pub glsl_version: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recompile_delay: Duration::from_millis(100),
            recompile_delay_error: Duration::from_millis(50),
            output_dir: PathBuf::from("saved_editor_shaders"),
            library_fanout: LibraryFanout::All,
            glsl_version: "300 es".to_string(),
        }
    }
}

pub struct Engine<B: CompileBackend> {
    backend: B,
    settings: EngineSettings,
    libs: LibraryMap,
    groups: Vec<LibGroupRecord>,
    /// Registration order.
    shaders: Vec<ShaderRecord<B>>,
    debounce: Debouncer<String>,
    fallback: Option<B::Program>,
    watcher: Box<dyn FileWatch>,
    events: Vec<EngineEvent>,
}

impl<B: CompileBackend> Engine<B> {
    pub fn new(backend: B, watcher: Box<dyn FileWatch>, settings: EngineSettings) -> Self {
        Self {
            backend,
            settings,
            libs: LibraryMap::new(),
            groups: Vec::new(),
            shaders: Vec::new(),
            debounce: Debouncer::new(),
            fallback: None,
            watcher,
            events: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Register (or replace) a shader and compile it unless told not to.
    ///
    /// A record that fails its first compilation draws with the fallback program.
    pub fn register_shader(
        &mut self,
        key: impl Into<String>,
        sources: StageMap<String>,
        strategy: Box<dyn CompileStrategy<B>>,
        options: ShaderOptions,
    ) -> Result<(), EngineError> {
        let key = key.into();
        if key.is_empty() {
            return Err(EngineError::NoKeySpecified);
        }

        let compile_now = options.compile_on_register;
        let record = ShaderRecord::new(key.clone(), sources, strategy, options);

        let slot = self.shader_index(&key);
        if let Some(idx) = slot {
            self.debounce.cancel(&key);
            let old_paths = self.shaders[idx].watched_paths();
            self.unwatch(&old_paths);
            if let Some(p) = self.shaders[idx].program.take() {
                self.backend.delete_program(p);
            }
        }
        self.watch(&record.watched_paths());

        match slot {
            Some(idx) => {
                self.shaders[idx] = record;
                logi!("SHADER", "re-registered '{key}'");
            }
            None => {
                self.shaders.push(record);
                logi!("SHADER", "registered '{key}'");
            }
        }
        self.rebuild_assoc();

        if compile_now {
            self.recompile(&key)?;
        } else {
            self.use_fallback(&key);
        }
        Ok(())
    }

    /// Register (or replace) a group of libraries. Library keys are global: a key
    /// already provided by another group is taken over.
    pub fn register_libs(
        &mut self,
        group: impl Into<String>,
        entries: Vec<LibraryEntry>,
        readonly: bool,
    ) -> Result<(), EngineError> {
        let group = group.into();
        if group.is_empty() {
            return Err(EngineError::NoKeySpecified);
        }

        if let Some(idx) = self.group_index(&group) {
            let old = self.groups.remove(idx);
            if !old.readonly {
                self.unwatch(&old.paths().cloned().collect::<Vec<_>>());
            }
            for lib in &old.libraries {
                self.libs.remove(&lib.key);
                // Another group may still provide the key; the newest one wins.
                if let Some(other) = self.groups.iter().rev().find_map(|g| g.library(&lib.key)) {
                    self.libs.insert(other.key.clone(), other.source.clone());
                }
            }
        }

        for entry in &entries {
            if let Some(owner) = self.groups.iter().find(|g| g.library(&entry.key).is_some()) {
                logw!(
                    "LIBS",
                    "library '{}' from group '{}' replaces the one from group '{}'",
                    entry.key,
                    group,
                    owner.key
                );
            }
            self.libs.insert(entry.key.clone(), entry.source.clone());
        }

        let record = LibGroupRecord::new(group.clone(), entries, readonly);
        if !readonly {
            self.watch(&record.paths().cloned().collect::<Vec<_>>());
        }
        logi!("LIBS", "registered group '{group}' ({} libraries)", record.libraries.len());
        self.groups.push(record);
        self.rebuild_assoc();
        Ok(())
    }

    /// Swap the compilation strategy of a record. Takes effect on the next compile.
    pub fn update_strategy(
        &mut self,
        key: &str,
        strategy: Box<dyn CompileStrategy<B>>,
    ) -> Result<(), EngineError> {
        let idx = self.require_shader(key)?;
        self.shaders[idx].strategy = strategy;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    /// Replace one stage's text and (re)start the record's debounce timer.
    ///
    /// Returns false when the text is unchanged (nothing is scheduled).
    pub fn edit_stage(
        &mut self,
        key: &str,
        stage: Stage,
        text: impl Into<String>,
        now: Instant,
    ) -> Result<bool, EngineError> {
        let idx = self.require_shader(key)?;
        let text = text.into();
        if self.shaders[idx].stages[stage] == text {
            return Ok(false);
        }
        self.shaders[idx].stages[stage] = text;
        self.mark_editing(idx, now);
        self.rebuild_assoc();
        Ok(true)
    }

    /// Replace a library's text and schedule the shaders it affects.
    pub fn edit_library(
        &mut self,
        lib_key: &str,
        text: impl Into<String>,
        now: Instant,
    ) -> Result<bool, EngineError> {
        if lib_key.is_empty() {
            return Err(EngineError::NoKeySpecified);
        }
        let Some(entry) = self.groups.iter_mut().rev().find_map(|g| g.library_mut(lib_key)) else {
            return Err(EngineError::UnknownRecord { key: lib_key.to_string() });
        };
        let text = text.into();
        if entry.source == text {
            return Ok(false);
        }
        entry.source = text.clone();
        self.libs.insert(lib_key, text);

        let targets: Vec<usize> = match self.settings.library_fanout {
            LibraryFanout::All => (0..self.shaders.len()).collect(),
            LibraryFanout::Dependents => self
                .shaders
                .iter()
                .enumerate()
                .filter(|(_, r)| references(r, &self.libs).contains(lib_key))
                .map(|(i, _)| i)
                .collect(),
        };
        for idx in targets {
            self.mark_editing(idx, now);
        }
        self.rebuild_assoc();
        Ok(true)
    }

    /// A watched file changed on disk. Treated exactly like a local edit of every
    /// stage and library loaded from `path`.
    pub fn file_changed(
        &mut self,
        path: &Path,
        content: impl Into<String>,
        now: Instant,
    ) -> Result<bool, EngineError> {
        let content = content.into();
        let stage_hits: Vec<(String, Stage)> = self
            .shaders
            .iter()
            .flat_map(|r| r.stages_for_path(path).into_iter().map(|stage| (r.key.clone(), stage)))
            .collect();
        let lib_hit = self.library_for_path(path);
        if stage_hits.is_empty() && lib_hit.is_none() {
            return Err(EngineError::UnknownPath { path: path.to_path_buf() });
        }

        let mut changed = false;
        for (key, stage) in stage_hits {
            changed |= self.edit_stage(&key, stage, content.clone(), now)?;
        }
        if let Some(lib_key) = lib_hit {
            changed |= self.edit_library(&lib_key, content, now)?;
        }

        if changed {
            logi!("WATCH", "reloaded {}", path.display());
            self.events.push(EngineEvent::SourceReloaded { path: path.to_path_buf() });
        }
        Ok(changed)
    }

    /// Inbound message from the file server.
    pub fn handle_message(&mut self, msg: Message, now: Instant) -> Result<(), EngineError> {
        match msg {
            Message::UpdateFile { file, content } => {
                self.file_changed(&file, content, now)?;
            }
            Message::WatchFiles { files } => {
                self.watcher
                    .watch(&files)
                    .map_err(|e| EngineError::Watch { msg: e.to_string() })?;
            }
            Message::UnwatchFiles { files } => {
                self.watcher
                    .unwatch(&files)
                    .map_err(|e| EngineError::Watch { msg: e.to_string() })?;
            }
            Message::WriteFiles { files } => {
                logw!("SAVE", "ignoring inbound Write_Files request ({} files)", files.len());
            }
        }
        Ok(())
    }

    /// Put a stage back to the text it was registered with.
    pub fn revert_stage(&mut self, key: &str, stage: Stage, now: Instant) -> Result<bool, EngineError> {
        let idx = self.require_shader(key)?;
        let original = self.shaders[idx].originals[stage].clone();
        self.edit_stage(key, stage, original, now)
    }

    /// Put every stage of a record back to its registered text.
    pub fn revert_shader(&mut self, key: &str, now: Instant) -> Result<bool, EngineError> {
        let mut changed = false;
        for stage in Stage::ALL {
            changed |= self.revert_stage(key, stage, now)?;
        }
        Ok(changed)
    }

    /// Put a library back to the text its group was registered with.
    pub fn revert_library(&mut self, lib_key: &str, now: Instant) -> Result<bool, EngineError> {
        let original = self
            .groups
            .iter()
            .rev()
            .find_map(|g| g.original(lib_key))
            .map(str::to_string)
            .ok_or_else(|| EngineError::UnknownRecord { key: lib_key.to_string() })?;
        self.edit_library(lib_key, original, now)
    }

    // ---------------------------------------------------------------------
    // Compilation
    // ---------------------------------------------------------------------

    /// Run every recompilation whose debounce deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let due = self.debounce.take_due(now);
        let mut done = Vec::with_capacity(due.len());
        for key in due {
            match self.recompile(&key) {
                Ok(_) => done.push(key),
                Err(e) => logw!("SHADER", "scheduled recompile of '{key}' dropped: {e}"),
            }
        }
        done
    }

    /// Compile a record now, cancelling any pending debounce for it.
    ///
    /// On success the new program is installed, the strategy's after-callback runs
    /// and only then is the previous program released. On failure the previous
    /// program (or the fallback) stays live and the errors are stored.
    pub fn recompile(&mut self, key: &str) -> Result<RecordState, EngineError> {
        let idx = self.require_shader(key)?;
        self.debounce.cancel(&key.to_string());

        let record = &mut self.shaders[idx];
        record.state = RecordState::Recompiling;
        let outcome = record
            .strategy
            .needs_compilation(&mut self.backend, &record.stages, &self.libs);

        let compiled = match outcome {
            Ok(c) => c,
            Err(e) => {
                record.state = record.settled;
                loge!("SHADER", "compile strategy for '{key}' failed: {e:#}");
                self.events.push(EngineEvent::StrategyFailed { key: key.to_string(), msg: format!("{e:#}") });
                return Ok(record.state);
            }
        };

        match compiled {
            Compiled { program: Some(program), .. } => {
                let previous = record.program.replace(program);
                if let Err(e) = record.strategy.after_compilation(program) {
                    record.program = previous;
                    record.state = record.settled;
                    if previous != Some(program) {
                        self.backend.delete_program(program);
                    }
                    loge!("SHADER", "after-compilation callback for '{key}' failed: {e:#}");
                    self.events.push(EngineEvent::StrategyFailed { key: key.to_string(), msg: format!("{e:#}") });
                    return Ok(record.state);
                }
                if let Some(old) = previous.filter(|old| *old != program) {
                    self.backend.delete_program(old);
                }
                record.errors.clear();
                record.state = RecordState::Clean;
                record.settled = RecordState::Clean;
                logi!("SHADER", "compiled '{key}'");
                self.events.push(EngineEvent::ShaderCompileOk { key: key.to_string() });
                Ok(RecordState::Clean)
            }
            Compiled { program: None, errors } => {
                logw!("SHADER", "'{key}' failed to compile:\n{}", errors.summary());
                record.errors = errors.clone();
                record.state = RecordState::Error;
                record.settled = RecordState::Error;
                let never_compiled = record.program.is_none();
                self.events.push(EngineEvent::ShaderCompileErr { key: key.to_string(), errors });
                if never_compiled {
                    self.use_fallback(key);
                }
                Ok(RecordState::Error)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    /// Drop every record and library group, unwatch their files and release
    /// every program, the fallback included.
    pub fn reset(&mut self) {
        let mut paths: Vec<PathBuf> = self.shaders.iter().flat_map(|r| r.watched_paths()).collect();
        for g in self.groups.iter().filter(|g| !g.readonly) {
            paths.extend(g.paths().cloned());
        }
        self.unwatch(&paths);

        self.debounce.cancel_all();
        for record in self.shaders.drain(..) {
            if let Some(p) = record.program {
                self.backend.delete_program(p);
            }
        }
        if let Some(p) = self.fallback.take() {
            self.backend.delete_program(p);
        }
        self.groups.clear();
        self.libs.clear();
        logi!("SHADER", "engine reset ({} paths unwatched)", paths.len());
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Program to draw for `key`: the record's last good program, else the fallback.
    pub fn program(&self, key: &str) -> Option<B::Program> {
        self.shader(key).and_then(|r| r.program.or(self.fallback))
    }

    pub fn fallback_program(&self) -> Option<B::Program> {
        self.fallback
    }

    pub fn shader(&self, key: &str) -> Option<&ShaderRecord<B>> {
        self.shaders.iter().find(|r| r.key == key)
    }

    /// Keys in registration order.
    pub fn shader_keys(&self) -> impl Iterator<Item = &str> {
        self.shaders.iter().map(|r| r.key.as_str())
    }

    pub fn libraries(&self) -> &LibraryMap {
        &self.libs
    }

    pub fn lib_group(&self, key: &str) -> Option<&LibGroupRecord> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn lib_groups(&self) -> &[LibGroupRecord] {
        &self.groups
    }

    /// Group currently providing `lib_key`.
    pub fn group_of_library(&self, lib_key: &str) -> Option<&LibGroupRecord> {
        self.groups.iter().rev().find(|g| g.library(lib_key).is_some())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.debounce.is_pending(&key.to_string())
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn shader_index(&self, key: &str) -> Option<usize> {
        self.shaders.iter().position(|r| r.key == key)
    }

    fn require_shader(&self, key: &str) -> Result<usize, EngineError> {
        if key.is_empty() {
            return Err(EngineError::NoKeySpecified);
        }
        self.shader_index(key)
            .ok_or_else(|| EngineError::UnknownRecord { key: key.to_string() })
    }

    fn group_index(&self, key: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.key == key)
    }

    fn library_for_path(&self, path: &Path) -> Option<String> {
        self.groups
            .iter()
            .rev()
            .flat_map(|g| g.libraries.iter())
            .find(|l| l.path.as_deref() == Some(path))
            .map(|l| l.key.clone())
    }

    fn mark_editing(&mut self, idx: usize, now: Instant) {
        let record = &mut self.shaders[idx];
        let delay = match record.settled {
            RecordState::Error => self.settings.recompile_delay_error,
            _ => self.settings.recompile_delay,
        };
        record.state = RecordState::Editing;
        self.debounce.schedule(record.key.clone(), now + delay);
    }

    fn use_fallback(&mut self, key: &str) {
        if self.fallback.is_none() {
            let src = fallback_sources(&self.settings.glsl_version);
            let out = compile_program(&mut self.backend, &src[Stage::Vertex], &src[Stage::Fragment]);
            match out.program {
                Some(p) => self.fallback = Some(p),
                None => loge!("SHADER", "fallback program failed to build:\n{}", out.errors.summary()),
            }
        }
        logw!("SHADER", "'{key}' has no working program yet, drawing the fallback");
        self.events.push(EngineEvent::FallbackInUse { key: key.to_string() });
    }

    fn rebuild_assoc(&mut self) {
        for g in &mut self.groups {
            g.assoc_shader_keys.clear();
        }
        for record in &self.shaders {
            let refs = references(record, &self.libs);
            for g in &mut self.groups {
                if g.libraries.iter().any(|l| refs.contains(&l.key)) {
                    g.assoc_shader_keys.insert(record.key.clone());
                }
            }
        }
    }

    fn watch(&mut self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.watcher.watch(paths) {
            logw!("WATCH", "could not watch {} path(s): {e:#}", paths.len());
        }
    }

    fn unwatch(&mut self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.watcher.unwatch(paths) {
            logw!("WATCH", "could not unwatch {} path(s): {e:#}", paths.len());
        }
    }
}

fn references<B: CompileBackend>(record: &ShaderRecord<B>, libs: &LibraryMap) -> BTreeSet<String> {
    record
        .stages
        .iter()
        .flat_map(|(_, text)| referenced_libraries(text, libs))
        .collect()
}
