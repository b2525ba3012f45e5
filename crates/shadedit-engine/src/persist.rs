//! Saving edited sources back through a file-server transport.
//!
//! Saves are all-or-nothing per request: every record involved is checked before
//! anything is sent. A save attempted while the transport is down is remembered
//! and retried once when the host reports the connection open again.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::backend::CompileBackend;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::library::LibGroupRecord;
use crate::protocol::{Message, WriteFile};
use crate::record::ShaderRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Connecting,
    Closed,
}

/// Connection-oriented channel to whatever writes files for us.
pub trait Transport {
    fn state(&self) -> ConnectionState;
    fn send(&mut self, msg: &Message) -> anyhow::Result<()>;
    /// Start reconnecting. The host calls `PersistenceBridge::on_connection_opened`
    /// once the connection is up.
    fn reconnect(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Shader(String),
    /// A library group, by group key.
    Libraries(String),
    All,
}

impl fmt::Display for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveTarget::Shader(k) => write!(f, "shader '{k}'"),
            SaveTarget::Libraries(k) => write!(f, "library group '{k}'"),
            SaveTarget::All => f.write_str("everything"),
        }
    }
}

/// Outcome of the last save request, for status lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saved { files: usize },
    /// Waiting for the transport to come back.
    Deferred,
    Refused { code: &'static str, message: String },
}

pub struct PersistenceBridge<T: Transport> {
    transport: T,
    status: SaveStatus,
    retry: Option<SaveTarget>,
}

impl<T: Transport> PersistenceBridge<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, status: SaveStatus::Idle, retry: None }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn pending_retry(&self) -> Option<&SaveTarget> {
        self.retry.as_ref()
    }

    /// Save a shader, a library group or everything. Returns the number of files sent.
    ///
    /// Readonly records succeed without writing anything.
    pub fn save<B: CompileBackend>(
        &mut self,
        target: SaveTarget,
        engine: &Engine<B>,
    ) -> Result<usize, EngineError> {
        match self.try_save(&target, engine) {
            Ok(files) => {
                logi!("SAVE", "saved {target} ({files} files)");
                self.status = SaveStatus::Saved { files };
                Ok(files)
            }
            Err(EngineError::TransportUnavailable) => {
                logw!("SAVE", "server unavailable, {target} will be saved on reconnect");
                if self.transport.state() == ConnectionState::Closed {
                    self.transport.reconnect();
                }
                self.retry = Some(target);
                self.status = SaveStatus::Deferred;
                Err(EngineError::TransportUnavailable)
            }
            Err(e) => {
                logw!("SAVE", "refused to save {target}: {e}");
                self.status = SaveStatus::Refused { code: e.code(), message: e.to_string() };
                Err(e)
            }
        }
    }

    /// The transport is open again: retry the deferred save, if any, once.
    pub fn on_connection_opened<B: CompileBackend>(
        &mut self,
        engine: &Engine<B>,
    ) -> Option<Result<usize, EngineError>> {
        let target = self.retry.take()?;
        logi!("SAVE", "connection open, retrying save of {target}");
        Some(self.save(target, engine))
    }

    fn try_save<B: CompileBackend>(
        &mut self,
        target: &SaveTarget,
        engine: &Engine<B>,
    ) -> Result<usize, EngineError> {
        let output_dir = &engine.settings().output_dir;
        let batches: Vec<Vec<WriteFile>> = match target {
            SaveTarget::Shader(key) => {
                let record = checked_shader(engine, key)?;
                vec![shader_files(record, output_dir)]
            }
            SaveTarget::Libraries(key) => {
                let group = checked_group(engine, key)?;
                vec![library_files(group, output_dir)]
            }
            SaveTarget::All => {
                let mut batches = Vec::new();
                for key in engine.shader_keys() {
                    batches.push(shader_files(checked_shader(engine, key)?, output_dir));
                }
                for group in engine.lib_groups() {
                    batches.push(library_files(checked_group(engine, &group.key)?, output_dir));
                }
                batches
            }
        };

        if self.transport.state() != ConnectionState::Open {
            return Err(EngineError::TransportUnavailable);
        }

        let mut sent = 0;
        for files in batches.into_iter().filter(|b| !b.is_empty()) {
            let n = files.len();
            self.transport
                .send(&Message::WriteFiles { files })
                .map_err(|e| EngineError::Transport { msg: format!("{e:#}") })?;
            sent += n;
        }
        Ok(sent)
    }
}

fn checked_shader<'a, B: CompileBackend>(
    engine: &'a Engine<B>,
    key: &str,
) -> Result<&'a ShaderRecord<B>, EngineError> {
    if key.is_empty() {
        return Err(EngineError::NoKeySpecified);
    }
    let record = engine
        .shader(key)
        .ok_or_else(|| EngineError::UnknownRecord { key: key.to_string() })?;
    if record.has_error() {
        return Err(EngineError::HasError { key: key.to_string() });
    }
    Ok(record)
}

/// A group can only be saved while every shader using it compiles.
fn checked_group<'a, B: CompileBackend>(
    engine: &'a Engine<B>,
    key: &str,
) -> Result<&'a LibGroupRecord, EngineError> {
    if key.is_empty() {
        return Err(EngineError::NoKeySpecified);
    }
    let group = engine
        .lib_group(key)
        .ok_or_else(|| EngineError::UnknownRecord { key: key.to_string() })?;
    for shader_key in group.assoc_shader_keys() {
        if engine.shader(shader_key).is_some_and(|r| r.has_error()) {
            return Err(EngineError::HasError { key: shader_key.clone() });
        }
    }
    Ok(group)
}

fn shader_files<B: CompileBackend>(record: &ShaderRecord<B>, output_dir: &Path) -> Vec<WriteFile> {
    if record.is_readonly() {
        return Vec::new();
    }
    record
        .sources()
        .iter()
        .map(|(stage, text)| {
            let (path, guard) = match record.path(stage) {
                Some(p) => (p.to_path_buf(), false),
                None => (output_dir.join(format!("{}_{}.glsl", record.key(), stage)), true),
            };
            WriteFile { path, text: text.clone(), guard_against_overwrite: guard }
        })
        .collect()
}

fn library_files(group: &LibGroupRecord, output_dir: &Path) -> Vec<WriteFile> {
    if group.is_readonly() {
        return Vec::new();
    }
    group
        .libraries()
        .iter()
        .map(|lib| {
            let (path, guard) = match &lib.path {
                Some(p) => (p.clone(), false),
                None => (output_dir.join(format!("{}.glsl", lib.key)), true),
            };
            WriteFile { path, text: lib.source.clone(), guard_against_overwrite: guard }
        })
        .collect()
}

/// Transport that writes straight to the local filesystem. Always open.
///
/// Relative paths land below `root`. A guarded write never replaces an existing
/// file with different content; it goes to the first free `name.N.ext` instead.
#[derive(Debug, Clone)]
pub struct LocalFsTransport {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl LocalFsTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), written: Vec::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every path written so far, in order. Hosts use it to ignore the watcher
    /// echo of their own saves.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_one(&mut self, file: &WriteFile) -> Result<PathBuf, EngineError> {
        let mut dest = if file.path.is_absolute() {
            file.path.clone()
        } else {
            self.root.join(&file.path)
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        if file.guard_against_overwrite {
            match std::fs::read_to_string(&dest) {
                Ok(existing) if existing == file.text => return Ok(dest),
                Ok(_) => {
                    dest = free_sibling(&dest);
                    logw!("SAVE", "{} exists, writing {} instead", file.path.display(), dest.display());
                }
                Err(_) if dest.exists() => dest = free_sibling(&dest),
                Err(_) => {}
            }
        }

        std::fs::write(&dest, &file.text).map_err(|e| EngineError::Io {
            path: dest.clone(),
            source: e,
        })?;
        Ok(dest)
    }
}

fn free_sibling(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|s| s.to_str());
    (1u32..)
        .map(|n| {
            let name = match ext {
                Some(ext) => format!("{stem}.{n}.{ext}"),
                None => format!("{stem}.{n}"),
            };
            path.with_file_name(name)
        })
        .find(|p| !p.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

impl Transport for LocalFsTransport {
    fn state(&self) -> ConnectionState {
        ConnectionState::Open
    }

    fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        let Message::WriteFiles { files } = msg else {
            return Ok(());
        };
        for file in files {
            let dest = self.write_one(file)?;
            self.written.push(dest);
        }
        Ok(())
    }

    fn reconnect(&mut self) {}
}
