//! Loading shader and library text from paths, then registering it.
//!
//! Every file of a request is read before anything is registered: one missing
//! file means nothing changes in the engine.

use std::path::{Path, PathBuf};

use crate::assets::{read_to_string_result, AssetsRoot};
use crate::backend::CompileBackend;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::library::LibraryEntry;
use crate::record::ShaderOptions;
use crate::stage::{Stage, StageMap};
use crate::strategy::CompileStrategy;

/// Source loader collaborator.
pub trait SourceLoader {
    /// Where `path` actually lives. Registered records keep this path, so file
    /// notifications can be matched against it.
    fn resolve(&self, path: &Path) -> PathBuf;
    /// Read a path already returned by `resolve`.
    fn load_text(&self, resolved: &Path) -> Result<String, EngineError>;
}

/// Reads from disk. Relative paths resolve against the assets root.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: AssetsRoot,
}

impl FsLoader {
    pub fn new(root: AssetsRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &AssetsRoot {
        &self.root
    }
}

impl SourceLoader for FsLoader {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn load_text(&self, resolved: &Path) -> Result<String, EngineError> {
        read_to_string_result(resolved)
    }
}

/// Library to load: key, path and fold hint.
#[derive(Debug, Clone)]
pub struct LibrarySpec {
    pub key: String,
    pub path: PathBuf,
    pub fold_default: bool,
}

/// Load both stage files and register the shader under `key`.
///
/// `options.paths` is overwritten with the resolved stage paths.
pub fn load_and_register_shader<B: CompileBackend, L: SourceLoader>(
    engine: &mut Engine<B>,
    loader: &L,
    key: &str,
    paths: StageMap<PathBuf>,
    strategy: Box<dyn CompileStrategy<B>>,
    mut options: ShaderOptions,
) -> Result<(), EngineError> {
    let resolved = paths.map(|_, p| loader.resolve(p));
    let vertex = loader.load_text(&resolved[Stage::Vertex])?;
    let fragment = loader.load_text(&resolved[Stage::Fragment])?;

    options.paths = resolved.map(|_, p| Some(p.clone()));
    engine.register_shader(key, StageMap::new(vertex, fragment), strategy, options)
}

/// Load every library file of a group and register the group.
pub fn load_libs<B: CompileBackend, L: SourceLoader>(
    engine: &mut Engine<B>,
    loader: &L,
    group: &str,
    libs: &[LibrarySpec],
    readonly: bool,
) -> Result<(), EngineError> {
    let entries = libs
        .iter()
        .map(|spec| {
            let path = loader.resolve(&spec.path);
            let source = loader.load_text(&path)?;
            Ok(LibraryEntry::new(spec.key.clone(), source)
                .with_path(path)
                .folded(spec.fold_default))
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    engine.register_libs(group, entries, readonly)
}
