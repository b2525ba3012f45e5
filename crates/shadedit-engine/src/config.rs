use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::assets::{read_to_string_result, AssetsRoot};
use crate::engine::{EngineSettings, LibraryFanout};
use crate::error::EngineError;
use crate::loader::LibrarySpec;
use crate::stage::StageMap;

/// How strictly to interpret `editor.json`.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing optional
///   keys fall back to defaults.
/// - `Strict` is fail-fast: unknown fields and unsupported versions become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// Typed view of `assets/editor.json`.
///
/// Versioning: `version` defaults to 1 when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct EditorJson {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_delay_ms")]
    pub recompile_delay_ms: u64,

    #[serde(default = "default_delay_error_ms")]
    pub recompile_delay_error_ms: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default)]
    pub library_fanout: LibraryFanout,

    /// `#version` line for the built-in fallback program.
    #[serde(default = "default_glsl_version")]
    pub glsl_version: String,

    #[serde(default)]
    pub libraries: Vec<LibraryGroupJson>,

    #[serde(default)]
    pub shaders: Vec<ShaderJson>,

    #[serde(default)]
    pub active: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryGroupJson {
    pub group: String,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub libs: Vec<LibraryJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryJson {
    pub key: String,
    pub path: String,
    #[serde(default)]
    pub fold_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaderJson {
    pub key: String,
    pub vertex: String,
    pub fragment: String,
    #[serde(default)]
    pub readonly: bool,
    /// Run the `#include` preprocessor (default true).
    #[serde(default = "default_true")]
    pub preprocess: bool,
    #[serde(default = "default_true")]
    pub compile_on_register: bool,
}

fn default_version() -> u32 {
    1
}
fn default_delay_ms() -> u64 {
    100
}
fn default_delay_error_ms() -> u64 {
    50
}
fn default_output_dir() -> String {
    "saved_editor_shaders".to_string()
}
fn default_glsl_version() -> String {
    "330 core".to_string()
}
fn default_true() -> bool {
    true
}

const TOP_FIELDS: &[&str] = &[
    "version",
    "recompile_delay_ms",
    "recompile_delay_error_ms",
    "output_dir",
    "library_fanout",
    "glsl_version",
    "libraries",
    "shaders",
    "active",
];
const GROUP_FIELDS: &[&str] = &["group", "readonly", "libs"];
const LIB_FIELDS: &[&str] = &["key", "path", "fold_default"];
const SHADER_FIELDS: &[&str] = &["key", "vertex", "fragment", "readonly", "preprocess", "compile_on_register"];

#[derive(Debug, Clone)]
pub struct LibraryGroupConfig {
    pub group: String,
    pub readonly: bool,
    pub libs: Vec<LibrarySpec>,
}

#[derive(Debug, Clone)]
pub struct ShaderConfig {
    pub key: String,
    /// Resolved against the assets directory.
    pub paths: StageMap<PathBuf>,
    pub readonly: bool,
    pub preprocess: bool,
    pub compile_on_register: bool,
}

/// Resolved editor configuration.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// `None` when `editor.json` is absent and the defaults are in use.
    pub source: Option<PathBuf>,
    pub settings: EngineSettings,
    pub libraries: Vec<LibraryGroupConfig>,
    pub shaders: Vec<ShaderConfig>,
    pub active: Option<String>,
}

impl EditorConfig {
    /// Configuration used when `editor.json` doesn't exist: one shader `main` made
    /// of `shaders/default.vert` and `shaders/default.frag`.
    pub fn fallback(assets: &AssetsRoot) -> Self {
        Self {
            source: None,
            settings: settings_from(&EditorJson::default()),
            libraries: Vec::new(),
            shaders: vec![ShaderConfig {
                key: "main".to_string(),
                paths: StageMap::new(
                    assets.join("shaders").join("default.vert"),
                    assets.join("shaders").join("default.frag"),
                ),
                readonly: false,
                preprocess: true,
                compile_on_register: true,
            }],
            active: Some("main".to_string()),
        }
    }

    pub fn shader(&self, key: &str) -> Option<&ShaderConfig> {
        self.shaders.iter().find(|s| s.key == key)
    }
}

impl Default for EditorJson {
    fn default() -> Self {
        Self {
            version: default_version(),
            recompile_delay_ms: default_delay_ms(),
            recompile_delay_error_ms: default_delay_error_ms(),
            output_dir: default_output_dir(),
            library_fanout: LibraryFanout::All,
            glsl_version: default_glsl_version(),
            libraries: Vec::new(),
            shaders: Vec::new(),
            active: None,
        }
    }
}

/// Load `assets/editor.json` (lenient).
pub fn load_editor_config(assets: &AssetsRoot) -> Result<EditorConfig, EngineError> {
    load_editor_config_with_mode(assets, ConfigMode::Lenient)
}

/// Strict version of `load_editor_config`.
pub fn load_editor_config_strict(assets: &AssetsRoot) -> Result<EditorConfig, EngineError> {
    load_editor_config_with_mode(assets, ConfigMode::Strict)
}

pub fn load_editor_config_with_mode(
    assets: &AssetsRoot,
    mode: ConfigMode,
) -> Result<EditorConfig, EngineError> {
    let path = assets.join("editor.json");
    if !path.exists() {
        return Ok(EditorConfig::fallback(assets));
    }

    let data = read_to_string_result(&path)?;
    let value: Value = serde_json::from_str(&data).map_err(|e| EngineError::Json {
        path: path.clone(),
        source: e,
    })?;

    if mode == ConfigMode::Strict {
        let unknown = unknown_fields(&value);
        if !unknown.is_empty() {
            return Err(EngineError::InvalidConfig {
                path,
                msg: format!("unknown field(s): {}", unknown.join(", ")),
            });
        }
    }

    let json: EditorJson = serde_json::from_value(value).map_err(|e| EngineError::Json {
        path: path.clone(),
        source: e,
    })?;

    if mode == ConfigMode::Strict && json.version != 1 {
        return Err(EngineError::InvalidConfig {
            path,
            msg: format!("unsupported editor.json version {} (expected 1)", json.version),
        });
    }

    Ok(resolve(assets, path, json))
}

fn resolve(assets: &AssetsRoot, path: PathBuf, json: EditorJson) -> EditorConfig {
    let settings = settings_from(&json);
    let libraries = json
        .libraries
        .into_iter()
        .map(|g| LibraryGroupConfig {
            group: g.group,
            readonly: g.readonly,
            libs: g
                .libs
                .into_iter()
                .map(|l| LibrarySpec {
                    key: l.key,
                    path: assets.resolve(&l.path),
                    fold_default: l.fold_default,
                })
                .collect(),
        })
        .collect();
    let shaders = json
        .shaders
        .into_iter()
        .map(|s| ShaderConfig {
            paths: StageMap::new(assets.resolve(&s.vertex), assets.resolve(&s.fragment)),
            key: s.key,
            readonly: s.readonly,
            preprocess: s.preprocess,
            compile_on_register: s.compile_on_register,
        })
        .collect();

    EditorConfig {
        source: Some(path),
        settings,
        libraries,
        shaders,
        active: json.active,
    }
}

fn settings_from(json: &EditorJson) -> EngineSettings {
    EngineSettings {
        recompile_delay: Duration::from_millis(json.recompile_delay_ms),
        recompile_delay_error: Duration::from_millis(json.recompile_delay_error_ms),
        output_dir: PathBuf::from(&json.output_dir),
        library_fanout: json.library_fanout,
        glsl_version: json.glsl_version.clone(),
    }
}

/// JSON pointers of every field the typed config doesn't know.
fn unknown_fields(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    check_keys(value, "", TOP_FIELDS, &mut out);
    if let Some(groups) = value.get("libraries").and_then(|v| v.as_array()) {
        for (i, g) in groups.iter().enumerate() {
            let base = format!("/libraries/{i}");
            check_keys(g, &base, GROUP_FIELDS, &mut out);
            if let Some(libs) = g.get("libs").and_then(|v| v.as_array()) {
                for (j, l) in libs.iter().enumerate() {
                    check_keys(l, &format!("{base}/libs/{j}"), LIB_FIELDS, &mut out);
                }
            }
        }
    }
    if let Some(shaders) = value.get("shaders").and_then(|v| v.as_array()) {
        for (i, s) in shaders.iter().enumerate() {
            check_keys(s, &format!("/shaders/{i}"), SHADER_FIELDS, &mut out);
        }
    }
    out
}

fn check_keys(value: &Value, base: &str, known: &[&str], out: &mut Vec<String>) {
    if let Some(obj) = value.as_object() {
        for k in obj.keys() {
            if !known.contains(&k.as_str()) {
                out.push(format!("{base}/{k}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    fn assets_with(json: Option<&str>) -> (tempfile::TempDir, AssetsRoot) {
        let dir = tempfile::tempdir().unwrap();
        if let Some(j) = json {
            std::fs::write(dir.path().join("editor.json"), j).unwrap();
        }
        let root = AssetsRoot::at(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn missing_file_falls_back_to_default_shader() {
        let (_d, assets) = assets_with(None);
        let cfg = load_editor_config(&assets).unwrap();
        assert!(cfg.source.is_none());
        assert_eq!(cfg.shaders.len(), 1);
        assert_eq!(cfg.shaders[0].paths[Stage::Fragment], assets.join("shaders/default.frag"));
        assert_eq!(cfg.settings.recompile_delay, Duration::from_millis(100));
        assert_eq!(cfg.settings.recompile_delay_error, Duration::from_millis(50));
    }

    #[test]
    fn paths_resolve_against_assets_and_defaults_apply() {
        let (_d, assets) = assets_with(Some(
            r#"{
                "library_fanout": "dependents",
                "libraries": [{ "group": "common", "libs": [{ "key": "noise", "path": "lib/noise.glsl" }] }],
                "shaders": [{ "key": "main", "vertex": "main.vert", "fragment": "main.frag" }],
                "active": "main",
                "future_knob": 3
            }"#,
        ));
        let cfg = load_editor_config(&assets).unwrap();
        assert_eq!(cfg.settings.library_fanout, LibraryFanout::Dependents);
        assert_eq!(cfg.libraries[0].libs[0].path, assets.join("lib/noise.glsl"));
        let main = cfg.shader("main").unwrap();
        assert!(main.preprocess && main.compile_on_register && !main.readonly);
        assert_eq!(main.paths[Stage::Vertex], assets.join("main.vert"));
    }

    #[test]
    fn strict_mode_rejects_unknown_fields_and_versions() {
        let (_d, assets) = assets_with(Some(
            r#"{ "shaders": [{ "key": "m", "vertex": "a", "fragment": "b", "colour": 1 }] }"#,
        ));
        let err = load_editor_config_strict(&assets).unwrap_err();
        assert!(err.to_string().contains("/shaders/0/colour"), "{err}");

        let (_d, assets) = assets_with(Some(r#"{ "version": 2 }"#));
        assert!(load_editor_config(&assets).is_ok());
        assert_eq!(load_editor_config_strict(&assets).unwrap_err().code(), "ERR_INVALID_CONFIG");
    }
}
