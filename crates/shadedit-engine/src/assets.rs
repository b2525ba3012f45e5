use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// A validated root directory containing shadedit assets (`editor.json` + shaders).
///
/// Relative paths in the config, and the default save directory, resolve against it.
/// The root is always absolute, so resolved paths don't depend on the working directory.
#[derive(Debug, Clone)]
pub struct AssetsRoot {
    path: PathBuf,
}

impl AssetsRoot {
    /// Locate the `assets/` directory.
    ///
    /// Resolution order:
    /// 1) `SHADEDIT_ASSETS` env var (if set)
    /// 2) Search upward from `start_dir` for a folder named `assets`
    pub fn discover(start_dir: &Path) -> Result<Self, EngineError> {
        if let Ok(p) = std::env::var("SHADEDIT_ASSETS") {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Ok(Self { path: absolute(&pb)? });
            }
        }

        let mut cur = start_dir.to_path_buf();
        loop {
            let cand = cur.join("assets");
            if cand.is_dir() {
                return Ok(Self { path: absolute(&cand)? });
            }
            if !cur.pop() {
                break;
            }
        }

        Err(EngineError::AssetsNotFound {
            start_dir: start_dir.to_path_buf(),
        })
    }

    /// Use `dir` as is (`--assets <dir>`).
    pub fn at(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = dir.into();
        if !path.is_dir() {
            return Err(EngineError::AssetsNotFound { start_dir: path });
        }
        Ok(Self { path: absolute(&path)? })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    pub fn resolve(&self, s: &str) -> PathBuf {
        resolve_assets_path(&self.path, s)
    }
}

/// Anchor a relative path at the current directory.
fn absolute(path: &Path) -> Result<PathBuf, EngineError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(cwd.join(path))
}

/// Resolve a JSON-provided path relative to the assets directory unless it is already absolute.
pub fn resolve_assets_path(assets_dir: &Path, s: &str) -> PathBuf {
    let p = PathBuf::from(s);
    if p.is_absolute() {
        p
    } else {
        assets_dir.join(p)
    }
}

/// Read a UTF-8 file into a String (Result-based).
pub fn read_to_string_result(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Deserialize JSON from a file (Result-based).
pub fn load_json_result<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
    let s = read_to_string_result(path)?;
    serde_json::from_str(&s).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_walks_up_to_an_assets_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        // Skip when the environment pins the assets folder.
        if std::env::var("SHADEDIT_ASSETS").is_ok() {
            return;
        }
        let root = AssetsRoot::discover(&nested).unwrap();
        assert_eq!(root.path(), dir.path().join("assets"));
        assert_eq!(root.resolve("shaders/x.frag"), dir.path().join("assets/shaders/x.frag"));
    }

    #[test]
    fn relative_roots_become_absolute() {
        let dir = tempfile::tempdir_in(".").unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        let rel = dir.path().join("assets");
        assert!(rel.is_relative());

        let root = AssetsRoot::at(&rel).unwrap();
        assert!(root.path().is_absolute());
        assert_eq!(root.path(), std::env::current_dir().unwrap().join(&rel));
        assert!(root.resolve("shaders/x.frag").is_absolute());
    }

    #[test]
    fn absolute_paths_are_kept() {
        let abs = std::env::temp_dir().join("x.frag");
        assert_eq!(resolve_assets_path(Path::new("assets"), abs.to_str().unwrap()), abs);
    }

    #[test]
    fn explicit_root_must_exist() {
        let err = AssetsRoot::at("/definitely/not/here").unwrap_err();
        assert_eq!(err.code(), "ERR_ASSETS_NOT_FOUND");
    }

    #[test]
    fn json_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.json");
        std::fs::write(&p, "{ nope").unwrap();
        let err = load_json_result::<serde_json::Value>(&p).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
