//! Config validation (friendly errors)
//!
//! Purpose:
//! - Catch common misconfigurations early
//! - Explain *what* is wrong, *where* it lives, and *what to do*
//! - Keep the editor running where possible; the engine itself copes with
//!   missing files and bad keys by refusing them one by one

use std::collections::{BTreeMap, BTreeSet};

use crate::config::EditorConfig;

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let line = match &it.hint {
            Some(h) => format!("{}: {} (hint: {})", it.path, it.message, h),
            None => format!("{}: {}", it.path, it.message),
        };
        match it.level {
            IssueLevel::Warn => logw!(tag, "{line}"),
            IssueLevel::Error => loge!(tag, "{line}"),
        }
    }
}

/// Emit a one-line summary even when there are zero issues.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.level == IssueLevel::Error)
}

/// Validate `editor.json` relationships:
/// - shader and group keys are present and unique
/// - every referenced file exists
/// - library keys are not silently shadowed by a later group
/// - debounce delays make sense and `active` names a shader
pub fn validate_editor_config(cfg: &EditorConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if cfg.shaders.is_empty() {
        issues.push(ValidationIssue::error(
            "editor.json:/shaders",
            "no shaders configured",
            Some("add at least one { \"key\", \"vertex\", \"fragment\" } entry".into()),
        ));
    }

    let mut seen = BTreeSet::new();
    for (i, s) in cfg.shaders.iter().enumerate() {
        let base = format!("editor.json:/shaders/{i}");
        if s.key.trim().is_empty() {
            issues.push(ValidationIssue::error(format!("{base}/key"), "empty shader key", None));
        } else if !seen.insert(s.key.as_str()) {
            issues.push(ValidationIssue::error(
                format!("{base}/key"),
                format!("duplicate shader key '{}'", s.key),
                Some("a later entry would replace the earlier one at registration".into()),
            ));
        }
        for (stage, path) in s.paths.iter() {
            if !path.exists() {
                issues.push(ValidationIssue::error(
                    format!("{base}/{stage}"),
                    format!("file not found: {}", path.display()),
                    Some("paths are relative to the assets folder".into()),
                ));
            }
        }
    }

    let mut groups = BTreeSet::new();
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for (i, g) in cfg.libraries.iter().enumerate() {
        let base = format!("editor.json:/libraries/{i}");
        if g.group.trim().is_empty() {
            issues.push(ValidationIssue::error(format!("{base}/group"), "empty library group key", None));
        } else if !groups.insert(g.group.as_str()) {
            issues.push(ValidationIssue::error(
                format!("{base}/group"),
                format!("duplicate library group '{}'", g.group),
                None,
            ));
        }
        for (j, lib) in g.libs.iter().enumerate() {
            let lbase = format!("{base}/libs/{j}");
            if let Some(prev) = owners.insert(lib.key.as_str(), g.group.as_str()) {
                issues.push(ValidationIssue::warn(
                    format!("{lbase}/key"),
                    format!("library '{}' also defined by group '{prev}', this one wins", lib.key),
                    Some("library keys are global across groups".into()),
                ));
            }
            if !lib.path.exists() {
                issues.push(ValidationIssue::error(
                    format!("{lbase}/path"),
                    format!("file not found: {}", lib.path.display()),
                    None,
                ));
            }
        }
    }

    if cfg.settings.recompile_delay_error > cfg.settings.recompile_delay {
        issues.push(ValidationIssue::warn(
            "editor.json:/recompile_delay_error_ms",
            "error-state delay is longer than the clean-state delay",
            Some("fixing an error usually wants faster feedback, not slower".into()),
        ));
    }

    if let Some(active) = &cfg.active {
        if cfg.shader(active).is_none() {
            issues.push(ValidationIssue::warn(
                "editor.json:/active",
                format!("active shader '{active}' is not configured"),
                Some("the first shader will be drawn instead".into()),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::config::{LibraryGroupConfig, ShaderConfig};
    use crate::engine::EngineSettings;
    use crate::loader::LibrarySpec;
    use crate::stage::StageMap;

    fn shader(key: &str, dir: &std::path::Path) -> ShaderConfig {
        ShaderConfig {
            key: key.into(),
            paths: StageMap::new(dir.join("a.vert"), dir.join("a.frag")),
            readonly: false,
            preprocess: true,
            compile_on_register: true,
        }
    }

    #[test]
    fn clean_config_has_no_issues() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.vert"), "").unwrap();
        std::fs::write(dir.path().join("a.frag"), "").unwrap();
        let cfg = EditorConfig {
            source: None,
            settings: EngineSettings::default(),
            libraries: Vec::new(),
            shaders: vec![shader("main", dir.path())],
            active: Some("main".into()),
        };
        assert!(validate_editor_config(&cfg).is_empty());
    }

    #[test]
    fn reports_duplicates_missing_files_and_shadowing() {
        let dir = tempfile::tempdir().unwrap();
        let lib = |key: &str| LibrarySpec { key: key.into(), path: PathBuf::from("/nope.glsl"), fold_default: false };
        let cfg = EditorConfig {
            source: None,
            settings: EngineSettings {
                recompile_delay: Duration::from_millis(10),
                recompile_delay_error: Duration::from_millis(20),
                ..Default::default()
            },
            libraries: vec![
                LibraryGroupConfig { group: "a".into(), readonly: false, libs: vec![lib("noise")] },
                LibraryGroupConfig { group: "b".into(), readonly: false, libs: vec![lib("noise")] },
            ],
            shaders: vec![shader("main", dir.path()), shader("main", dir.path())],
            active: Some("other".into()),
        };
        let issues = validate_editor_config(&cfg);
        assert!(has_errors(&issues));
        let text: Vec<String> = issues.iter().map(|i| i.message.clone()).collect();
        assert!(text.iter().any(|m| m.contains("duplicate shader key 'main'")));
        assert!(text.iter().any(|m| m.contains("also defined by group 'a'")));
        assert!(text.iter().any(|m| m.contains("error-state delay")));
        assert!(text.iter().any(|m| m.contains("'other'")));
        // Two shaders x two stages, two libraries.
        assert_eq!(text.iter().filter(|m| m.starts_with("file not found")).count(), 6);
    }
}
