//! `#include<name>` expansion against the shared library map.
//!
//! Library text is spliced in place of the marker line and wrapped in `#line`
//! directives, so driver diagnostics keep pointing at the line numbers the user
//! actually sees. Each library gets its own source string number; number 0 is the
//! stage text itself.
//!
//! Text without markers comes back byte-for-byte unchanged.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::EngineError;
use crate::library::LibraryMap;

/// Result of a successful preprocessing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    /// Final compilable text.
    pub source: String,
    /// Source string numbers used in `#line` directives: `sources[0]` is the stage
    /// itself (empty name), `sources[n]` the library expanded as string `n`.
    pub sources: Vec<String>,
}

impl Preprocessed {
    /// Library name for a source string number, `None` for the stage itself.
    pub fn library_for(&self, string_no: usize) -> Option<&str> {
        match string_no {
            0 => None,
            n => self.sources.get(n).map(|s| s.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    /// `line` is 1-based within the stage text, or within library `within`.
    IncludeNotFound { name: String, line: usize, within: Option<String> },
    /// Include chain that leads back to a library still being expanded.
    CyclicInclude { chain: Vec<String> },
    MalformedInclude { line: usize, within: Option<String> },
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&EngineError::from(self.clone()), f)
    }
}

impl std::error::Error for PreprocessError {}

/// Expand every include marker in `source`.
pub fn preprocess(source: &str, libs: &LibraryMap) -> Result<Preprocessed, PreprocessError> {
    let mut out = Preprocessed {
        source: String::with_capacity(source.len()),
        sources: vec![String::new()],
    };
    let mut stack = Vec::new();
    expand(source, None, 0, libs, &mut stack, &mut out)?;
    Ok(out)
}

/// Every library name reachable from `source`, including names that are not in
/// `libs` (a shader that includes a missing library still depends on it).
pub fn referenced_libraries(source: &str, libs: &LibraryMap) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    collect(source, libs, &mut seen);
    seen
}

fn collect(text: &str, libs: &LibraryMap, seen: &mut BTreeSet<String>) {
    for line in text.lines() {
        if let Marker::Include(name) = parse_marker(line) {
            if seen.insert(name.to_string()) {
                if let Some(lib) = libs.get(name) {
                    collect(lib, libs, seen);
                }
            }
        }
    }
}

fn expand(
    text: &str,
    within: Option<&str>,
    string_no: usize,
    libs: &LibraryMap,
    stack: &mut Vec<String>,
    out: &mut Preprocessed,
) -> Result<(), PreprocessError> {
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        match parse_marker(line) {
            Marker::None => out.source.push_str(line),
            Marker::Malformed => {
                return Err(PreprocessError::MalformedInclude {
                    line: line_no,
                    within: within.map(str::to_string),
                });
            }
            Marker::Include(name) => {
                if stack.iter().any(|s| s == name) {
                    let mut chain = stack.clone();
                    chain.push(name.to_string());
                    return Err(PreprocessError::CyclicInclude { chain });
                }
                let Some(lib) = libs.get(name) else {
                    return Err(PreprocessError::IncludeNotFound {
                        name: name.to_string(),
                        line: line_no,
                        within: within.map(str::to_string),
                    });
                };

                let lib_no = string_number(out, name);
                out.source.push_str(&format!("#line 1 {lib_no}\n"));

                stack.push(name.to_string());
                expand(lib, Some(name), lib_no, libs, stack, out)?;
                stack.pop();

                if !out.source.ends_with('\n') {
                    out.source.push('\n');
                }
                out.source.push_str(&format!("#line {} {}\n", line_no + 1, string_no));
            }
        }
    }
    Ok(())
}

fn string_number(out: &mut Preprocessed, name: &str) -> usize {
    if let Some(pos) = out.sources.iter().skip(1).position(|s| s == name) {
        return pos + 1;
    }
    out.sources.push(name.to_string());
    out.sources.len() - 1
}

enum Marker<'a> {
    None,
    Include(&'a str),
    Malformed,
}

fn parse_marker(line: &str) -> Marker<'_> {
    let Some(rest) = line.trim().strip_prefix("#include") else {
        return Marker::None;
    };
    let Some(rest) = rest.trim_start().strip_prefix('<') else {
        return Marker::Malformed;
    };
    let Some(end) = rest.find('>') else {
        return Marker::Malformed;
    };
    let name = rest[..end].trim();
    let tail = rest[end + 1..].trim();
    if name.is_empty() || !(tail.is_empty() || tail.starts_with("//")) {
        return Marker::Malformed;
    }
    Marker::Include(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn libs(entries: &[(&str, &str)]) -> LibraryMap {
        entries.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        let src = "#version 300 es\nvoid main() {}";
        let out = preprocess(src, &LibraryMap::new()).unwrap();
        assert_eq!(out.source, src);
        assert_eq!(out.sources, vec![String::new()]);
    }

    #[test]
    fn include_is_spliced_with_line_directives() {
        let src = "#version 300 es\n#include<common>\nvoid main() {}\n";
        let out = preprocess(src, &libs(&[("common", "float k = 1.0;")])).unwrap();
        assert_eq!(
            out.source,
            "#version 300 es\n#line 1 1\nfloat k = 1.0;\n#line 3 0\nvoid main() {}\n"
        );
        assert_eq!(out.library_for(1), Some("common"));
        assert_eq!(out.library_for(0), None);
    }

    #[test]
    fn marker_tolerates_blanks_and_trailing_comment() {
        let src = "  #include < noise >  // value noise\n";
        let out = preprocess(src, &libs(&[("noise", "float n;\n")])).unwrap();
        assert!(out.source.contains("float n;"));
        assert!(!out.source.contains("#include"));
    }

    #[test]
    fn expanding_twice_is_idempotent() {
        let src = "#version 300 es\n#include<a>\nvoid main() {}\n";
        let map = libs(&[("a", "#include<b>\nfloat a;\n"), ("b", "float b;\n")]);
        let once = preprocess(src, &map).unwrap();
        let twice = preprocess(&once.source, &map).unwrap();
        assert_eq!(once.source, twice.source);
    }

    #[test]
    fn nested_includes_get_their_own_string_numbers() {
        let src = "#include<a>\nvoid main() {}\n";
        let map = libs(&[("a", "#include<b>\nfloat a;\n"), ("b", "float b;\n")]);
        let out = preprocess(src, &map).unwrap();
        assert_eq!(
            out.source,
            "#line 1 1\n#line 1 2\nfloat b;\n#line 2 1\nfloat a;\n#line 2 0\nvoid main() {}\n"
        );
        assert_eq!(out.sources, vec!["".to_string(), "a".into(), "b".into()]);
    }

    #[test]
    fn missing_library_reports_original_line() {
        let src = "#version 300 es\n\n#include<nope>\n";
        let err = preprocess(src, &LibraryMap::new()).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::IncludeNotFound { name: "nope".into(), line: 3, within: None }
        );
    }

    #[test]
    fn missing_library_inside_library_names_the_library() {
        let map = libs(&[("a", "float a;\n#include<gone>\n")]);
        let err = preprocess("#include<a>\n", &map).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::IncludeNotFound {
                name: "gone".into(),
                line: 2,
                within: Some("a".into())
            }
        );
    }

    #[test]
    fn cyclic_include_fails_closed() {
        let map = libs(&[("a", "#include<b>\n"), ("b", "#include<a>\n")]);
        let err = preprocess("#include<a>\n", &map).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::CyclicInclude { chain: vec!["a".into(), "b".into(), "a".into()] }
        );
    }

    #[test]
    fn self_include_is_a_cycle() {
        let map = libs(&[("a", "#include<a>\n")]);
        assert!(matches!(
            preprocess("#include<a>\n", &map),
            Err(PreprocessError::CyclicInclude { .. })
        ));
    }

    #[test]
    fn same_library_twice_is_not_a_cycle() {
        let map = libs(&[("a", "float a;\n")]);
        let out = preprocess("#include<a>\n#include<a>\n", &map).unwrap();
        assert_eq!(out.source.matches("float a;").count(), 2);
        assert_eq!(out.sources.len(), 2);
    }

    #[test]
    fn malformed_marker_is_rejected() {
        let err = preprocess("void f();\n#include \"x.glsl\"\n", &LibraryMap::new()).unwrap_err();
        assert_eq!(err, PreprocessError::MalformedInclude { line: 2, within: None });
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn referenced_libraries_is_transitive_and_cycle_safe() {
        let map = libs(&[("a", "#include<b>\n"), ("b", "#include<a>\n#include<missing>\n")]);
        let refs = referenced_libraries("#include<a>\n", &map);
        let refs: Vec<_> = refs.into_iter().collect();
        assert_eq!(refs, vec!["a".to_string(), "b".into(), "missing".into()]);
    }
}
