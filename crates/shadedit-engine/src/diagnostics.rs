//! Friendlier compiler logs.
//!
//! Drivers report locations as `<source string>:<line>` in a few dialects:
//! - `ERROR: 0:12: 'x' : undeclared identifier` (ANGLE, glslang)
//! - `0:12(5): error: ...` (Mesa)
//! - `0(12) : error C1008: ...` (NVIDIA)
//!
//! The preprocessor's `#line` directives already restore the line numbers; this
//! module swaps the source string number for the stage or library name.

use crate::preprocess::Preprocessed;
use crate::stage::Stage;

/// Rewrite every recognizable location in `log`. Lines that don't parse are kept as is.
pub fn annotate_log(log: &str, stage: Stage, pre: Option<&Preprocessed>) -> String {
    log.lines()
        .map(|line| annotate_line(line, stage, pre))
        .collect::<Vec<_>>()
        .join("\n")
}

fn annotate_line(line: &str, stage: Stage, pre: Option<&Preprocessed>) -> String {
    let (severity, body) = split_severity(line);
    let Some(loc) = parse_location(body) else {
        return line.to_string();
    };
    let origin = match loc.string_no {
        0 => stage.name().to_string(),
        n => match pre.and_then(|p| p.library_for(n)) {
            Some(lib) => format!("lib {lib}"),
            None => return line.to_string(),
        },
    };
    format!("{severity}{origin}:{}{}", loc.line, &body[loc.end..])
}

fn split_severity(line: &str) -> (&str, &str) {
    for prefix in ["ERROR: ", "WARNING: "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return (prefix, rest);
        }
    }
    ("", line)
}

struct Location {
    string_no: usize,
    line: usize,
    /// Byte offset just past the location text.
    end: usize,
}

fn parse_location(s: &str) -> Option<Location> {
    let (string_no, idx) = leading_number(s, 0)?;
    match s.as_bytes().get(idx)? {
        b':' => {
            let (line, end) = leading_number(s, idx + 1)?;
            Some(Location { string_no, line, end })
        }
        b'(' => {
            let (line, end) = leading_number(s, idx + 1)?;
            (s.as_bytes().get(end) == Some(&b')')).then_some(Location {
                string_no,
                line,
                end: end + 1,
            })
        }
        _ => None,
    }
}

fn leading_number(s: &str, from: usize) -> Option<(usize, usize)> {
    let digits = s.get(from..)?.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let n = s[from..from + digits].parse().ok()?;
    Some((n, from + digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryMap;
    use crate::preprocess::preprocess;

    fn with_lib() -> Preprocessed {
        let libs: LibraryMap = [("noise", "float n;\n")].into_iter().collect();
        preprocess("#include<noise>\nvoid main() {}\n", &libs).unwrap()
    }

    #[test]
    fn angle_style_locations_get_names() {
        let pre = with_lib();
        let log = "ERROR: 0:4: 'x' : undeclared identifier\nERROR: 1:1: 'n' : redefinition";
        let out = annotate_log(log, Stage::Fragment, Some(&pre));
        assert_eq!(
            out,
            "ERROR: fragment:4: 'x' : undeclared identifier\nERROR: lib noise:1: 'n' : redefinition"
        );
    }

    #[test]
    fn mesa_and_nvidia_styles_are_recognized() {
        let out = annotate_log("0:7(12): error: syntax error", Stage::Vertex, None);
        assert_eq!(out, "vertex:7(12): error: syntax error");

        let out = annotate_log("0(3) : error C0000: syntax error", Stage::Vertex, None);
        assert_eq!(out, "vertex:3 : error C0000: syntax error");
    }

    #[test]
    fn unknown_shapes_pass_through() {
        let log = "link failed\nERROR: 9:2: unknown string";
        assert_eq!(annotate_log(log, Stage::Fragment, Some(&with_lib())), log);
    }
}
