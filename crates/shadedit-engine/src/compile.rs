use crate::backend::CompileBackend;
use crate::error::EngineError;
use crate::stage::{Stage, StageMap};

/// Full-screen triangle, used while a record has never compiled successfully.
pub const FALLBACK_VERTEX: &str = r#"precision highp float;
void main() {
    vec2 pos = vec2(float(gl_VertexID == 1) * 4.0 - 1.0, float(gl_VertexID == 2) * 4.0 - 1.0);
    gl_Position = vec4(pos, 0.0, 1.0);
}
"#;

/// Solid magenta, so a broken shader is obvious on screen.
pub const FALLBACK_FRAGMENT: &str = r#"precision highp float;
out vec4 fragColor;
void main() {
    fragColor = vec4(1.0, 0.0, 1.0, 1.0);
}
"#;

/// Fallback stage texts behind a `#version <glsl_version>` line.
pub fn fallback_sources(glsl_version: &str) -> StageMap<String> {
    StageMap::new(
        format!("#version {glsl_version}\n{FALLBACK_VERTEX}"),
        format!("#version {glsl_version}\n{FALLBACK_FRAGMENT}"),
    )
}

/// Per-stage and link diagnostics of one compilation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    stages: StageMap<Option<String>>,
    link: Option<String>,
}

impl ErrorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(|(_, e)| e.is_none()) && self.link.is_none()
    }

    pub fn stage(&self, stage: Stage) -> Option<&str> {
        self.stages[stage].as_deref()
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn set_stage(&mut self, stage: Stage, text: impl Into<String>) {
        self.stages[stage] = Some(text.into());
    }

    pub fn set_link(&mut self, text: impl Into<String>) {
        self.link = Some(text.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The record as a list of typed errors (stage errors first, then link).
    pub fn to_errors(&self) -> Vec<EngineError> {
        let mut out: Vec<EngineError> = self
            .stages
            .iter()
            .filter_map(|(stage, e)| {
                e.as_ref().map(|log| EngineError::StageCompile { stage, log: log.clone() })
            })
            .collect();
        if let Some(log) = &self.link {
            out.push(EngineError::Link { log: log.clone() });
        }
        out
    }

    /// One human-readable block, `<stage>: <text>` per failing part.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for (stage, e) in self.stages.iter() {
            if let Some(e) = e {
                parts.push(format!("{stage}: {}", e.trim_end()));
            }
        }
        if let Some(e) = &self.link {
            parts.push(format!("link: {}", e.trim_end()));
        }
        parts.join("\n")
    }
}

/// Outcome of a compilation strategy: a program, or the reasons there is none.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled<P> {
    pub program: Option<P>,
    pub errors: ErrorRecord,
}

impl<P> Compiled<P> {
    pub fn ok(program: P) -> Self {
        Self { program: Some(program), errors: ErrorRecord::default() }
    }

    pub fn failed(errors: ErrorRecord) -> Self {
        Self { program: None, errors }
    }
}

/// Compile both stages and link them.
///
/// Each stage is compiled even if the other one failed, so both get diagnostics;
/// any stage failure skips linking. Every object created along a failing path is
/// deleted before returning. On success only the linked program survives.
pub fn compile_program<B: CompileBackend>(
    backend: &mut B,
    vertex: &str,
    fragment: &str,
) -> Compiled<B::Program> {
    let sources = StageMap::new(vertex, fragment);
    let mut errors = ErrorRecord::default();
    let mut shaders: Vec<B::Shader> = Vec::with_capacity(2);

    for (stage, src) in sources.iter() {
        let shader = match backend.create_shader(stage) {
            Ok(s) => s,
            Err(e) => {
                errors.set_stage(stage, format!("create {stage} shader: {e}"));
                continue;
            }
        };
        backend.shader_source(shader, src);
        if backend.compile_shader(shader) {
            shaders.push(shader);
        } else {
            errors.set_stage(stage, backend.shader_info_log(shader));
            backend.delete_shader(shader);
        }
    }

    if !errors.is_empty() {
        for s in shaders {
            backend.delete_shader(s);
        }
        return Compiled::failed(errors);
    }

    let program = match backend.create_program() {
        Ok(p) => p,
        Err(e) => {
            for s in shaders {
                backend.delete_shader(s);
            }
            errors.set_link(format!("create program: {e}"));
            return Compiled::failed(errors);
        }
    };

    for s in &shaders {
        backend.attach_shader(program, *s);
    }
    let linked = backend.link_program(program);
    let link_log = if linked { None } else { Some(backend.program_info_log(program)) };

    for s in shaders {
        backend.detach_shader(program, s);
        backend.delete_shader(s);
    }

    match link_log {
        None => Compiled::ok(program),
        Some(log) => {
            backend.delete_program(program);
            errors.set_link(log);
            Compiled::failed(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    const VS: &str = "#version 300 es\nvoid main() { gl_Position = vec4(0.0); }\n";
    const FS: &str = "#version 300 es\nprecision highp float;\nout vec4 c;\nvoid main() { c = vec4(1.0); }\n";

    #[test]
    fn valid_pair_links_and_releases_shaders() {
        let mut be = FakeBackend::new();
        let out = compile_program(&mut be, VS, FS);
        let program = out.program.expect("program");
        assert!(out.errors.is_empty());
        assert_eq!(be.live_shaders(), 0);
        assert!(be.is_live(program));
    }

    #[test]
    fn compiling_twice_yields_two_distinct_live_programs() {
        let mut be = FakeBackend::new();
        let a = compile_program(&mut be, VS, FS).program.unwrap();
        let b = compile_program(&mut be, VS, FS).program.unwrap();
        assert_ne!(a, b);
        assert_eq!(be.live_programs().len(), 2);
    }

    #[test]
    fn stage_failure_skips_link_and_leaks_nothing() {
        let mut be = FakeBackend::new();
        let broken = "#version 300 es\n#error missing semicolon\n";
        let out = compile_program(&mut be, VS, broken);
        assert!(out.program.is_none());
        assert!(out.errors.stage(Stage::Vertex).is_none());
        assert_eq!(
            out.errors.stage(Stage::Fragment),
            Some("ERROR: 0:2: '#error' : missing semicolon")
        );
        assert!(out.errors.link().is_none());
        assert_eq!(be.link_calls, 0);
        assert_eq!(be.live_shaders(), 0);
        assert!(be.live_programs().is_empty());
    }

    #[test]
    fn both_stages_report_when_both_fail() {
        let mut be = FakeBackend::new();
        let out = compile_program(&mut be, "#error a\n", "#error b\n");
        assert!(out.errors.stage(Stage::Vertex).is_some());
        assert!(out.errors.stage(Stage::Fragment).is_some());
        assert_eq!(out.errors.to_errors().len(), 2);
    }

    #[test]
    fn link_failure_releases_program() {
        let mut be = FakeBackend::new();
        let out = compile_program(&mut be, "// LINK_FAIL\n", FS);
        assert!(out.program.is_none());
        assert!(out.errors.link().is_some());
        assert!(out.errors.summary().starts_with("link:"));
        assert_eq!(be.live_shaders(), 0);
        assert!(be.live_programs().is_empty());
        assert_eq!(be.deleted_programs.len(), 1);
    }
}
