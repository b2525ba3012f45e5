//! Pluggable compilation behaviour.
//!
//! A record never compiles on its own: it asks its strategy for a program and
//! tells it when that program went live. The default strategy runs the include
//! preprocessor and the backend; hosts can swap in their own per record.

use crate::backend::CompileBackend;
use crate::compile::{compile_program, Compiled, ErrorRecord};
use crate::diagnostics::annotate_log;
use crate::library::LibraryMap;
use crate::preprocess::{preprocess, Preprocessed};
use crate::stage::{Stage, StageMap};

pub trait CompileStrategy<B: CompileBackend> {
    /// Produce a program from the current stage texts, or the errors explaining why not.
    ///
    /// `Err` is for failures of the strategy itself (not of the shader); the
    /// engine then leaves the record exactly as it was.
    fn needs_compilation(
        &mut self,
        backend: &mut B,
        stages: &StageMap<String>,
        libs: &LibraryMap,
    ) -> anyhow::Result<Compiled<B::Program>>;

    /// Called once the new program is installed, before the old one is released.
    fn after_compilation(&mut self, _program: B::Program) -> anyhow::Result<()> {
        Ok(())
    }
}

type AfterFn<P> = Box<dyn FnMut(P) -> anyhow::Result<()>>;

pub struct DefaultStrategy<B: CompileBackend> {
    preprocess: bool,
    after: Option<AfterFn<B::Program>>,
}

impl<B: CompileBackend> DefaultStrategy<B> {
    pub fn new() -> Self {
        Self { preprocess: true, after: None }
    }

    /// Compile the stage texts verbatim, `#include` lines included.
    pub fn without_preprocessor() -> Self {
        Self { preprocess: false, after: None }
    }

    pub fn on_after_compilation(
        mut self,
        f: impl FnMut(B::Program) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.after = Some(Box::new(f));
        self
    }
}

impl<B: CompileBackend> Default for DefaultStrategy<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CompileBackend> CompileStrategy<B> for DefaultStrategy<B> {
    fn needs_compilation(
        &mut self,
        backend: &mut B,
        stages: &StageMap<String>,
        libs: &LibraryMap,
    ) -> anyhow::Result<Compiled<B::Program>> {
        if !self.preprocess {
            let mut out = compile_program(backend, &stages[Stage::Vertex], &stages[Stage::Fragment]);
            annotate(&mut out.errors, &StageMap::default());
            return Ok(out);
        }

        let mut errors = ErrorRecord::new();
        let mut expanded: StageMap<Option<Preprocessed>> = StageMap::default();
        for (stage, text) in stages.iter() {
            match preprocess(text, libs) {
                Ok(pre) => expanded[stage] = Some(pre),
                Err(e) => errors.set_stage(stage, e.to_string()),
            }
        }
        // The backend never sees text that failed to preprocess.
        if !errors.is_empty() {
            return Ok(Compiled::failed(errors));
        }

        let source = |stage: Stage| expanded[stage].as_ref().map_or("", |p| p.source.as_str());
        let mut out = compile_program(backend, source(Stage::Vertex), source(Stage::Fragment));
        annotate(&mut out.errors, &expanded);
        Ok(out)
    }

    fn after_compilation(&mut self, program: B::Program) -> anyhow::Result<()> {
        match self.after.as_mut() {
            Some(f) => f(program),
            None => Ok(()),
        }
    }
}

fn annotate(errors: &mut ErrorRecord, expanded: &StageMap<Option<Preprocessed>>) {
    for stage in Stage::ALL {
        if let Some(log) = errors.stage(stage) {
            let pretty = annotate_log(log, stage, expanded[stage].as_ref());
            errors.set_stage(stage, pretty);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::fake::{FakeBackend, FakeProgram};

    fn stages(vs: &str, fs: &str) -> StageMap<String> {
        StageMap::new(vs.to_string(), fs.to_string())
    }

    #[test]
    fn missing_include_never_reaches_the_backend() {
        let mut be = FakeBackend::new();
        let mut s = DefaultStrategy::<FakeBackend>::new();
        let out = s
            .needs_compilation(&mut be, &stages("void main() {}\n", "#include<gone>\n"), &LibraryMap::new())
            .unwrap();
        assert!(out.program.is_none());
        assert!(out.errors.stage(Stage::Fragment).unwrap().contains("<gone>"));
        assert_eq!(be.compile_calls, 0);
    }

    #[test]
    fn library_errors_are_attributed_to_the_library() {
        let mut be = FakeBackend::new();
        let libs: LibraryMap = [("noise", "float n;\n#error bad noise\n")].into_iter().collect();
        let mut s = DefaultStrategy::<FakeBackend>::new();
        let out = s
            .needs_compilation(&mut be, &stages("void main() {}\n", "#include<noise>\n"), &libs)
            .unwrap();
        assert_eq!(
            out.errors.stage(Stage::Fragment),
            Some("ERROR: lib noise:2: '#error' : bad noise")
        );
    }

    #[test]
    fn raw_mode_compiles_include_lines_verbatim() {
        let mut be = FakeBackend::new();
        let libs: LibraryMap = [("bad", "#error never expanded\n")].into_iter().collect();
        let mut s = DefaultStrategy::<FakeBackend>::without_preprocessor();
        let out = s
            .needs_compilation(&mut be, &stages("void main() {}\n", "#include<bad>\n"), &libs)
            .unwrap();
        assert!(out.program.is_some());
    }

    #[test]
    fn after_callback_sees_the_new_program() {
        let seen: Rc<RefCell<Vec<FakeProgram>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let mut s = DefaultStrategy::<FakeBackend>::new().on_after_compilation(move |p| {
            sink.borrow_mut().push(p);
            Ok(())
        });
        s.after_compilation(FakeProgram(7)).unwrap();
        assert_eq!(*seen.borrow(), vec![FakeProgram(7)]);
    }
}
