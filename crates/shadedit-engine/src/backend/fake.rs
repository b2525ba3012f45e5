//! Deterministic in-memory backend for tests.
//!
//! - a stage fails to compile when one of its lines starts with `#error`
//! - linking fails when either attached stage mentions `LINK_FAIL`
//!
//! Every live handle is tracked so tests can check that failure paths don't leak.

use std::collections::{BTreeMap, BTreeSet};

use super::CompileBackend;
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FakeShader(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FakeProgram(pub u32);

#[derive(Debug, Default)]
pub struct FakeBackend {
    next_id: u32,
    shaders: BTreeMap<u32, (Stage, String)>,
    programs: BTreeMap<u32, Vec<u32>>,
    logs: BTreeMap<u32, String>,
    pub compile_calls: usize,
    pub link_calls: usize,
    pub deleted_programs: Vec<FakeProgram>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> BTreeSet<FakeProgram> {
        self.programs.keys().map(|id| FakeProgram(*id)).collect()
    }

    pub fn is_live(&self, program: FakeProgram) -> bool {
        self.programs.contains_key(&program.0)
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl CompileBackend for FakeBackend {
    type Shader = FakeShader;
    type Program = FakeProgram;

    fn create_shader(&mut self, stage: Stage) -> Result<FakeShader, String> {
        let id = self.next();
        self.shaders.insert(id, (stage, String::new()));
        Ok(FakeShader(id))
    }

    fn shader_source(&mut self, shader: FakeShader, source: &str) {
        if let Some(entry) = self.shaders.get_mut(&shader.0) {
            entry.1 = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: FakeShader) -> bool {
        self.compile_calls += 1;
        let Some((_, source)) = self.shaders.get(&shader.0) else {
            return false;
        };
        // Honors `#line <line> <string>` like a real driver.
        let (mut string_no, mut line_no) = (0usize, 1usize);
        let mut failure = None;
        for line in source.lines() {
            let line = line.trim_start();
            if let Some(rest) = line.strip_prefix("#line") {
                let mut nums = rest.split_whitespace().filter_map(|n| n.parse::<usize>().ok());
                line_no = nums.next().unwrap_or(line_no);
                string_no = nums.next().unwrap_or(string_no);
                continue;
            }
            if let Some(msg) = line.strip_prefix("#error") {
                failure = Some(format!("ERROR: {string_no}:{line_no}: '#error' : {}", msg.trim()));
                break;
            }
            line_no += 1;
        }
        match failure {
            Some(log) => {
                self.logs.insert(shader.0, log);
                false
            }
            None => true,
        }
    }

    fn shader_info_log(&mut self, shader: FakeShader) -> String {
        self.logs.get(&shader.0).cloned().unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: FakeShader) {
        self.shaders.remove(&shader.0);
        self.logs.remove(&shader.0);
    }

    fn create_program(&mut self) -> Result<FakeProgram, String> {
        let id = self.next();
        self.programs.insert(id, Vec::new());
        Ok(FakeProgram(id))
    }

    fn attach_shader(&mut self, program: FakeProgram, shader: FakeShader) {
        if let Some(attached) = self.programs.get_mut(&program.0) {
            attached.push(shader.0);
        }
    }

    fn detach_shader(&mut self, program: FakeProgram, shader: FakeShader) {
        if let Some(attached) = self.programs.get_mut(&program.0) {
            attached.retain(|id| *id != shader.0);
        }
    }

    fn link_program(&mut self, program: FakeProgram) -> bool {
        self.link_calls += 1;
        let Some(attached) = self.programs.get(&program.0) else {
            return false;
        };
        let broken = attached.iter().any(|id| {
            self.shaders
                .get(id)
                .is_some_and(|(_, src)| src.contains("LINK_FAIL"))
        });
        if broken {
            self.logs
                .insert(program.0, "error: vertex output does not match fragment input".into());
        }
        !broken
    }

    fn program_info_log(&mut self, program: FakeProgram) -> String {
        self.logs.get(&program.0).cloned().unwrap_or_default()
    }

    fn delete_program(&mut self, program: FakeProgram) {
        if self.programs.remove(&program.0).is_some() {
            self.deleted_programs.push(program);
        }
        self.logs.remove(&program.0);
    }
}
