//! Graphics API collaborator.
//!
//! The engine never talks to GL directly; everything goes through `CompileBackend`,
//! which mirrors the handful of shader/program calls a compile+link cycle needs.
//! Status queries return plain booleans and the diagnostics come out-of-band
//! through the info-log getters, the same way GL reports them.

mod gl;

#[cfg(test)]
pub(crate) mod fake;

pub use gl::GlowBackend;

use std::fmt::Debug;

use crate::stage::Stage;

pub trait CompileBackend {
    type Shader: Copy + Debug;
    type Program: Copy + PartialEq + Debug;

    fn create_shader(&mut self, stage: Stage) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    /// Compile and return the compile status.
    fn compile_shader(&mut self, shader: Self::Shader) -> bool;
    fn shader_info_log(&mut self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    /// Link and return the link status.
    fn link_program(&mut self, program: Self::Program) -> bool;
    fn program_info_log(&mut self, program: Self::Program) -> String;
    fn delete_program(&mut self, program: Self::Program);
}
