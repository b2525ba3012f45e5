use std::time::Instant;

use glow::HasContext;

/// Draws the active program as one full-screen triangle.
///
/// Programs get their vertices from `gl_VertexID`, so the VAO stays empty; core
/// profiles still need one bound to draw.
///
/// Uniforms set when the program declares them:
/// - `u_time` / `iTime` (seconds since start)
/// - `u_resolution` (vec2) / `iResolution` (vec3, ShaderToy style)
#[derive(Debug)]
pub struct Presenter {
    vao: glow::NativeVertexArray,
    start: Instant,
}

impl Presenter {
    pub fn new(gl: &glow::Context) -> Result<Self, String> {
        let vao = unsafe { gl.create_vertex_array()? };
        Ok(Self { vao, start: Instant::now() })
    }

    pub fn draw(&self, gl: &glow::Context, program: Option<glow::NativeProgram>, w: i32, h: i32) {
        unsafe {
            gl.viewport(0, 0, w, h);
            gl.clear_color(0.02, 0.02, 0.02, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);

            let Some(program) = program else { return };

            gl.use_program(Some(program));
            gl.bind_vertex_array(Some(self.vao));

            let t = self.start.elapsed().as_secs_f32();
            for name in ["u_time", "iTime"] {
                if let Some(loc) = gl.get_uniform_location(program, name) {
                    gl.uniform_1_f32(Some(&loc), t);
                }
            }
            if let Some(loc) = gl.get_uniform_location(program, "u_resolution") {
                gl.uniform_2_f32(Some(&loc), w as f32, h as f32);
            }
            if let Some(loc) = gl.get_uniform_location(program, "iResolution") {
                gl.uniform_3_f32(Some(&loc), w as f32, h as f32, 1.0);
            }

            gl.draw_arrays(glow::TRIANGLES, 0, 3);

            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_vertex_array(self.vao) }
    }
}
