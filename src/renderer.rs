use glow::{Context, HasContext as _};
use nalgebra::Matrix4;

const VERTEX_SHADER: &str = r#"#version 300 es
    precision highp float;
    uniform mat4 u_mvp;
    layout(location = 0) in vec3 a_pos;
    layout(location = 1) in vec3 a_col;
    out vec3 v_col;
    void main() {
        v_col = a_col;
        gl_Position = u_mvp * vec4(a_pos, 1.0);
    }"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
    precision mediump float;
    in  vec3 v_col;
    out vec4 o_col;
    void main() { o_col = vec4(v_col, 1.0); }"#;

/// One vertex buffer plus the primitive mode it is drawn with.
struct Batch {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    vertex_count: i32,
    mode: u32,
}

impl Batch {
    unsafe fn new(gl: &Context, mode: u32) -> Self {
        unsafe {
            let vao = gl.create_vertex_array().unwrap();
            let vbo = gl.create_buffer().unwrap();

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            // 6 floats per vertex: xyz rgb
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 24, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, 24, 12);

            Self {
                vao,
                vbo,
                vertex_count: 0,
                mode,
            }
        }
    }

    unsafe fn upload(&mut self, gl: &Context, verts: &[f32]) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(verts),
                glow::STATIC_DRAW,
            );
            self.vertex_count = (verts.len() / 6) as i32;
        }
    }

    unsafe fn draw(&self, gl: &Context) {
        if self.vertex_count == 0 {
            return;
        }
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(self.mode, 0, self.vertex_count);
        }
    }
}

/// Paints the viewport scene: shaded triangles for the solid view, line
/// segments for wireframe edges and the axis helper.
pub struct GpuScene {
    program: glow::Program,
    u_mvp: glow::UniformLocation,
    triangles: Batch,
    lines: Batch,
}

unsafe impl Send for GpuScene {}
unsafe impl Sync for GpuScene {}

impl GpuScene {
    pub unsafe fn new(gl: &Context) -> Self {
        unsafe {
            let program = {
                let vs = gl.create_shader(glow::VERTEX_SHADER).unwrap();
                gl.shader_source(vs, VERTEX_SHADER);
                gl.compile_shader(vs);

                let fs = gl.create_shader(glow::FRAGMENT_SHADER).unwrap();
                gl.shader_source(fs, FRAGMENT_SHADER);
                gl.compile_shader(fs);

                let prog = gl.create_program().unwrap();
                gl.attach_shader(prog, vs);
                gl.attach_shader(prog, fs);
                gl.link_program(prog);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                prog
            };

            let u_mvp = gl.get_uniform_location(program, "u_mvp").unwrap();
            let triangles = Batch::new(gl, glow::TRIANGLES);
            let lines = Batch::new(gl, glow::LINES);

            Self {
                program,
                u_mvp,
                triangles,
                lines,
            }
        }
    }

    pub unsafe fn upload_triangles(&mut self, gl: &Context, verts: &[f32]) {
        unsafe { self.triangles.upload(gl, verts) }
    }

    pub unsafe fn upload_lines(&mut self, gl: &Context, verts: &[f32]) {
        unsafe { self.lines.upload(gl, verts) }
    }

    pub unsafe fn paint(&self, gl: &Context, mvp: Matrix4<f32>) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(Some(&self.u_mvp), false, mvp.as_slice());
            gl.clear(glow::DEPTH_BUFFER_BIT);
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
            self.triangles.draw(gl);
            self.lines.draw(gl);
            gl.disable(glow::DEPTH_TEST);
        }
    }
}
