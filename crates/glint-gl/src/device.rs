//! [`GlDevice`] — the device capability over raw OpenGL.

use std::marker::PhantomData;
use std::sync::Once;

use anyhow::ensure;
use gl::types::{GLenum, GLint, GLsizei, GLsizeiptr, GLuint};
use glint_core::glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use glint_core::{
    BufferTarget, ClearValue, Device, GpuContext, RawBuffer, RawProgram, RawShader, ShaderStage,
    StorageBlockInfo, UniformInfo,
};
use tracing::debug;

use crate::ext;

static GL_INIT_ONCE: Once = Once::new();

fn gl_target(target: BufferTarget) -> GLenum {
    match target {
        BufferTarget::Array => gl::ARRAY_BUFFER,
        BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
        BufferTarget::ShaderStorage => gl::SHADER_STORAGE_BUFFER,
        BufferTarget::Uniform => gl::UNIFORM_BUFFER,
        BufferTarget::AtomicCounter => gl::ATOMIC_COUNTER_BUFFER,
        BufferTarget::DispatchIndirect => gl::DISPATCH_INDIRECT_BUFFER,
        BufferTarget::DrawIndirect => gl::DRAW_INDIRECT_BUFFER,
        BufferTarget::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
        BufferTarget::CopyRead => gl::COPY_READ_BUFFER,
        BufferTarget::CopyWrite => gl::COPY_WRITE_BUFFER,
    }
}

fn gl_stage(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
        ShaderStage::TessControl => gl::TESS_CONTROL_SHADER,
        ShaderStage::TessEvaluation => gl::TESS_EVALUATION_SHADER,
        ShaderStage::Compute => gl::COMPUTE_SHADER,
    }
}

/// The device capability implemented over the thread's current OpenGL
/// context.
///
/// All methods issue GL commands directly; see the crate-level safety note.
pub struct GlDevice {
    // GL contexts are thread-affine; keep the device off Send/Sync.
    _not_send: PhantomData<*const ()>,
}

impl GlDevice {
    /// Load GL function pointers (once per process) and verify the context
    /// provides the direct-state-access and compute entry points.
    pub fn new() -> anyhow::Result<Self> {
        GL_INIT_ONCE.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        });

        ensure!(
            gl::CreateBuffers::is_loaded() && gl::NamedBufferStorage::is_loaded(),
            "OpenGL 4.5 direct state access is unavailable"
        );
        ensure!(
            gl::DispatchComputeIndirect::is_loaded(),
            "OpenGL 4.3 compute dispatch is unavailable"
        );
        debug!("GL device ready");

        Ok(Self {
            _not_send: PhantomData,
        })
    }

    /// Wrap this device in a fresh [`GpuContext`].
    pub fn into_context(self) -> GpuContext {
        GpuContext::new(Box::new(self))
    }
}

fn resource_name(program: GLuint, interface: GLenum, index: GLuint, name_len: GLint) -> String {
    let mut buf = vec![0u8; name_len.max(1) as usize];
    let mut written: GLsizei = 0;
    unsafe {
        gl::GetProgramResourceName(
            program,
            interface,
            index,
            buf.len() as GLsizei,
            &mut written,
            buf.as_mut_ptr().cast(),
        );
    }
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

impl Device for GlDevice {
    fn create_buffer(&self) -> RawBuffer {
        let mut id = 0;
        unsafe {
            gl::CreateBuffers(1, &mut id);
        }
        RawBuffer(id)
    }

    fn delete_buffer(&self, buffer: RawBuffer) {
        unsafe {
            gl::DeleteBuffers(1, &buffer.0);
        }
    }

    fn buffer_storage(&self, buffer: RawBuffer, size: usize) {
        unsafe {
            gl::NamedBufferStorage(
                buffer.0,
                size as GLsizeiptr,
                std::ptr::null(),
                gl::DYNAMIC_STORAGE_BIT,
            );
        }
    }

    fn write_buffer(&self, buffer: RawBuffer, offset: usize, data: &[u8]) {
        unsafe {
            gl::NamedBufferSubData(
                buffer.0,
                offset as GLsizeiptr,
                data.len() as GLsizeiptr,
                data.as_ptr().cast(),
            );
        }
    }

    fn read_buffer(&self, buffer: RawBuffer, offset: usize, out: &mut [u8]) {
        unsafe {
            gl::GetNamedBufferSubData(
                buffer.0,
                offset as GLsizeiptr,
                out.len() as GLsizeiptr,
                out.as_mut_ptr().cast(),
            );
        }
    }

    fn clear_buffer(&self, buffer: RawBuffer, value: ClearValue) {
        let (internal_format, format, type_, bytes) = match value {
            ClearValue::I32(v) => (gl::R32I, gl::RED_INTEGER, gl::INT, v.to_ne_bytes()),
            ClearValue::U32(v) => (gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT, v.to_ne_bytes()),
            ClearValue::F32(v) => (gl::R32F, gl::RED, gl::FLOAT, v.to_ne_bytes()),
        };
        unsafe {
            gl::ClearNamedBufferData(
                buffer.0,
                internal_format,
                format,
                type_,
                bytes.as_ptr().cast(),
            );
        }
    }

    fn memory_barrier(&self) {
        unsafe {
            gl::MemoryBarrier(gl::ALL_BARRIER_BITS);
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: RawBuffer) {
        unsafe {
            gl::BindBuffer(gl_target(target), buffer.0);
        }
    }

    fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: RawBuffer) {
        unsafe {
            gl::BindBufferBase(gl_target(target), index, buffer.0);
        }
    }

    fn buffer_gpu_address(&self, buffer: RawBuffer) -> u64 {
        ext::buffer_gpu_address(buffer.0)
    }

    fn max_binding_points(&self, target: BufferTarget) -> u32 {
        let limit = match target {
            BufferTarget::ShaderStorage => gl::MAX_SHADER_STORAGE_BUFFER_BINDINGS,
            BufferTarget::Uniform => gl::MAX_UNIFORM_BUFFER_BINDINGS,
            BufferTarget::AtomicCounter => gl::MAX_ATOMIC_COUNTER_BUFFER_BINDINGS,
            BufferTarget::TransformFeedback => gl::MAX_TRANSFORM_FEEDBACK_BUFFERS,
            _ => return 0,
        };
        let mut points = 0;
        unsafe {
            gl::GetIntegerv(limit, &mut points);
        }
        points.max(0) as u32
    }

    fn create_shader(&self, stage: ShaderStage) -> RawShader {
        RawShader(unsafe { gl::CreateShader(gl_stage(stage)) })
    }

    fn delete_shader(&self, shader: RawShader) {
        unsafe {
            gl::DeleteShader(shader.0);
        }
    }

    fn shader_source(&self, shader: RawShader, source: &str) {
        let ptr = source.as_ptr().cast();
        let len = source.len() as GLint;
        unsafe {
            gl::ShaderSource(shader.0, 1, &ptr, &len);
        }
    }

    fn register_include(&self, path: &str, source: &str) {
        ext::named_string(path, source);
    }

    fn compile_shader(&self, shader: RawShader) -> bool {
        let mut status = 0;
        unsafe {
            gl::CompileShader(shader.0);
            gl::GetShaderiv(shader.0, gl::COMPILE_STATUS, &mut status);
        }
        status != 0
    }

    fn shader_info_log(&self, shader: RawShader) -> String {
        let mut len = 0;
        unsafe {
            gl::GetShaderiv(shader.0, gl::INFO_LOG_LENGTH, &mut len);
        }
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetShaderInfoLog(shader.0, len, &mut written, buf.as_mut_ptr().cast());
        }
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn create_program(&self) -> RawProgram {
        RawProgram(unsafe { gl::CreateProgram() })
    }

    fn delete_program(&self, program: RawProgram) {
        unsafe {
            gl::DeleteProgram(program.0);
        }
    }

    fn attach_shader(&self, program: RawProgram, shader: RawShader) {
        unsafe {
            gl::AttachShader(program.0, shader.0);
        }
    }

    fn detach_shader(&self, program: RawProgram, shader: RawShader) {
        unsafe {
            gl::DetachShader(program.0, shader.0);
        }
    }

    fn link_program(&self, program: RawProgram) -> bool {
        let mut status = 0;
        unsafe {
            gl::LinkProgram(program.0);
            gl::GetProgramiv(program.0, gl::LINK_STATUS, &mut status);
        }
        status != 0
    }

    fn program_info_log(&self, program: RawProgram) -> String {
        let mut len = 0;
        unsafe {
            gl::GetProgramiv(program.0, gl::INFO_LOG_LENGTH, &mut len);
        }
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        unsafe {
            gl::GetProgramInfoLog(program.0, len, &mut written, buf.as_mut_ptr().cast());
        }
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn use_program(&self, program: RawProgram) {
        unsafe {
            gl::UseProgram(program.0);
        }
    }

    fn active_uniforms(&self, program: RawProgram) -> Vec<UniformInfo> {
        const PROPS: [GLenum; 4] = [gl::BLOCK_INDEX, gl::TYPE, gl::LOCATION, gl::NAME_LENGTH];
        let mut count = 0;
        unsafe {
            gl::GetProgramInterfaceiv(program.0, gl::UNIFORM, gl::ACTIVE_RESOURCES, &mut count);
        }

        let mut uniforms = Vec::new();
        for index in 0..count.max(0) as GLuint {
            let mut values = [0 as GLint; 4];
            unsafe {
                gl::GetProgramResourceiv(
                    program.0,
                    gl::UNIFORM,
                    index,
                    PROPS.len() as GLsizei,
                    PROPS.as_ptr(),
                    values.len() as GLsizei,
                    std::ptr::null_mut(),
                    values.as_mut_ptr(),
                );
            }
            // Block members are synchronized through their buffer, not here.
            if values[0] != -1 {
                continue;
            }
            uniforms.push(UniformInfo {
                name: resource_name(program.0, gl::UNIFORM, index, values[3]),
                type_code: values[1] as u32,
                location: values[2],
            });
        }
        uniforms
    }

    fn storage_blocks(&self, program: RawProgram) -> Vec<StorageBlockInfo> {
        const PROPS: [GLenum; 2] = [gl::BUFFER_BINDING, gl::NAME_LENGTH];
        let mut count = 0;
        unsafe {
            gl::GetProgramInterfaceiv(
                program.0,
                gl::SHADER_STORAGE_BLOCK,
                gl::ACTIVE_RESOURCES,
                &mut count,
            );
        }

        let mut blocks = Vec::new();
        for index in 0..count.max(0) as GLuint {
            let mut values = [0 as GLint; 2];
            unsafe {
                gl::GetProgramResourceiv(
                    program.0,
                    gl::SHADER_STORAGE_BLOCK,
                    index,
                    PROPS.len() as GLsizei,
                    PROPS.as_ptr(),
                    values.len() as GLsizei,
                    std::ptr::null_mut(),
                    values.as_mut_ptr(),
                );
            }
            blocks.push(StorageBlockInfo {
                name: resource_name(program.0, gl::SHADER_STORAGE_BLOCK, index, values[1]),
                binding: values[0].max(0) as u32,
            });
        }
        blocks
    }

    fn uniform_f32(&self, program: RawProgram, location: i32, v: f32) {
        unsafe {
            gl::ProgramUniform1f(program.0, location, v);
        }
    }

    fn uniform_f64(&self, program: RawProgram, location: i32, v: f64) {
        unsafe {
            gl::ProgramUniform1d(program.0, location, v);
        }
    }

    fn uniform_i32(&self, program: RawProgram, location: i32, v: i32) {
        unsafe {
            gl::ProgramUniform1i(program.0, location, v);
        }
    }

    fn uniform_u32(&self, program: RawProgram, location: i32, v: u32) {
        unsafe {
            gl::ProgramUniform1ui(program.0, location, v);
        }
    }

    fn uniform_u64(&self, program: RawProgram, location: i32, v: u64) {
        ext::program_uniform_u64(program.0, location, v);
    }

    fn uniform_vec2(&self, program: RawProgram, location: i32, v: Vec2) {
        let a = v.to_array();
        unsafe {
            gl::ProgramUniform2fv(program.0, location, 1, a.as_ptr());
        }
    }

    fn uniform_vec3(&self, program: RawProgram, location: i32, v: Vec3) {
        let a = v.to_array();
        unsafe {
            gl::ProgramUniform3fv(program.0, location, 1, a.as_ptr());
        }
    }

    fn uniform_vec4(&self, program: RawProgram, location: i32, v: Vec4) {
        let a = v.to_array();
        unsafe {
            gl::ProgramUniform4fv(program.0, location, 1, a.as_ptr());
        }
    }

    fn uniform_mat2(&self, program: RawProgram, location: i32, v: &Mat2) {
        let m = v.to_cols_array();
        unsafe {
            gl::ProgramUniformMatrix2fv(program.0, location, 1, gl::FALSE, m.as_ptr());
        }
    }

    fn uniform_mat3(&self, program: RawProgram, location: i32, v: &Mat3) {
        let m = v.to_cols_array();
        unsafe {
            gl::ProgramUniformMatrix3fv(program.0, location, 1, gl::FALSE, m.as_ptr());
        }
    }

    fn uniform_mat4(&self, program: RawProgram, location: i32, v: &Mat4) {
        let m = v.to_cols_array();
        unsafe {
            gl::ProgramUniformMatrix4fv(program.0, location, 1, gl::FALSE, m.as_ptr());
        }
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        unsafe {
            gl::DispatchCompute(x, y, z);
        }
    }

    fn dispatch_compute_indirect(&self, offset: usize) {
        unsafe {
            gl::DispatchComputeIndirect(offset as gl::types::GLintptr);
        }
    }
}
