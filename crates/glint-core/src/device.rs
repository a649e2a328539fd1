//! The graphics-device capability consumed by every resource type.
//!
//! [`Device`] is an explicit object handed to [`GpuContext`](crate::GpuContext)
//! at construction, so independent contexts (including in-memory test
//! devices) can coexist in one process. The trait mirrors the retained-mode
//! surface of a modern GL-class backend: named buffer storage, indexed
//! binds, stage compilation, program linking and introspection, per-kind
//! uniform upload by location, and direct/indirect compute dispatch.
//!
//! All methods are assumed to succeed against a valid device context;
//! failures other than the explicitly checked compile/link status are
//! unexpected and fatal. Implementations perform no internal locking — the
//! caller issues commands from a single logical thread.

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

/// Device handle of a buffer object. Zero is never a live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBuffer(pub u32);

/// Device handle of a shader stage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawShader(pub u32);

/// Device handle of a linked program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawProgram(pub u32);

/// Buffer binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Vertex index data.
    ElementArray,
    /// Shader storage blocks.
    ShaderStorage,
    /// Uniform blocks.
    Uniform,
    /// Atomic counters.
    AtomicCounter,
    /// Indirect compute dispatch commands.
    DispatchIndirect,
    /// Indirect draw commands.
    DrawIndirect,
    /// Transform feedback capture.
    TransformFeedback,
    /// Copy source.
    CopyRead,
    /// Copy destination.
    CopyWrite,
}

impl BufferTarget {
    /// Every binding target, in declaration order. Drives binding-cache
    /// pre-population.
    pub const ALL: [BufferTarget; 10] = [
        BufferTarget::Array,
        BufferTarget::ElementArray,
        BufferTarget::ShaderStorage,
        BufferTarget::Uniform,
        BufferTarget::AtomicCounter,
        BufferTarget::DispatchIndirect,
        BufferTarget::DrawIndirect,
        BufferTarget::TransformFeedback,
        BufferTarget::CopyRead,
        BufferTarget::CopyWrite,
    ];

    /// Targets that expose numbered binding points for `bind_buffer_base`.
    pub const INDEXED: [BufferTarget; 4] = [
        BufferTarget::ShaderStorage,
        BufferTarget::Uniform,
        BufferTarget::AtomicCounter,
        BufferTarget::TransformFeedback,
    ];
}

/// Pipeline stages a shader object can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

/// Scalar fill value for whole-buffer clears. The value is replicated
/// across the buffer as a 4-byte channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    I32(i32),
    U32(u32),
    F32(f32),
}

/// One active top-level (non-block) uniform reported by program
/// introspection.
#[derive(Debug, Clone)]
pub struct UniformInfo {
    pub name: String,
    /// Device-reported type code (GLSL type enumerant).
    pub type_code: u32,
    pub location: i32,
}

/// One active named storage block reported by program introspection.
#[derive(Debug, Clone)]
pub struct StorageBlockInfo {
    pub name: String,
    /// The binding-point index assigned at link time.
    pub binding: u32,
}

/// The graphics-device capability.
///
/// Handles returned by the `create_*` methods are owned by exactly one
/// caller and must be released exactly once through the matching
/// `delete_*` method.
pub trait Device {
    // -----------------------------------------------------------------------
    // Buffers
    // -----------------------------------------------------------------------

    /// Create a new buffer object with no storage.
    fn create_buffer(&self) -> RawBuffer;

    /// Release a buffer object. Deleting a bound buffer reverts its binding
    /// points to zero on the device.
    fn delete_buffer(&self, buffer: RawBuffer);

    /// Allocate `size` bytes of storage, replacing any prior allocation.
    fn buffer_storage(&self, buffer: RawBuffer, size: usize);

    /// Upload `data` starting at byte `offset`.
    fn write_buffer(&self, buffer: RawBuffer, offset: usize, data: &[u8]);

    /// Read `out.len()` bytes starting at byte `offset`. May incur opaque
    /// device latency.
    fn read_buffer(&self, buffer: RawBuffer, offset: usize, out: &mut [u8]);

    /// Fill the entire buffer with a replicated 4-byte scalar channel.
    fn clear_buffer(&self, buffer: RawBuffer, value: ClearValue);

    /// Make prior writes visible to subsequent shader reads.
    fn memory_barrier(&self);

    /// Bind a buffer to a target.
    fn bind_buffer(&self, target: BufferTarget, buffer: RawBuffer);

    /// Bind a buffer to a numbered binding point of an indexed target. Also
    /// rebinds the general target on the device.
    fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: RawBuffer);

    /// Resolve and pin a persistent GPU virtual address for the buffer.
    fn buffer_gpu_address(&self, buffer: RawBuffer) -> u64;

    /// Number of binding points the device exposes for an indexed target;
    /// zero for non-indexed targets.
    fn max_binding_points(&self, target: BufferTarget) -> u32;

    // -----------------------------------------------------------------------
    // Shaders
    // -----------------------------------------------------------------------

    /// Create a shader object for one pipeline stage.
    fn create_shader(&self, stage: ShaderStage) -> RawShader;

    /// Release a shader object.
    fn delete_shader(&self, shader: RawShader);

    /// Replace the shader's source text.
    fn shader_source(&self, shader: RawShader, source: &str);

    /// Register include text under a virtual path for textual inclusion by
    /// subsequently compiled shaders.
    fn register_include(&self, path: &str, source: &str);

    /// Compile the shader; returns the compile status.
    fn compile_shader(&self, shader: RawShader) -> bool;

    /// The diagnostic log of the most recent compile.
    fn shader_info_log(&self, shader: RawShader) -> String;

    // -----------------------------------------------------------------------
    // Programs
    // -----------------------------------------------------------------------

    /// Create an empty program object.
    fn create_program(&self) -> RawProgram;

    /// Release a program object.
    fn delete_program(&self, program: RawProgram);

    /// Attach a compiled stage to the program.
    fn attach_shader(&self, program: RawProgram, shader: RawShader);

    /// Detach a stage from the program without destroying it.
    fn detach_shader(&self, program: RawProgram, shader: RawShader);

    /// Link the attached stages; returns the link status.
    fn link_program(&self, program: RawProgram) -> bool;

    /// The diagnostic log of the most recent link.
    fn program_info_log(&self, program: RawProgram) -> String;

    /// Make the program current for subsequent draw/dispatch commands.
    fn use_program(&self, program: RawProgram);

    /// Enumerate the program's active top-level (non-block) uniforms.
    fn active_uniforms(&self, program: RawProgram) -> Vec<UniformInfo>;

    /// Enumerate the program's active named storage blocks.
    fn storage_blocks(&self, program: RawProgram) -> Vec<StorageBlockInfo>;

    // -----------------------------------------------------------------------
    // Uniform upload by location
    // -----------------------------------------------------------------------

    fn uniform_f32(&self, program: RawProgram, location: i32, v: f32);
    fn uniform_f64(&self, program: RawProgram, location: i32, v: f64);
    fn uniform_i32(&self, program: RawProgram, location: i32, v: i32);
    fn uniform_u32(&self, program: RawProgram, location: i32, v: u32);

    /// Upload a 64-bit unsigned handle (bindless resource addresses).
    fn uniform_u64(&self, program: RawProgram, location: i32, v: u64);

    fn uniform_vec2(&self, program: RawProgram, location: i32, v: Vec2);
    fn uniform_vec3(&self, program: RawProgram, location: i32, v: Vec3);
    fn uniform_vec4(&self, program: RawProgram, location: i32, v: Vec4);
    fn uniform_mat2(&self, program: RawProgram, location: i32, v: &Mat2);
    fn uniform_mat3(&self, program: RawProgram, location: i32, v: &Mat3);
    fn uniform_mat4(&self, program: RawProgram, location: i32, v: &Mat4);

    // -----------------------------------------------------------------------
    // Compute dispatch
    // -----------------------------------------------------------------------

    /// Dispatch with explicit workgroup counts.
    fn dispatch_compute(&self, x: u32, y: u32, z: u32);

    /// Dispatch reading workgroup counts from the buffer currently bound to
    /// [`BufferTarget::DispatchIndirect`], at byte `offset`.
    fn dispatch_compute_indirect(&self, offset: usize);
}
