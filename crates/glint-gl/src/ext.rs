//! Extension entry points not covered by the core GL bindings.
//!
//! Each pointer is resolved once through `gl_loader` on first use and cached.
//! Calling an accessor when the extension is absent is a fatal device
//! failure.

use std::os::raw::{c_char, c_void};

use gl::types::{GLenum, GLint, GLuint, GLuint64};
use once_cell::sync::Lazy;

/// Named-string interface of `GL_ARB_shading_language_include`.
const SHADER_INCLUDE: GLenum = 0x8DAE;

/// Buffer address query of `GL_NV_shader_buffer_load`.
const BUFFER_GPU_ADDRESS: GLenum = 0x8F1D;

type NamedStringFn =
    unsafe extern "system" fn(GLenum, GLint, *const c_char, GLint, *const c_char);
type GetNamedBufferParameterUi64Fn = unsafe extern "system" fn(GLuint, GLenum, *mut GLuint64);
type MakeNamedBufferResidentFn = unsafe extern "system" fn(GLuint, GLenum);
type ProgramUniformUi64Fn = unsafe extern "system" fn(GLuint, GLint, GLuint64);

fn proc_address(name: &str) -> *const c_void {
    gl_loader::get_proc_address(name).cast()
}

static NAMED_STRING: Lazy<Option<NamedStringFn>> = Lazy::new(|| {
    let ptr = proc_address("glNamedStringARB");
    // SAFETY: a non-null pointer from the GL loader is the named entry point.
    (!ptr.is_null()).then(|| unsafe { std::mem::transmute::<*const c_void, NamedStringFn>(ptr) })
});

static GET_BUFFER_ADDRESS: Lazy<Option<GetNamedBufferParameterUi64Fn>> = Lazy::new(|| {
    let ptr = proc_address("glGetNamedBufferParameterui64vNV");
    (!ptr.is_null()).then(|| unsafe {
        std::mem::transmute::<*const c_void, GetNamedBufferParameterUi64Fn>(ptr)
    })
});

static MAKE_RESIDENT: Lazy<Option<MakeNamedBufferResidentFn>> = Lazy::new(|| {
    let ptr = proc_address("glMakeNamedBufferResidentNV");
    (!ptr.is_null())
        .then(|| unsafe { std::mem::transmute::<*const c_void, MakeNamedBufferResidentFn>(ptr) })
});

static PROGRAM_UNIFORM_UI64: Lazy<Option<ProgramUniformUi64Fn>> = Lazy::new(|| {
    let ptr = proc_address("glProgramUniformui64NV");
    (!ptr.is_null())
        .then(|| unsafe { std::mem::transmute::<*const c_void, ProgramUniformUi64Fn>(ptr) })
});

/// Register `source` under the virtual `path` for textual inclusion.
pub(crate) fn named_string(path: &str, source: &str) {
    let f = (*NAMED_STRING).expect("GL_ARB_shading_language_include is unavailable");
    // SAFETY: both strings are passed with explicit lengths, no
    // NUL-termination is required by the entry point.
    unsafe {
        f(
            SHADER_INCLUDE,
            path.len() as GLint,
            path.as_ptr().cast(),
            source.len() as GLint,
            source.as_ptr().cast(),
        );
    }
}

/// Pin `buffer` resident and return its GPU virtual address.
pub(crate) fn buffer_gpu_address(buffer: GLuint) -> u64 {
    let make_resident = (*MAKE_RESIDENT).expect("GL_NV_shader_buffer_load is unavailable");
    let get_address = (*GET_BUFFER_ADDRESS).expect("GL_NV_shader_buffer_load is unavailable");
    let mut address = 0;
    // SAFETY: the buffer handle is live; the address out-pointer is valid.
    unsafe {
        make_resident(buffer, gl::READ_WRITE);
        get_address(buffer, BUFFER_GPU_ADDRESS, &mut address);
    }
    address
}

/// Upload a 64-bit unsigned handle uniform.
pub(crate) fn program_uniform_u64(program: GLuint, location: GLint, value: u64) {
    let f = (*PROGRAM_UNIFORM_UI64).expect("GL_NV_shader_buffer_load is unavailable");
    // SAFETY: program and location come from live introspection results.
    unsafe {
        f(program, location, value);
    }
}
