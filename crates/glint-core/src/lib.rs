//! GPU resource and shader-pipeline management core.
//!
//! This crate manages device memory buffers, compiled/linked shader programs,
//! and the runtime-introspected uniform and storage-block bindings that
//! connect CPU-side values to GPU-side pipeline state.
//!
//! # Overview
//!
//! - [`Device`] is the capability the graphics backend provides: buffer
//!   storage, binding, shader compilation, program linking, introspection,
//!   uniform upload, and compute dispatch.
//! - [`GpuContext`] owns a device plus the binding-state cache and the named
//!   buffer registry shared by every resource created from it.
//! - [`Buffer`] / [`TypedBuffer`] are device memory allocations with cached
//!   (redundancy-eliminating) bind operations and destructive resize.
//! - [`Shader`] compiles one pipeline stage, optionally with named includes.
//! - [`ShaderProgram`] links stages, introspects active uniforms and storage
//!   blocks, and synchronizes CPU state to the device on [`ShaderProgram::update`].
//! - [`Uniform`] is a dirty-tracked, type-checked per-uniform slot whose
//!   upload operation is resolved once from the device-reported type.
//! - [`ComputeShader`] pairs a compute stage with an indirect-dispatch
//!   command buffer.
//!
//! All operations assume a single command-issuing thread; callers that share
//! a context across threads must serialize externally.

pub use glam;

pub mod buffer;
pub mod compute;
pub mod context;
pub mod device;
pub mod error;
pub mod program;
pub mod shader;
pub mod uniform;

// Re-export primary types at crate root for convenience.
pub use buffer::{Buffer, ScalarPod, TypedBuffer};
pub use compute::{ComputeGroupSize, ComputeShader};
pub use context::GpuContext;
pub use device::{
    BufferTarget, ClearValue, Device, RawBuffer, RawProgram, RawShader, ShaderStage,
    StorageBlockInfo, UniformInfo,
};
pub use error::{Error, Result};
pub use program::ShaderProgram;
pub use shader::{Shader, ShaderInclude};
pub use uniform::{Uniform, UniformKind, UniformValue};
