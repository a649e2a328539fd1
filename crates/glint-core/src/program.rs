//! Shader program linking, introspection and per-frame synchronization.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::context::GpuContext;
use crate::device::{BufferTarget, Device, RawProgram};
use crate::error::{Error, Result};
use crate::shader::Shader;
use crate::uniform::{Uniform, UniformValue};

/// A linked set of pipeline stages.
///
/// Linking runs introspection once and builds two tables that are immutable
/// afterwards: name → [`Uniform`] for the active top-level uniforms, and
/// name → binding-point index for the active storage blocks.
///
/// [`update`](Self::update) is the single synchronization point: it pushes
/// every dirty uniform to the device, then re-binds, at its introspected
/// binding point, every storage block whose name matches an entry in the
/// context's buffer registry. It must be called once per draw/dispatch
/// before issuing it.
pub struct ShaderProgram {
    ctx: GpuContext,
    raw: RawProgram,
    uniforms: HashMap<String, Uniform>,
    blocks: HashMap<String, u32>,
}

impl ShaderProgram {
    /// Link `stages`, in order, into one pipeline object.
    ///
    /// On failure the program object is destroyed and [`Error::Link`]
    /// carries the device log; the stage objects stay with the caller and
    /// release their handles when dropped. On success the stages are
    /// detached (not destroyed) and introspection builds the uniform and
    /// storage-block tables.
    pub fn link(ctx: &GpuContext, stages: &[&Shader]) -> Result<Self> {
        let device = ctx.device();
        let raw = device.create_program();
        for stage in stages {
            device.attach_shader(raw, stage.raw());
        }

        if !device.link_program(raw) {
            let log = device.program_info_log(raw);
            device.delete_program(raw);
            return Err(Error::Link { log });
        }

        for stage in stages {
            device.detach_shader(raw, stage.raw());
        }

        let uniforms: HashMap<_, _> = device
            .active_uniforms(raw)
            .into_iter()
            .map(|info| (info.name.clone(), Uniform::from_info(info, raw)))
            .collect();
        let blocks: HashMap<_, _> = device
            .storage_blocks(raw)
            .into_iter()
            .map(|block| (block.name, block.binding))
            .collect();
        debug!(
            id = raw.0,
            stages = stages.len(),
            uniforms = uniforms.len(),
            storage_blocks = blocks.len(),
            "program linked"
        );

        Ok(Self {
            ctx: ctx.clone(),
            raw,
            uniforms,
            blocks,
        })
    }

    pub fn raw(&self) -> RawProgram {
        self.raw
    }

    /// Make this program current for subsequent draw/dispatch commands.
    pub fn activate(&self) {
        self.ctx.device().use_program(self.raw);
    }

    /// Synchronize CPU state to the device: push every dirty uniform, then
    /// re-bind each storage block whose name has a registry entry at its
    /// introspected binding point.
    ///
    /// A block name with no matching registry entry is left bound to
    /// whatever it previously was — a silent no-op.
    pub fn update(&mut self) {
        let device = self.ctx.device();
        for uniform in self.uniforms.values_mut() {
            uniform.push(device);
        }

        for (name, &binding) in &self.blocks {
            match self.ctx.lookup_buffer(name) {
                Some(buffer) => {
                    self.ctx
                        .bind_buffer_base(BufferTarget::ShaderStorage, binding, buffer);
                }
                None => trace!(name, binding, "storage block has no registered buffer"),
            }
        }
    }

    /// Assign a value to the named uniform. Fails with
    /// [`Error::ResourceNotFound`] for an unknown name and with
    /// [`Error::TypeMismatch`] if the value kind differs from the
    /// introspected kind.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        self.uniforms
            .get_mut(name)
            .ok_or_else(|| Error::ResourceNotFound(name.to_owned()))?
            .set(value)
    }

    /// The named uniform, if the program has one.
    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn uniform_mut(&mut self, name: &str) -> Option<&mut Uniform> {
        self.uniforms.get_mut(name)
    }

    /// The introspected binding-point index of a named storage block.
    pub fn storage_block_binding(&self, name: &str) -> Option<u32> {
        self.blocks.get(name).copied()
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.ctx.device().delete_program(self.raw);
    }
}
