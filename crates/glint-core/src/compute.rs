//! Compute stages with an indirect-dispatch command buffer.

use bytemuck::{Pod, Zeroable};

use crate::buffer::Buffer;
use crate::context::GpuContext;
use crate::device::{BufferTarget, Device, ShaderStage};
use crate::error::Result;
use crate::shader::{Shader, ShaderInclude};

/// Workgroup counts for a compute dispatch. Exactly the 12-byte record the
/// device reads from an indirect-dispatch buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ComputeGroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ComputeGroupSize {
    pub const ONE: ComputeGroupSize = ComputeGroupSize::new(1, 1, 1);

    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// A compute stage paired with an indirect-dispatch command buffer.
///
/// The workgroup-count record is mirrored in the indirect buffer: mutating
/// the record or swapping the buffer handle re-uploads the 12-byte record
/// immediately (synchronous, not deferred). Dispatching indirectly lets the
/// device read workgroup counts from the bound buffer, so a previous GPU
/// pass can compute them without a CPU round trip.
pub struct ComputeShader {
    stage: Shader,
    group_size: ComputeGroupSize,
    indirect: Buffer,
}

impl ComputeShader {
    /// Compile a compute stage from literal source or a file path and
    /// allocate its indirect-dispatch buffer, initialized to one workgroup
    /// on each axis.
    pub fn new(ctx: &GpuContext, source: &str) -> Result<Self> {
        Self::with_includes(ctx, source, &[])
    }

    /// Like [`ComputeShader::new`], registering named includes first.
    pub fn with_includes(
        ctx: &GpuContext,
        source: &str,
        includes: &[ShaderInclude],
    ) -> Result<Self> {
        let stage = Shader::with_includes(ctx, ShaderStage::Compute, source, includes)?;
        let indirect = Buffer::new(
            ctx,
            &format!("dispatch.{}", stage.raw().0),
            BufferTarget::DispatchIndirect,
            std::mem::size_of::<ComputeGroupSize>() as isize,
        )?;
        let shader = Self {
            stage,
            group_size: ComputeGroupSize::ONE,
            indirect,
        };
        shader.upload_record()?;
        Ok(shader)
    }

    /// The compute stage, for linking into a [`ShaderProgram`](crate::ShaderProgram).
    pub fn stage(&self) -> &Shader {
        &self.stage
    }

    pub fn group_size(&self) -> ComputeGroupSize {
        self.group_size
    }

    /// The buffer the device reads workgroup counts from when dispatching
    /// indirectly.
    pub fn indirect_buffer(&self) -> &Buffer {
        &self.indirect
    }

    /// Replace the workgroup-count record and re-upload it to the indirect
    /// buffer immediately.
    pub fn set_group_size(&mut self, group_size: ComputeGroupSize) -> Result<()> {
        self.group_size = group_size;
        self.upload_record()
    }

    /// Swap in a different indirect buffer and re-upload the record to it
    /// immediately. The buffer must hold at least the 12-byte record; an
    /// undersized buffer is rejected and the current one stays in place.
    pub fn set_indirect_buffer(&mut self, buffer: Buffer) -> Result<()> {
        buffer.write(0, bytemuck::bytes_of(&self.group_size))?;
        self.indirect = buffer;
        Ok(())
    }

    fn upload_record(&self) -> Result<()> {
        self.indirect.write(0, bytemuck::bytes_of(&self.group_size))
    }

    /// Issue a dispatch for the program currently active on the device.
    ///
    /// With `indirect` set, the indirect buffer is bound to the
    /// dispatch-indirect binding point and the device reads workgroup
    /// counts from it. Otherwise the in-memory record is dispatched
    /// directly, independent of the indirect buffer's contents.
    pub fn dispatch(&self, indirect: bool) {
        let device = self.stage.ctx().device();
        if indirect {
            self.indirect.bind_to(BufferTarget::DispatchIndirect);
            device.dispatch_compute_indirect(0);
        } else {
            let ComputeGroupSize { x, y, z } = self.group_size;
            device.dispatch_compute(x, y, z);
        }
    }
}
