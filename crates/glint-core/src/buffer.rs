//! Device memory buffers and the strongly-typed element-array view.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::context::GpuContext;
use crate::device::{BufferTarget, ClearValue, Device, RawBuffer};
use crate::error::{Error, Result};

/// One device memory allocation.
///
/// A buffer is exclusively owned by its creator until dropped. It is
/// registered under a unique name in the context's buffer registry so
/// shader-declared storage blocks can be auto-bound by matching name; on a
/// name collision the last registration wins.
///
/// Resizing is destructive: the device allocation is deleted and recreated,
/// prior contents are lost and a previously resolved GPU address is
/// invalidated.
pub struct Buffer {
    ctx: GpuContext,
    raw: RawBuffer,
    name: String,
    target: BufferTarget,
    size: usize,
    gpu_address: Option<u64>,
}

impl Buffer {
    /// Allocate `size` bytes for `target` and register the buffer under
    /// `name`. Fails with [`Error::Validation`] on a negative size.
    pub fn new(ctx: &GpuContext, name: &str, target: BufferTarget, size: isize) -> Result<Self> {
        let size = check_size(size, "buffer size")?;
        let raw = ctx.device().create_buffer();
        ctx.device().buffer_storage(raw, size);
        ctx.register_buffer(name, raw);
        debug!(name, ?target, size, id = raw.0, "buffer created");
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            name: name.to_owned(),
            target,
            size,
            gpu_address: None,
        })
    }

    /// Size of the allocation in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The binding target this buffer was created for.
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// The registry name this buffer was created under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The device handle. Changes on resize.
    pub fn raw(&self) -> RawBuffer {
        self.raw
    }

    /// Delete the device allocation and recreate it with `size` bytes.
    ///
    /// Contents are lost, stale binding-cache entries are purged, the
    /// registry is rebound to the new handle and a resolved GPU address is
    /// invalidated. Fails with [`Error::Validation`] on a negative size; the
    /// buffer is left untouched in that case.
    pub fn resize(&mut self, size: isize) -> Result<()> {
        let size = check_size(size, "buffer size")?;
        self.ctx.forget_buffer(self.raw);
        self.ctx.deregister_buffer(&self.name, self.raw);
        self.ctx.device().delete_buffer(self.raw);
        self.raw = self.ctx.device().create_buffer();
        self.ctx.device().buffer_storage(self.raw, size);
        self.ctx.register_buffer(&self.name, self.raw);
        self.size = size;
        self.gpu_address = None;
        debug!(name = %self.name, size, id = self.raw.0, "buffer reallocated");
        Ok(())
    }

    /// Bind to this buffer's own target. A repeat bind of an already-bound
    /// buffer issues no device call.
    pub fn bind(&self) {
        self.ctx.bind_buffer(self.target, self.raw);
    }

    /// Bind to a different target, e.g. attaching a storage buffer to the
    /// indirect-dispatch slot.
    pub fn bind_to(&self, target: BufferTarget) {
        self.ctx.bind_buffer(target, self.raw);
    }

    /// Bind to binding point `index` of this buffer's own target.
    pub fn bind_base(&self, index: u32) {
        self.ctx.bind_buffer_base(self.target, index, self.raw);
    }

    /// Bind to binding point `index` of another indexed target.
    pub fn bind_base_to(&self, target: BufferTarget, index: u32) {
        self.ctx.bind_buffer_base(target, index, self.raw);
    }

    /// Fill the entire buffer with a replicated 4-byte scalar channel, then
    /// issue a memory barrier so subsequent shader reads observe the write.
    pub fn clear(&self, value: ClearValue) {
        self.ctx.device().clear_buffer(self.raw, value);
        self.ctx.device().memory_barrier();
    }

    /// Resolve and pin a persistent GPU virtual address, enabling shader
    /// access without an explicit bind. Resolved lazily on first call and
    /// cached until the next resize.
    pub fn gpu_address(&mut self) -> u64 {
        match self.gpu_address {
            Some(address) => address,
            None => {
                let address = self.ctx.device().buffer_gpu_address(self.raw);
                self.gpu_address = Some(address);
                address
            }
        }
    }

    /// Upload `data` starting at byte `offset`. The range must lie inside
    /// the allocation.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(offset, data.len(), self.size)?;
        self.ctx.device().write_buffer(self.raw, offset, data);
        Ok(())
    }

    /// Read `len` bytes starting at byte `offset`. The range must lie
    /// inside the allocation.
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        check_range(offset, len, self.size)?;
        let mut out = vec![0u8; len];
        self.ctx.device().read_buffer(self.raw, offset, &mut out);
        Ok(out)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.ctx.deregister_buffer(&self.name, self.raw);
        self.ctx.forget_buffer(self.raw);
        self.ctx.device().delete_buffer(self.raw);
    }
}

fn check_size(size: isize, what: &str) -> Result<usize> {
    usize::try_from(size).map_err(|_| Error::Validation(format!("negative {what}: {size}")))
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<()> {
    if offset.checked_add(len).is_none_or(|end| end > size) {
        return Err(Error::Validation(format!(
            "range {offset}..{} exceeds buffer size {size}",
            offset.saturating_add(len)
        )));
    }
    Ok(())
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
}

/// 4-byte scalar element types that a whole buffer can be cleared with.
///
/// The clear path treats the buffer as a single 4-byte numeric channel, so
/// it is only defined for single-scalar elements; composite element types
/// must be cleared by writing a full array instead.
pub trait ScalarPod: Pod + sealed::Sealed {
    fn clear_value(self) -> ClearValue;
}

impl ScalarPod for f32 {
    fn clear_value(self) -> ClearValue {
        ClearValue::F32(self)
    }
}

impl ScalarPod for i32 {
    fn clear_value(self) -> ClearValue {
        ClearValue::I32(self)
    }
}

impl ScalarPod for u32 {
    fn clear_value(self) -> ClearValue {
        ClearValue::U32(self)
    }
}

/// A [`Buffer`] specialized for a homogeneous array of fixed-size elements.
///
/// The data view round-trips device memory: [`write`](Self::write) uploads a
/// full array (resizing destructively if the byte length changed) and the
/// logical length tracks the written slice; [`read`](Self::read) pulls the
/// full `len`-element array back.
pub struct TypedBuffer<T: Pod> {
    buffer: Buffer,
    len: usize,
    _element: PhantomData<T>,
}

impl<T: Pod> TypedBuffer<T> {
    /// Allocate storage for `count` elements of `T`. Fails with
    /// [`Error::Validation`] on a negative count.
    pub fn new(ctx: &GpuContext, name: &str, target: BufferTarget, count: isize) -> Result<Self> {
        let count = check_size(count, "element count")?;
        let buffer = Buffer::new(
            ctx,
            name,
            target,
            (count * std::mem::size_of::<T>()) as isize,
        )?;
        Ok(Self {
            buffer,
            len: count,
            _element: PhantomData,
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying untyped buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Resize to hold `count` elements. Destructive: prior contents are
    /// lost. Fails with [`Error::Validation`] on a negative count.
    pub fn set_len(&mut self, count: isize) -> Result<()> {
        let count = check_size(count, "element count")?;
        self.buffer
            .resize((count * std::mem::size_of::<T>()) as isize)?;
        self.len = count;
        Ok(())
    }

    /// Upload a full array. If the byte length differs from the current
    /// allocation the buffer is resized (destructively) first; afterwards
    /// the logical length is `data.len()`.
    pub fn write(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != self.buffer.size() {
            self.buffer.resize(bytes.len() as isize)?;
        }
        self.buffer.write(0, bytes)?;
        self.len = data.len();
        Ok(())
    }

    /// Read the full `len`-element array back from device memory.
    pub fn read(&self) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
        check_range(0, bytes.len(), self.buffer.size())?;
        self.buffer.ctx.device().read_buffer(self.buffer.raw, 0, bytes);
        Ok(out)
    }
}

impl<T: ScalarPod> TypedBuffer<T> {
    /// Fill every element with `value`. Only available for 4-byte scalar
    /// element types; see [`ScalarPod`].
    pub fn clear(&self, value: T) {
        self.buffer.clear(value.clear_value());
    }
}
