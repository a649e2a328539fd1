//! In-memory recording device shared by the integration tests.
//!
//! [`TestDevice`] implements the device capability against plain host
//! memory and records every externally observable call as an [`Event`].
//! [`DeviceProbe`] shares the device state, letting tests seed introspection
//! results, force link failures, and assert on exactly which device calls a
//! scenario issued.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

use glint_core::{
    BufferTarget, ClearValue, Device, GpuContext, RawBuffer, RawProgram, RawShader, ShaderStage,
    StorageBlockInfo, UniformInfo,
};

/// One externally observable device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BindBuffer(BufferTarget, u32),
    BindBufferBase(BufferTarget, u32, u32),
    Upload { program: u32, location: i32 },
    DispatchDirect(u32, u32, u32),
    DispatchIndirect(usize),
    MemoryBarrier,
    ResolveAddress(u32),
    UseProgram(u32),
    DeleteBuffer(u32),
    DeleteShader(u32),
    DeleteProgram(u32),
}

struct ShaderRecord {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

struct ProgramRecord {
    attached: Vec<u32>,
    linked: bool,
    uniforms: Vec<UniformInfo>,
    blocks: Vec<StorageBlockInfo>,
}

#[derive(Default)]
struct State {
    next_handle: u32,
    buffers: HashMap<u32, Vec<u8>>,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    includes: Vec<(String, String)>,
    bound_targets: HashMap<BufferTarget, u32>,
    bound_points: HashMap<(BufferTarget, u32), u32>,
    pending_uniforms: Vec<UniformInfo>,
    pending_blocks: Vec<StorageBlockInfo>,
    fail_next_link: Option<String>,
    events: Vec<Event>,
}

impl State {
    fn fresh_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// An in-memory device implementation.
pub struct TestDevice {
    state: Rc<RefCell<State>>,
}

/// Shared view of a [`TestDevice`]'s state for seeding and assertions.
pub struct DeviceProbe {
    state: Rc<RefCell<State>>,
}

impl TestDevice {
    pub fn new() -> (TestDevice, DeviceProbe) {
        let state = Rc::new(RefCell::new(State::default()));
        (
            TestDevice {
                state: Rc::clone(&state),
            },
            DeviceProbe { state },
        )
    }
}

/// A context over a fresh [`TestDevice`] plus its probe.
pub fn test_context() -> (GpuContext, DeviceProbe) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let (device, probe) = TestDevice::new();
    (GpuContext::new(Box::new(device)), probe)
}

impl DeviceProbe {
    /// Every event recorded so far, in call order.
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Drain the event log, so a test can scope assertions to one step.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|&e| matches(e))
            .count()
    }

    pub fn bind_count(&self) -> usize {
        self.count(|e| matches!(e, Event::BindBuffer(..)))
    }

    pub fn bind_base_count(&self) -> usize {
        self.count(|e| matches!(e, Event::BindBufferBase(..)))
    }

    pub fn upload_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Upload { .. }))
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// The device-side binding of a numbered binding point.
    pub fn bound_point(&self, target: BufferTarget, index: u32) -> u32 {
        self.state
            .borrow()
            .bound_points
            .get(&(target, index))
            .copied()
            .unwrap_or(0)
    }

    /// The device-side binding of a general target.
    pub fn bound_target(&self, target: BufferTarget) -> u32 {
        self.state
            .borrow()
            .bound_targets
            .get(&target)
            .copied()
            .unwrap_or(0)
    }

    /// Includes registered so far, in registration order.
    pub fn includes(&self) -> Vec<(String, String)> {
        self.state.borrow().includes.clone()
    }

    /// Declare an active uniform to be reported by the next link.
    pub fn seed_uniform(&self, name: &str, type_code: u32, location: i32) {
        self.state.borrow_mut().pending_uniforms.push(UniformInfo {
            name: name.to_owned(),
            type_code,
            location,
        });
    }

    /// Declare an active storage block to be reported by the next link.
    pub fn seed_storage_block(&self, name: &str, binding: u32) {
        self.state.borrow_mut().pending_blocks.push(StorageBlockInfo {
            name: name.to_owned(),
            binding,
        });
    }

    /// Make the next link fail with `log` as its diagnostic.
    pub fn fail_next_link(&self, log: &str) {
        self.state.borrow_mut().fail_next_link = Some(log.to_owned());
    }
}

impl Device for TestDevice {
    fn create_buffer(&self) -> RawBuffer {
        let mut state = self.state.borrow_mut();
        let id = state.fresh_handle();
        state.buffers.insert(id, Vec::new());
        RawBuffer(id)
    }

    fn delete_buffer(&self, buffer: RawBuffer) {
        let mut state = self.state.borrow_mut();
        state
            .buffers
            .remove(&buffer.0)
            .expect("delete of unknown buffer handle");
        // The device reverts bindings of a deleted buffer to zero.
        for bound in state.bound_targets.values_mut() {
            if *bound == buffer.0 {
                *bound = 0;
            }
        }
        for bound in state.bound_points.values_mut() {
            if *bound == buffer.0 {
                *bound = 0;
            }
        }
        state.events.push(Event::DeleteBuffer(buffer.0));
    }

    fn buffer_storage(&self, buffer: RawBuffer, size: usize) {
        let mut state = self.state.borrow_mut();
        *state
            .buffers
            .get_mut(&buffer.0)
            .expect("storage for unknown buffer handle") = vec![0; size];
    }

    fn write_buffer(&self, buffer: RawBuffer, offset: usize, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let storage = state
            .buffers
            .get_mut(&buffer.0)
            .expect("write to unknown buffer handle");
        storage[offset..offset + data.len()].copy_from_slice(data);
    }

    fn read_buffer(&self, buffer: RawBuffer, offset: usize, out: &mut [u8]) {
        let state = self.state.borrow();
        let storage = state
            .buffers
            .get(&buffer.0)
            .expect("read from unknown buffer handle");
        out.copy_from_slice(&storage[offset..offset + out.len()]);
    }

    fn clear_buffer(&self, buffer: RawBuffer, value: ClearValue) {
        let channel = match value {
            ClearValue::I32(v) => v.to_le_bytes(),
            ClearValue::U32(v) => v.to_le_bytes(),
            ClearValue::F32(v) => v.to_le_bytes(),
        };
        let mut state = self.state.borrow_mut();
        let storage = state
            .buffers
            .get_mut(&buffer.0)
            .expect("clear of unknown buffer handle");
        for chunk in storage.chunks_mut(4) {
            chunk.copy_from_slice(&channel[..chunk.len()]);
        }
    }

    fn memory_barrier(&self) {
        self.state.borrow_mut().events.push(Event::MemoryBarrier);
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: RawBuffer) {
        let mut state = self.state.borrow_mut();
        state.bound_targets.insert(target, buffer.0);
        state.events.push(Event::BindBuffer(target, buffer.0));
    }

    fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: RawBuffer) {
        let mut state = self.state.borrow_mut();
        state.bound_points.insert((target, index), buffer.0);
        state.bound_targets.insert(target, buffer.0);
        state
            .events
            .push(Event::BindBufferBase(target, index, buffer.0));
    }

    fn buffer_gpu_address(&self, buffer: RawBuffer) -> u64 {
        let mut state = self.state.borrow_mut();
        assert!(
            state.buffers.contains_key(&buffer.0),
            "address of unknown buffer handle"
        );
        state.events.push(Event::ResolveAddress(buffer.0));
        0x1_0000_0000 + u64::from(buffer.0) * 0x100
    }

    fn max_binding_points(&self, target: BufferTarget) -> u32 {
        if BufferTarget::INDEXED.contains(&target) {
            8
        } else {
            0
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> RawShader {
        let mut state = self.state.borrow_mut();
        let id = state.fresh_handle();
        state.shaders.insert(
            id,
            ShaderRecord {
                stage,
                source: String::new(),
                compiled: false,
            },
        );
        RawShader(id)
    }

    fn delete_shader(&self, shader: RawShader) {
        let mut state = self.state.borrow_mut();
        state
            .shaders
            .remove(&shader.0)
            .expect("delete of unknown shader handle");
        state.events.push(Event::DeleteShader(shader.0));
    }

    fn shader_source(&self, shader: RawShader, source: &str) {
        let mut state = self.state.borrow_mut();
        state
            .shaders
            .get_mut(&shader.0)
            .expect("source for unknown shader handle")
            .source = source.to_owned();
    }

    fn register_include(&self, path: &str, source: &str) {
        self.state
            .borrow_mut()
            .includes
            .push((path.to_owned(), source.to_owned()));
    }

    fn compile_shader(&self, shader: RawShader) -> bool {
        let mut state = self.state.borrow_mut();
        let record = state
            .shaders
            .get_mut(&shader.0)
            .expect("compile of unknown shader handle");
        // A #error directive fails compilation, as on a real device.
        record.compiled = !record.source.contains("#error");
        record.compiled
    }

    fn shader_info_log(&self, shader: RawShader) -> String {
        let state = self.state.borrow();
        let record = &state.shaders[&shader.0];
        if record.compiled {
            String::new()
        } else {
            format!("0:1(1): error: #error directive in {:?} stage", record.stage)
        }
    }

    fn create_program(&self) -> RawProgram {
        let mut state = self.state.borrow_mut();
        let id = state.fresh_handle();
        state.programs.insert(
            id,
            ProgramRecord {
                attached: Vec::new(),
                linked: false,
                uniforms: Vec::new(),
                blocks: Vec::new(),
            },
        );
        RawProgram(id)
    }

    fn delete_program(&self, program: RawProgram) {
        let mut state = self.state.borrow_mut();
        state
            .programs
            .remove(&program.0)
            .expect("delete of unknown program handle");
        state.events.push(Event::DeleteProgram(program.0));
    }

    fn attach_shader(&self, program: RawProgram, shader: RawShader) {
        let mut state = self.state.borrow_mut();
        assert!(
            state.shaders.contains_key(&shader.0),
            "attach of unknown shader handle"
        );
        state
            .programs
            .get_mut(&program.0)
            .expect("attach to unknown program handle")
            .attached
            .push(shader.0);
    }

    fn detach_shader(&self, program: RawProgram, shader: RawShader) {
        let mut state = self.state.borrow_mut();
        let record = state
            .programs
            .get_mut(&program.0)
            .expect("detach from unknown program handle");
        let position = record
            .attached
            .iter()
            .position(|&id| id == shader.0)
            .expect("detach of shader that is not attached");
        record.attached.remove(position);
    }

    fn link_program(&self, program: RawProgram) -> bool {
        let mut state = self.state.borrow_mut();
        if state.fail_next_link.is_some() {
            return false;
        }
        let uniforms = std::mem::take(&mut state.pending_uniforms);
        let blocks = std::mem::take(&mut state.pending_blocks);
        let record = state
            .programs
            .get_mut(&program.0)
            .expect("link of unknown program handle");
        record.linked = true;
        record.uniforms = uniforms;
        record.blocks = blocks;
        true
    }

    fn program_info_log(&self, program: RawProgram) -> String {
        let mut state = self.state.borrow_mut();
        assert!(state.programs.contains_key(&program.0));
        state.fail_next_link.take().unwrap_or_default()
    }

    fn use_program(&self, program: RawProgram) {
        self.state
            .borrow_mut()
            .events
            .push(Event::UseProgram(program.0));
    }

    fn active_uniforms(&self, program: RawProgram) -> Vec<UniformInfo> {
        self.state.borrow().programs[&program.0].uniforms.clone()
    }

    fn storage_blocks(&self, program: RawProgram) -> Vec<StorageBlockInfo> {
        self.state.borrow().programs[&program.0].blocks.clone()
    }

    fn uniform_f32(&self, program: RawProgram, location: i32, _: f32) {
        self.record_upload(program, location);
    }

    fn uniform_f64(&self, program: RawProgram, location: i32, _: f64) {
        self.record_upload(program, location);
    }

    fn uniform_i32(&self, program: RawProgram, location: i32, _: i32) {
        self.record_upload(program, location);
    }

    fn uniform_u32(&self, program: RawProgram, location: i32, _: u32) {
        self.record_upload(program, location);
    }

    fn uniform_u64(&self, program: RawProgram, location: i32, _: u64) {
        self.record_upload(program, location);
    }

    fn uniform_vec2(&self, program: RawProgram, location: i32, _: Vec2) {
        self.record_upload(program, location);
    }

    fn uniform_vec3(&self, program: RawProgram, location: i32, _: Vec3) {
        self.record_upload(program, location);
    }

    fn uniform_vec4(&self, program: RawProgram, location: i32, _: Vec4) {
        self.record_upload(program, location);
    }

    fn uniform_mat2(&self, program: RawProgram, location: i32, _: &Mat2) {
        self.record_upload(program, location);
    }

    fn uniform_mat3(&self, program: RawProgram, location: i32, _: &Mat3) {
        self.record_upload(program, location);
    }

    fn uniform_mat4(&self, program: RawProgram, location: i32, _: &Mat4) {
        self.record_upload(program, location);
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        self.state
            .borrow_mut()
            .events
            .push(Event::DispatchDirect(x, y, z));
    }

    fn dispatch_compute_indirect(&self, offset: usize) {
        self.state
            .borrow_mut()
            .events
            .push(Event::DispatchIndirect(offset));
    }
}

impl TestDevice {
    fn record_upload(&self, program: RawProgram, location: i32) {
        self.state.borrow_mut().events.push(Event::Upload {
            program: program.0,
            location,
        });
    }
}
