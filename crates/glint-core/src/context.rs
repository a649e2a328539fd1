//! Device context: binding-state cache and named buffer registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::device::{BufferTarget, Device, RawBuffer};

/// Cache of the device's buffer binding state.
///
/// Every bind consults the cache first, so redundant binds of an
/// already-bound buffer collapse into zero device calls. The cache is
/// pre-populated for every target and every binding-point key the device
/// supports; looking up an unpopulated key is a programmer error, not an
/// implicit default.
struct BindingCache {
    targets: HashMap<BufferTarget, u32>,
    points: HashMap<(BufferTarget, u32), u32>,
}

impl BindingCache {
    fn new(max_points: impl Fn(BufferTarget) -> u32) -> Self {
        let targets = BufferTarget::ALL.iter().map(|&t| (t, 0)).collect();
        let mut points = HashMap::new();
        for &target in &BufferTarget::INDEXED {
            for index in 0..max_points(target) {
                points.insert((target, index), 0);
            }
        }
        Self { targets, points }
    }

    /// Record a bind of `id` to `target`. Returns `true` if the device must
    /// be called, `false` on a cache hit.
    fn bind_target(&mut self, target: BufferTarget, id: u32) -> bool {
        let entry = self
            .targets
            .get_mut(&target)
            .unwrap_or_else(|| panic!("binding cache has no entry for target {target:?}"));
        if *entry == id {
            return false;
        }
        *entry = id;
        true
    }

    /// Record a bind of `id` to a numbered binding point. Returns `true` if
    /// the device must be called.
    fn bind_point(&mut self, target: BufferTarget, index: u32, id: u32) -> bool {
        let entry = self.points.get_mut(&(target, index)).unwrap_or_else(|| {
            panic!("binding cache has no entry for binding point {index} of target {target:?}")
        });
        if *entry == id {
            return false;
        }
        *entry = id;
        true
    }

    /// Drop every entry referring to `id`. The device reverts bindings of a
    /// deleted buffer to zero, and the cache must mirror that.
    fn forget(&mut self, id: u32) {
        for bound in self.targets.values_mut() {
            if *bound == id {
                *bound = 0;
            }
        }
        for bound in self.points.values_mut() {
            if *bound == id {
                *bound = 0;
            }
        }
    }
}

struct ContextInner {
    device: Box<dyn Device>,
    bindings: RefCell<BindingCache>,
    registry: RefCell<HashMap<String, RawBuffer>>,
}

/// Handle to one device context.
///
/// Owns the device together with the binding-state cache and the
/// name-to-buffer registry shared by every resource created from this
/// context. Clones are cheap and refer to the same context. All state lives
/// behind single-threaded interior mutability; callers issuing commands from
/// several threads must serialize externally.
#[derive(Clone)]
pub struct GpuContext {
    inner: Rc<ContextInner>,
}

impl GpuContext {
    /// Wrap a device in a fresh context with an empty registry and a
    /// pre-populated binding cache.
    pub fn new(device: Box<dyn Device>) -> Self {
        let bindings = RefCell::new(BindingCache::new(|t| device.max_binding_points(t)));
        Self {
            inner: Rc::new(ContextInner {
                device,
                bindings,
                registry: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The underlying device.
    pub fn device(&self) -> &dyn Device {
        &*self.inner.device
    }

    /// Bind `buffer` to `target`, eliding the device call when the cache
    /// shows it already bound.
    pub(crate) fn bind_buffer(&self, target: BufferTarget, buffer: RawBuffer) {
        if self.inner.bindings.borrow_mut().bind_target(target, buffer.0) {
            self.inner.device.bind_buffer(target, buffer);
        } else {
            trace!(?target, id = buffer.0, "bind elided by cache");
        }
    }

    /// Bind `buffer` to binding point `index` of `target`, eliding the
    /// device call on a cache hit. An indexed bind also rebinds the general
    /// target on the device, so the target entry is updated alongside.
    pub(crate) fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: RawBuffer) {
        let mut bindings = self.inner.bindings.borrow_mut();
        if bindings.bind_point(target, index, buffer.0) {
            bindings.bind_target(target, buffer.0);
            self.inner.device.bind_buffer_base(target, index, buffer);
        } else {
            trace!(?target, index, id = buffer.0, "indexed bind elided by cache");
        }
    }

    /// Purge cache entries for a buffer that is about to be deleted.
    pub(crate) fn forget_buffer(&self, buffer: RawBuffer) {
        self.inner.bindings.borrow_mut().forget(buffer.0);
    }

    /// Register `buffer` under `name` so shader-declared storage blocks can
    /// be auto-bound by matching name. Last write wins on collision.
    pub(crate) fn register_buffer(&self, name: &str, buffer: RawBuffer) {
        if let Some(previous) = self
            .inner
            .registry
            .borrow_mut()
            .insert(name.to_owned(), buffer)
        {
            if previous != buffer {
                warn!(name, "buffer name re-registered, previous entry replaced");
            }
        }
    }

    /// Remove the registry entry for `name`, but only if it still refers to
    /// `buffer` — a later registration under the same name must survive.
    pub(crate) fn deregister_buffer(&self, name: &str, buffer: RawBuffer) {
        let mut registry = self.inner.registry.borrow_mut();
        if registry.get(name) == Some(&buffer) {
            registry.remove(name);
        }
    }

    /// Look up the buffer registered under `name`.
    pub(crate) fn lookup_buffer(&self, name: &str) -> Option<RawBuffer> {
        self.inner.registry.borrow().get(name).copied()
    }
}
