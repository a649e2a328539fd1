//! Raw OpenGL backend for the resource and pipeline core.
//!
//! [`GlDevice`] implements the [`glint_core::Device`] capability directly
//! against the host's current OpenGL context, using direct-state-access
//! entry points throughout. Function pointers are loaded exactly once via
//! `gl_loader`; the extension entry points for named include strings and
//! bindless buffer addresses are resolved lazily on first use.
//!
//! # Safety
//!
//! Every device method assumes a valid OpenGL 4.5 context is current on the
//! calling thread. Using a [`GlDevice`] without a current context, or from a
//! thread other than the context's, is undefined behavior.

mod device;
mod ext;

pub use device::GlDevice;
