//! Tether Core
//!
//! Typed Rust bindings over a native Entity Component System engine:
//! - Component identity cache (Rust type -> world-scoped type id)
//! - Interned C strings the engine may keep pointers to
//! - System trampolines that turn typed callbacks into one `extern "C"` entry
//! - A safe `World` owning the native handle

pub mod ecs;

pub use bytemuck;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
