//! Tether Loopback - an in-process engine behind the native boundary
//!
//! Implements [`NativeEcs`](tether_core::ecs::NativeEcs) with plain Rust
//! data structures so the binding can be exercised end to end without a
//! native library:
//! - Tables keyed by sorted component sets, one column per sized component
//! - Names and signature expressions kept as the raw pointers the binding
//!   handed over
//! - Tick phases run in order; batches of one system optionally spread over
//!   rayon workers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_core::ecs::World;
//! use tether_loopback::LoopbackEngine;
//!
//! let world = World::new(Arc::new(LoopbackEngine::new()))?;
//! ```

mod engine;
mod table;
mod type_set;
mod world;

pub use engine::LoopbackEngine;
pub use world::{LoopbackStats, LoopbackWorld};
