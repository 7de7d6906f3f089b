//! Arity-erased system callbacks
//!
//! Every registered system shares one `extern "C"` entry point,
//! [`dispatch`]. The engine hands it the batch plus the context pointer
//! given at registration, which is the address of the system's
//! [`Trampoline`]. The trampoline owns the typed adapter and the resolved
//! column shapes; the world keeps it pinned behind an `Arc` until teardown.

use crate::ecs::{BindError, ComponentHandle, OwnedRows, RawRows, RowBatch};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) type Adapter = Box<dyn Fn(&mut RowBatch<'_>) -> Result<(), BindError> + Send + Sync>;

/// A system callback with its column shapes resolved for one world.
pub struct Trampoline {
    columns: Vec<ComponentHandle>,
    adapter: Adapter,
    invocations: AtomicU64,
    failures: AtomicU64,
}

impl Trampoline {
    pub(crate) fn new(columns: Vec<ComponentHandle>, adapter: Adapter) -> Self {
        Self {
            columns,
            adapter,
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Resolved column shapes; column `k` is entry `k - 1`.
    pub fn columns(&self) -> &[ComponentHandle] {
        &self.columns
    }

    /// Signature expression naming every column, e.g. `"Position, Velocity"`.
    pub fn signature(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Invocations attempted so far, failed ones included.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Run the callback on one batch. Panics are caught and reported as
    /// [`BindError::SystemPanicked`].
    pub fn invoke(&self, batch: &mut RowBatch<'_>) -> Result<(), BindError> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let system = batch.system();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.adapter)(batch)))
            .unwrap_or(Err(BindError::SystemPanicked { system }));
        if outcome.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Run the callback on a batch handed over by the engine.
    ///
    /// # Safety
    /// `rows` must be null or satisfy the contract of [`RowBatch::from_raw`].
    pub unsafe fn invoke_raw(&self, rows: *mut RawRows) -> Result<(), BindError> {
        let Some(raw) = rows.as_ref() else {
            self.invocations.fetch_add(1, Ordering::Relaxed);
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(BindError::NullBatch);
        };
        let mut batch = RowBatch::from_raw(raw);
        self.invoke(&mut batch)
    }

    /// Run the callback on a batch assembled in Rust.
    pub fn invoke_owned(&self, rows: &mut OwnedRows) -> Result<(), BindError> {
        let ctx = self as *const Trampoline as *mut c_void;
        let mut raw = match rows.as_raw(ctx) {
            Ok(raw) => raw,
            Err(err) => {
                self.invocations.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        // SAFETY: `raw` points into `rows`, which is exclusively borrowed
        // for the duration of the call.
        unsafe { self.invoke_raw(&mut raw) }
    }
}

impl std::fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trampoline")
            .field("signature", &self.signature())
            .field("invocations", &self.invocations())
            .field("failures", &self.failures())
            .finish()
    }
}

/// Shared entry point registered with the engine for every system.
///
/// # Safety
/// `rows` must be null or a live batch whose `ctx` is null or the address
/// of a [`Trampoline`] pinned by the world that registered the system.
pub(crate) unsafe extern "C" fn dispatch(rows: *mut RawRows) {
    let Some(raw) = rows.as_ref() else {
        tracing::error!("system dispatched without a row batch");
        return;
    };
    let Some(trampoline) = (raw.ctx as *const Trampoline).as_ref() else {
        tracing::error!(system = %raw.system, "system dispatched without a context");
        return;
    };
    if let Err(err) = trampoline.invoke_raw(rows) {
        tracing::error!(
            system = %raw.system,
            signature = %trampoline.signature(),
            error = %err,
            "system invocation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ComponentTypeId, EntityId};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn handle(name: &str, size: usize) -> ComponentHandle {
        ComponentHandle {
            entity: EntityId::from_raw(100),
            type_id: ComponentTypeId::from_raw(1),
            name: name.to_owned(),
            size,
            align: size.min(8),
        }
    }

    fn counting(columns: Vec<ComponentHandle>, calls: Arc<AtomicUsize>) -> Trampoline {
        Trampoline::new(
            columns,
            Box::new(move |batch: &mut RowBatch<'_>| -> Result<(), BindError> {
                batch.column_mut::<u32>(1)?[0] += 1;
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
    }

    #[test]
    fn signature_joins_column_names() {
        let t = Trampoline::new(
            vec![handle("Position", 16), handle("Velocity", 16)],
            Box::new(|_: &mut RowBatch<'_>| -> Result<(), BindError> { Ok(()) }),
        );
        assert_eq!(t.arity(), 2);
        assert_eq!(t.signature(), "Position, Velocity");
    }

    #[test]
    fn dispatch_routes_through_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let t = counting(vec![handle("Counter", 4)], calls.clone());
        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1)]).with_column(&[41u32]);

        let mut raw = rows.as_raw(&t as *const Trampoline as *mut c_void).unwrap();
        unsafe { dispatch(&mut raw) };

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rows.column_values::<u32>(1), [42]);
        assert_eq!(t.invocations(), 1);
        assert_eq!(t.failures(), 0);
    }

    #[test]
    fn failed_invocation_is_counted_not_propagated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let t = counting(vec![handle("Counter", 4)], calls.clone());
        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1)]).with_column(&[1.0f64]);

        let mut raw = rows.as_raw(&t as *const Trampoline as *mut c_void).unwrap();
        unsafe { dispatch(&mut raw) };

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(t.failures(), 1);
    }

    #[test]
    fn owned_batch_with_short_column_never_reaches_the_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let t = counting(vec![handle("Counter", 4)], calls.clone());
        let ids = (1..=64).map(EntityId::from_raw).collect();
        let mut rows = OwnedRows::new(ids).with_column(&[7u32]);

        let err = t.invoke_owned(&mut rows).unwrap_err();
        assert!(matches!(
            err,
            BindError::ColumnLength {
                column: 1,
                rows: 64,
                len: 1
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(rows.column_values::<u32>(1), [7]);
        assert_eq!(t.invocations(), 1);
        assert_eq!(t.failures(), 1);
    }

    #[test]
    fn panics_do_not_escape() {
        let t = Trampoline::new(
            vec![handle("Counter", 4)],
            Box::new(|_: &mut RowBatch<'_>| -> Result<(), BindError> { panic!("boom") }),
        );
        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1)])
            .with_system(EntityId::from_raw(9))
            .with_column(&[0u32]);

        let err = t.invoke_owned(&mut rows).unwrap_err();
        assert!(matches!(
            err,
            BindError::SystemPanicked { system } if system == EntityId::from_raw(9)
        ));
        assert_eq!(t.failures(), 1);
    }

    #[test]
    fn null_batch_and_context_are_ignored() {
        unsafe { dispatch(std::ptr::null_mut()) };
        let mut rows = OwnedRows::new(Vec::new());
        let mut raw = rows.as_raw(std::ptr::null_mut()).unwrap();
        unsafe { dispatch(&mut raw) };
    }
}
