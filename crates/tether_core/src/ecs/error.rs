use crate::ecs::{EntityId, NativeStatus};
use std::ffi::NulError;
use thiserror::Error;

/// Errors raised by the binding layer.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("component '{name}' cannot be stored: {reason}")]
    InvalidComponentShape { name: String, reason: &'static str },

    #[error("component name '{name}' is already registered by another type")]
    ComponentNameTaken { name: String },

    #[error("world has been torn down")]
    UnknownWorld,

    #[error("entity {entity} is not a valid handle")]
    InvalidHandle { entity: EntityId },

    #[error("systems take between 1 and {max} columns, got {arity}")]
    UnsupportedArity { arity: usize, max: usize },

    #[error("system '{name}' is already registered")]
    DuplicateSystemName { name: String },

    #[error("native engine rejected {operation}: {status}")]
    NativeRejection {
        operation: &'static str,
        status: NativeStatus,
    },

    #[error("column {column} holds {actual}-byte elements but {expected} bytes were requested")]
    TypeMismatch {
        column: u32,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} is not aligned to {align} bytes")]
    MisalignedColumn { column: u32, align: usize },

    #[error("column {column} requested but the batch only has {available}")]
    ColumnOutOfRange { column: u32, available: u32 },

    #[error("column {column} has no data for {count} rows")]
    NullColumn { column: u32, count: usize },

    #[error("column {column} holds {len} elements for {rows} rows")]
    ColumnLength { column: u32, rows: usize, len: usize },

    #[error("engine passed a null row batch")]
    NullBatch,

    #[error("columns {first} and {second} share memory")]
    AliasedColumns { first: u32, second: u32 },

    #[error("string contains an interior NUL byte")]
    InteriorNul(#[from] NulError),

    #[error("system {system} panicked during invocation")]
    SystemPanicked { system: EntityId },
}

impl BindError {
    /// Map a native refusal, translating the statuses the binding has a
    /// dedicated variant for.
    pub(crate) fn native(operation: &'static str, status: NativeStatus) -> Self {
        match status {
            NativeStatus::InvalidWorld => BindError::UnknownWorld,
            status => BindError::NativeRejection { operation, status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_world_status_maps_to_unknown_world() {
        assert!(matches!(
            BindError::native("progress", NativeStatus::InvalidWorld),
            BindError::UnknownWorld
        ));
        assert!(matches!(
            BindError::native("add", NativeStatus::WorldLocked),
            BindError::NativeRejection {
                operation: "add",
                status: NativeStatus::WorldLocked
            }
        ));
    }

    #[test]
    fn messages_name_the_offender() {
        let err = BindError::TypeMismatch {
            column: 2,
            expected: 16,
            actual: 8,
        };
        assert_eq!(
            err.to_string(),
            "column 2 holds 8-byte elements but 16 bytes were requested"
        );
        let err = BindError::UnsupportedArity { arity: 0, max: 8 };
        assert_eq!(err.to_string(), "systems take between 1 and 8 columns, got 0");
    }
}
