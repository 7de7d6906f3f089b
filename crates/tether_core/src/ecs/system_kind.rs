use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification passed to the engine when a system is registered.
///
/// Tick phases run on every `progress` call in declaration order. `Manual`
/// systems only run through an explicit `run`. The reactive kinds are
/// triggered by the engine on structural changes.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    OnLoad = 0,
    PostLoad = 1,
    PreUpdate = 2,
    OnUpdate = 3,
    OnValidate = 4,
    PostUpdate = 5,
    PreStore = 6,
    OnStore = 7,
    Manual = 8,
    OnAdd = 9,
    OnRemove = 10,
    OnSet = 11,
}

impl SystemKind {
    /// Tick phases in the order the engine runs them.
    pub const TICK_PHASES: [SystemKind; 8] = [
        SystemKind::OnLoad,
        SystemKind::PostLoad,
        SystemKind::PreUpdate,
        SystemKind::OnUpdate,
        SystemKind::OnValidate,
        SystemKind::PostUpdate,
        SystemKind::PreStore,
        SystemKind::OnStore,
    ];

    /// Whether the system runs as part of every tick.
    pub fn is_tick_driven(self) -> bool {
        Self::TICK_PHASES.contains(&self)
    }

    /// Whether the engine fires the system on add/remove/set events.
    pub fn is_reactive(self) -> bool {
        matches!(self, SystemKind::OnAdd | SystemKind::OnRemove | SystemKind::OnSet)
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
