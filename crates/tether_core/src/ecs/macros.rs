//! Declarative shorthands mirroring the engine's registration macros
//!
//! Each macro expands to the matching [`World`](crate::ecs::World) call and
//! uses the given identifier as the registered name.
//!
//! ```ignore
//! let position = ecs_component!(world, Position)?;
//! let tick = ecs_system!(world, integrate, SystemKind::OnUpdate)?;
//! let player = ecs_entity!(world, Player, "Position, Velocity")?;
//! ```

/// `ECS_COMPONENT`: type id of a Rust component.
#[macro_export]
macro_rules! ecs_component {
    ($world:expr, $component:ty) => {
        $world.component::<$component>()
    };
}

/// `ECS_SYSTEM`: register a typed system under the function's own name.
#[macro_export]
macro_rules! ecs_system {
    ($world:expr, $system:ident, $kind:expr) => {
        $world.system(stringify!($system), $kind, $system)
    };
}

/// `ECS_ENTITY`: named entity with the components listed in the expression.
#[macro_export]
macro_rules! ecs_entity {
    ($world:expr, $name:ident, $expr:expr) => {
        $world.entity(stringify!($name), $expr)
    };
}

/// `ECS_TAG`: zero-sized component.
#[macro_export]
macro_rules! ecs_tag {
    ($world:expr, $name:ident) => {
        $world.tag(stringify!($name))
    };
}

/// `ECS_TYPE`: named set of components.
#[macro_export]
macro_rules! ecs_type {
    ($world:expr, $name:ident, $expr:expr) => {
        $world.type_set(stringify!($name), $expr)
    };
}

/// `ECS_PREFAB`: named prefab.
#[macro_export]
macro_rules! ecs_prefab {
    ($world:expr, $name:ident, $expr:expr) => {
        $world.prefab(stringify!($name), $expr)
    };
}
