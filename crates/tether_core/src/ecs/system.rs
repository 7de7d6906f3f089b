// system.rs - Typed system callbacks
//
// A system callback takes the batch metadata followed by one mutable slice
// per column, e.g. `Fn(&BatchInfo, &mut [Position], &mut [Velocity])`. The
// column types are carried by the `Columns` marker so one function can be
// generic over every arity.

use crate::ecs::{BatchInfo, BindError, Component, ComponentDescriptor, RowBatch};

/// Largest number of typed columns a system callback may take.
pub const MAX_ARITY: usize = 8;

/// A callback usable as a typed system.
///
/// Implemented for `Fn(&BatchInfo, &mut [A], ..)` with up to [`MAX_ARITY`]
/// column slices. The zero-column form exists only so that it can be
/// rejected with [`BindError::UnsupportedArity`] at registration.
pub trait SystemFn<Columns>: Send + Sync + 'static {
    /// Column shapes in declaration order; column `k` is entry `k - 1`.
    fn descriptors() -> Vec<ComponentDescriptor>;

    /// Bind the batch columns positionally and run the callback.
    fn call(&self, batch: &mut RowBatch<'_>) -> Result<(), BindError>;
}

impl<Func> SystemFn<()> for Func
where
    Func: Fn(&BatchInfo<'_>) + Send + Sync + 'static,
{
    fn descriptors() -> Vec<ComponentDescriptor> {
        Vec::new()
    }

    fn call(&self, batch: &mut RowBatch<'_>) -> Result<(), BindError> {
        (self)(&batch.info());
        Ok(())
    }
}

macro_rules! impl_system_fn {
    ($arity:literal; $($col:ident => $index:literal),+) => {
        impl<Func, $($col: Component),+> SystemFn<($($col,)+)> for Func
        where
            Func: Fn(&BatchInfo<'_>, $(&mut [$col]),+) + Send + Sync + 'static,
        {
            fn descriptors() -> Vec<ComponentDescriptor> {
                vec![$(ComponentDescriptor::of::<$col>()),+]
            }

            #[allow(non_snake_case)]
            fn call(&self, batch: &mut RowBatch<'_>) -> Result<(), BindError> {
                batch.check_disjoint($arity)?;
                // SAFETY: each index is taken once and the columns were just
                // checked not to overlap.
                $(let $col = unsafe { batch.column_detached::<$col>($index)? };)+
                (self)(&batch.info(), $($col),+);
                Ok(())
            }
        }
    };
}

impl_system_fn!(1; A => 1);
impl_system_fn!(2; A => 1, B => 2);
impl_system_fn!(3; A => 1, B => 2, C => 3);
impl_system_fn!(4; A => 1, B => 2, C => 3, D => 4);
impl_system_fn!(5; A => 1, B => 2, C => 3, D => 4, E => 5);
impl_system_fn!(6; A => 1, B => 2, C => 3, D => 4, E => 5, F => 6);
impl_system_fn!(7; A => 1, B => 2, C => 3, D => 4, E => 5, F => 6, G => 7);
impl_system_fn!(8; A => 1, B => 2, C => 3, D => 4, E => 5, F => 6, G => 7, H => 8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityId, OwnedRows};
    use bytemuck::{Pod, Zeroable};
    use parking_lot::Mutex;
    use std::ptr;
    use std::sync::Arc;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f64,
        y: f64,
    }
    crate::define_component!(Position);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Velocity {
        x: f64,
        y: f64,
    }
    crate::define_component!(Velocity);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Mass(f32);
    crate::define_component!(Mass);

    fn integrate(info: &BatchInfo<'_>, p: &mut [Position], v: &mut [Velocity]) {
        for (p, v) in p.iter_mut().zip(v.iter()) {
            p.x += v.x * info.delta_time as f64;
            p.y += v.y * info.delta_time as f64;
        }
    }

    fn descriptors_of<M, S: SystemFn<M>>(_: &S) -> Vec<ComponentDescriptor> {
        S::descriptors()
    }

    fn call<M, S: SystemFn<M>>(system: &S, rows: &mut OwnedRows) -> Result<(), BindError> {
        let raw = rows.as_raw(ptr::null_mut())?;
        let mut batch = unsafe { RowBatch::from_raw(&raw) };
        system.call(&mut batch)
    }

    #[test]
    fn descriptors_follow_declaration_order() {
        let names: Vec<String> = descriptors_of(&integrate)
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, ["Position", "Velocity"]);

        let swapped = |_: &BatchInfo<'_>, _: &mut [Velocity], _: &mut [Position], _: &mut [Mass]| {};
        let names: Vec<String> = descriptors_of(&swapped)
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, ["Velocity", "Position", "Mass"]);
    }

    #[test]
    fn zero_column_form_has_no_descriptors() {
        let bare = |_: &BatchInfo<'_>| {};
        assert!(descriptors_of(&bare).is_empty());
    }

    #[test]
    fn columns_bind_positionally() {
        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1), EntityId::from_raw(2)])
            .with_delta_time(1.0)
            .with_column(&[Position { x: 0.0, y: 0.0 }, Position { x: 5.0, y: 5.0 }])
            .with_column(&[Velocity { x: 1.0, y: 2.0 }, Velocity { x: -1.0, y: 0.0 }]);

        call(&integrate, &mut rows).unwrap();

        let positions: Vec<Position> = rows.column_values(1);
        assert_eq!(
            positions,
            [Position { x: 1.0, y: 2.0 }, Position { x: 4.0, y: 5.0 }]
        );
    }

    #[test]
    fn three_row_batch_yields_full_length_views() {
        let positions = [
            Position { x: 1.0, y: 2.0 },
            Position { x: 3.0, y: 4.0 },
            Position { x: 5.0, y: 6.0 },
        ];
        let velocities = [
            Velocity { x: 0.5, y: -0.5 },
            Velocity { x: 1.5, y: 0.0 },
            Velocity { x: -2.0, y: 8.0 },
        ];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let system = move |info: &BatchInfo<'_>, p: &mut [Position], v: &mut [Velocity]| {
            record
                .lock()
                .push((info.count, [p.len(), v.len()], p.to_vec(), v.to_vec()));
        };

        let mut rows = OwnedRows::new((1..=3).map(EntityId::from_raw).collect())
            .with_column(&positions)
            .with_column(&velocities);
        call(&system, &mut rows).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let (count, lens, p, v) = &seen[0];
        assert_eq!(*count, 3);
        assert_eq!(*lens, [3, 3]);
        assert_eq!(
            bytemuck::cast_slice::<Position, u8>(p),
            bytemuck::cast_slice::<Position, u8>(&positions)
        );
        assert_eq!(
            bytemuck::cast_slice::<Velocity, u8>(v),
            bytemuck::cast_slice::<Velocity, u8>(&velocities)
        );
    }

    #[test]
    fn wrong_size_column_skips_callback() {
        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1)])
            .with_column(&[Position { x: 0.0, y: 0.0 }])
            .with_column(&[Mass(1.0)]);

        let err = call(&integrate, &mut rows).unwrap_err();
        assert!(matches!(
            err,
            BindError::TypeMismatch {
                column: 2,
                expected: 16,
                actual: 4
            }
        ));
        assert_eq!(rows.column_values::<Position>(1), [Position { x: 0.0, y: 0.0 }]);
    }

    #[test]
    fn eight_columns_are_supported() {
        let all = |_: &BatchInfo<'_>,
                   a: &mut [Mass],
                   _: &mut [Position],
                   _: &mut [Velocity],
                   _: &mut [Mass],
                   _: &mut [Position],
                   _: &mut [Velocity],
                   _: &mut [Mass],
                   h: &mut [Position]| {
            a[0].0 = h.len() as f32;
        };
        assert_eq!(descriptors_of(&all).len(), MAX_ARITY);

        let mut rows = OwnedRows::new(vec![EntityId::from_raw(1)]);
        for k in 0..MAX_ARITY {
            rows = match k % 3 {
                0 => rows.with_column(&[Mass(0.0)]),
                1 => rows.with_column(&[Position { x: 0.0, y: 0.0 }]),
                _ => rows.with_column(&[Velocity { x: 0.0, y: 0.0 }]),
            };
        }
        call(&all, &mut rows).unwrap();
        assert_eq!(rows.column_values::<Mass>(1), [Mass(1.0)]);
    }
}
