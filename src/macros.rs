//! The compile-time component registry.

/// Declares a component registry: the full, fixed set of component types and
/// their storage strategies.
///
/// ```ignore
/// taskec::components! {
///     /// Components of the sample game.
///     pub struct GameRegistry {
///         position: Position [dense],
///         sprite:   Sprite   [sorted binary],
///         target:   Target   [sorted linear],
///         health:   Health   [sparse],
///         frozen:   Frozen   [empty],
///     }
/// }
/// ```
///
/// Each declaration assigns the component type a dense index (in declaration
/// order) and generates:
/// - the registry struct, holding one storage container per payload type;
/// - [`AnyComponent`](crate::comp::AnyComponent) (and
///   [`Component`](crate::comp::Component) or [`Empty`](crate::comp::Empty))
///   for every declared type;
/// - [`Registry`](crate::world::Registry) and
///   [`HasStorage`](crate::world::HasStorage) on the registry struct.
///
/// Storage kinds: `dense`, `sorted` / `sorted binary`, `sorted linear`,
/// `sparse`, `empty`. Payload component types must implement `Default`,
/// `Send` and `Sync`.
///
/// A component type belongs to exactly one registry; the number of declared
/// types must not exceed [`MAX_COMPONENT_TYPES`](crate::config::MAX_COMPONENT_TYPES).
#[macro_export]
macro_rules! components {
    (
        $(#[$meta:meta])*
        $vis:vis struct $registry:ident {
            $( $field:ident : $comp:ty [ $($kind:tt)+ ] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $registry {
            // empty-component fields carry no storage and are never read
            $( #[allow(dead_code)] $field: $crate::components!(@cell($($kind)+) $comp) ),+
        }

        const _: () = {
            #[allow(non_camel_case_types, dead_code)]
            enum Index { $($field,)+ __count }

            $crate::_reexports::static_assertions::const_assert!(
                (Index::__count as usize) <= $crate::config::MAX_COMPONENT_TYPES
            );

            impl $crate::world::Registry for $registry {
                const COUNT: usize = Index::__count as usize;

                fn remove_all(&mut self, id: $crate::entity::Id, present: &$crate::comp::IdSet) {
                    $(
                        if present.test(<$comp as $crate::comp::AnyComponent>::INDEX) {
                            <$comp as $crate::comp::AnyComponent>::remove(self, id);
                        }
                    )+
                }
            }

            $(
                impl $crate::comp::AnyComponent for $comp {
                    type Registry = $registry;
                    const INDEX: usize = Index::$field as usize;
                    const IS_EMPTY: bool = $crate::components!(@is_empty($($kind)+));

                    $crate::components!(@remove_fn($($kind)+) $registry, $field);
                }

                $crate::components!(@extra_impls($($kind)+) $registry, $field, $comp);
            )+
        };
    };

    // storage cell field type per kind
    (@cell(dense) $comp:ty) => { $crate::storage::Cell<$crate::storage::Dense<$comp>> };
    (@cell(sorted) $comp:ty) => { $crate::storage::Cell<$crate::storage::Sorted<$comp, true>> };
    (@cell(sorted binary) $comp:ty) => {
        $crate::storage::Cell<$crate::storage::Sorted<$comp, true>>
    };
    (@cell(sorted linear) $comp:ty) => {
        $crate::storage::Cell<$crate::storage::Sorted<$comp, false>>
    };
    (@cell(sparse) $comp:ty) => { $crate::storage::Cell<$crate::storage::Sparse<$comp>> };
    (@cell(empty) $comp:ty) => { () };

    (@is_empty(empty)) => { true };
    (@is_empty($($kind:tt)+)) => { false };

    // AnyComponent::remove body per kind
    (@remove_fn(empty) $registry:ident, $field:ident) => {
        fn remove(_registry: &mut $registry, _id: $crate::entity::Id) {}
    };
    (@remove_fn($($kind:tt)+) $registry:ident, $field:ident) => {
        fn remove(registry: &mut $registry, id: $crate::entity::Id) {
            $crate::storage::Storage::remove(registry.$field.get_mut(), id);
        }
    };

    (@extra_impls(empty) $registry:ident, $field:ident, $comp:ty) => {
        impl $crate::comp::Empty for $comp {}
    };
    (@extra_impls($($kind:tt)+) $registry:ident, $field:ident, $comp:ty) => {
        impl $crate::comp::Component for $comp {
            type Storage = $crate::components!(@storage($($kind)+) $comp);
        }

        impl $crate::world::HasStorage<$comp> for $registry {
            fn cell(&self) -> &$crate::storage::Cell<$crate::components!(@storage($($kind)+) $comp)> {
                &self.$field
            }

            fn storage_mut(&mut self) -> &mut $crate::components!(@storage($($kind)+) $comp) {
                self.$field.get_mut()
            }
        }
    };

    (@storage(dense) $comp:ty) => { $crate::storage::Dense<$comp> };
    (@storage(sorted) $comp:ty) => { $crate::storage::Sorted<$comp, true> };
    (@storage(sorted binary) $comp:ty) => { $crate::storage::Sorted<$comp, true> };
    (@storage(sorted linear) $comp:ty) => { $crate::storage::Sorted<$comp, false> };
    (@storage(sparse) $comp:ty) => { $crate::storage::Sparse<$comp> };
}
