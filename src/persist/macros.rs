//! Declarative macro for persisted type markers.

/// Declares zero-sized marker types implementing
/// [`PersistentType`](crate::persist::PersistentType).
///
/// ```
/// jsonpersist::persistent_type! {
///     pub struct Customer = "billing.Customer";
///     pub struct Invoice = "billing.Invoice", references = ["customer"];
/// }
///
/// use jsonpersist::PersistentType;
/// assert_eq!(Invoice::REFERENCES, &["customer"]);
/// ```
#[macro_export]
macro_rules! persistent_type {
    () => {};
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $tag:literal, references = [$($reference:literal),* $(,)?];
        $($rest:tt)*
    ) => {
        $crate::persistent_type!(@impl $(#[$meta])* $vis $name $tag; [$($reference),*]);
        $crate::persistent_type!($($rest)*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $tag:literal;
        $($rest:tt)*
    ) => {
        $crate::persistent_type!(@impl $(#[$meta])* $vis $name $tag; []);
        $crate::persistent_type!($($rest)*);
    };
    (@impl $(#[$meta:meta])* $vis:vis $name:ident $tag:literal; [$($reference:literal),*]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        $vis struct $name;

        impl $crate::persist::PersistentType for $name {
            const TYPE_TAG: &'static str = $tag;
            const REFERENCES: &'static [&'static str] = &[$($reference),*];
        }
    };
}
