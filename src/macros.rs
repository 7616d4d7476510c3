//! Crate-local macros and utility macros.

macro_rules! with_debug_logging {
    ($message:expr $(,$arg:expr)*; $expression:expr) => {{
        log::debug!(concat!("Begin: ", $message)$(,$arg)*);
        let _result = $expression;
        log::debug!(concat!("Done: ", $message)$(,$arg)*);
        _result
    }};
}

/// Defines a new `u32`-backed identifier type with the given name that can be
/// used directly as its own hash in a
/// [`NoHashMap`](tribus_utils::NoHashMap).
macro_rules! define_id_newtype {
    (
        $(#[$attributes:meta])*
        $([$pub:ident])? $name:ident
    ) => {
        $(#[$attributes])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ::bytemuck::Zeroable, ::bytemuck::Pod)]
        $($pub)? struct $name(u32);

        impl $name {
            /// Creates the ID with the given `u32` value.
            #[inline]
            pub const fn from_u32(value: u32) -> Self {
                Self(value)
            }

            /// Returns the `u32` value of the ID.
            #[inline]
            pub const fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl ::std::hash::Hash for $name {
            #[inline]
            fn hash<H: ::std::hash::Hasher>(&self, hasher: &mut H) {
                hasher.write_u32(self.0);
            }
        }

        impl ::tribus_utils::nohash_hasher::IsEnabled for $name {}

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
