//! Argument and reply payload contract.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use crate::shape::{short_type_name, TypeShape};

/// A type usable as a handler argument or reply.
///
/// The codec fills a default-constructed instance before the handler runs,
/// hence the `Default` bound. The default `shape()` names the type after the
/// last segment of its Rust path, so a private helper type should be given a
/// lower-case name (or override `shape()`) to be rejected by discovery.
pub trait Payload: Any + Send + Default {
    /// Discoverable shape of this type.
    #[must_use]
    fn shape() -> TypeShape {
        TypeShape::named(short_type_name(std::any::type_name::<Self>()))
    }
}

macro_rules! builtin_payload {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Payload for $ty {
                fn shape() -> TypeShape {
                    TypeShape::builtin($name)
                }
            }
        )*
    };
}

builtin_payload! {
    () => "()",
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
    String => "String",
}

impl<T: Send + 'static> Payload for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::builtin("Vec")
    }
}

impl<T: Send + 'static> Payload for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::builtin("Option")
    }
}

impl<T: Send + 'static> Payload for HashMap<String, T> {
    fn shape() -> TypeShape {
        TypeShape::builtin("HashMap")
    }
}

impl<T: Send + 'static> Payload for BTreeMap<String, T> {
    fn shape() -> TypeShape {
        TypeShape::builtin("BTreeMap")
    }
}
