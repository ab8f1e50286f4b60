//! Introspectable shapes of handler parameters, return values and methods.
//!
//! A `MethodSignature` is what method discovery sees of a handler: its name,
//! visibility, the ordered non-receiver parameters and the return values.

use serde::Serialize;

// ---------------------------------------------------------------------------
// TypeShape
// ---------------------------------------------------------------------------

/// Shape of a single parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape {
    /// A reference to another shape.
    Ref { mutable: bool, inner: Box<TypeShape> },
    /// A user-defined named type.
    Named { name: String },
    /// A primitive or standard-library container.
    Builtin { name: &'static str },
    /// The transport's per-request context type.
    RequestContext,
    /// The designated failure-indicator type.
    Failure,
}

impl TypeShape {
    /// Shape of a user-defined type with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    /// Shape of a built-in type.
    #[must_use]
    pub fn builtin(name: &'static str) -> Self {
        Self::Builtin { name }
    }

    /// Shared reference to `self`.
    #[must_use]
    pub fn by_ref(self) -> Self {
        Self::Ref {
            mutable: false,
            inner: Box::new(self),
        }
    }

    /// Mutable reference to `self`.
    #[must_use]
    pub fn by_mut(self) -> Self {
        Self::Ref {
            mutable: true,
            inner: Box::new(self),
        }
    }

    /// Returns `true` for any reference shape.
    #[must_use]
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref { .. })
    }

    /// Returns `true` for a mutable reference shape.
    #[must_use]
    pub fn is_mut_ref(&self) -> bool {
        matches!(self, Self::Ref { mutable: true, .. })
    }

    /// Strips every level of reference and returns the referenced shape.
    #[must_use]
    pub fn referent(&self) -> &TypeShape {
        let mut shape = self;
        while let Self::Ref { inner, .. } = shape {
            shape = inner;
        }
        shape
    }

    /// Returns `true` if the (dereferenced) shape is an exported named type
    /// or a built-in. The request-context and failure types are public.
    #[must_use]
    pub fn is_exported_or_builtin(&self) -> bool {
        match self.referent() {
            Self::Named { name } => is_exported(name),
            Self::Builtin { .. } | Self::RequestContext | Self::Failure => true,
            Self::Ref { .. } => unreachable!("referent() strips references"),
        }
    }
}

// ---------------------------------------------------------------------------
// MethodSignature
// ---------------------------------------------------------------------------

/// Visibility of a method on its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// Discoverable signature of one receiver method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSignature {
    pub name: String,
    pub visibility: Visibility,
    /// Parameters after the receiver, in declaration order.
    pub params: Vec<TypeShape>,
    pub returns: Vec<TypeShape>,
}

impl MethodSignature {
    /// Creates a public signature with no parameters and no return values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            params: Vec::new(),
            returns: Vec::new(),
        }
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    #[must_use]
    pub fn param(mut self, shape: TypeShape) -> Self {
        self.params.push(shape);
        self
    }

    #[must_use]
    pub fn returns(mut self, shape: TypeShape) -> Self {
        self.returns.push(shape);
        self
    }
}

// ---------------------------------------------------------------------------
// Name helpers
// ---------------------------------------------------------------------------

/// Returns `true` if `name` starts with an upper-case character.
#[must_use]
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Reduces a full Rust type path to its bare type name.
///
/// `alloc::vec::Vec<my_crate::Foo>` becomes `Vec`, `my_crate::calc::Calc`
/// becomes `Calc`.
#[must_use]
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn exported_requires_leading_uppercase() {
        assert!(is_exported("Calc"));
        assert!(is_exported("Ärger"));
        assert!(!is_exported("calc"));
        assert!(!is_exported("_Calc"));
        assert!(!is_exported(""));
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name("my_crate::calc::Calc"), "Calc");
        assert_eq!(short_type_name("alloc::vec::Vec<my_crate::Foo>"), "Vec");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn referent_strips_nested_refs() {
        let shape = TypeShape::named("Args").by_ref().by_mut();
        assert!(shape.is_mut_ref());
        assert_eq!(shape.referent(), &TypeShape::named("Args"));
    }

    #[test]
    fn exported_or_builtin_looks_through_refs() {
        assert!(TypeShape::named("Args").by_ref().is_exported_or_builtin());
        assert!(!TypeShape::named("args").by_mut().is_exported_or_builtin());
        assert!(TypeShape::builtin("i32").by_ref().is_exported_or_builtin());
        assert!(TypeShape::RequestContext.by_ref().is_exported_or_builtin());
    }

    #[test]
    fn signature_serializes_with_tagged_shapes() {
        let sig = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .returns(TypeShape::Failure);
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["visibility"], "public");
        assert_eq!(json["params"][0]["kind"], "ref");
        assert_eq!(json["params"][0]["inner"]["name"], "Args");
        assert_eq!(json["returns"][0]["kind"], "failure");
    }

    proptest! {
        #[test]
        fn short_type_name_never_contains_path_separator(segments in proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,8}", 1..5)) {
            let full = segments.join("::");
            let short = short_type_name(&full);
            prop_assert!(!short.contains("::"));
            prop_assert_eq!(short, segments.last().unwrap().as_str());
        }
    }
}
