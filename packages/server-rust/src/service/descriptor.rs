//! Validated, immutable description of one callable method.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use rpcmap_core::{Payload, RequestContext, TypeShape};

use super::error::InvocationError;

/// Type-erased handler bound to its receiver instance.
///
/// Takes an optional request context, the argument instance and the reply
/// instance. `Ok(())` means the call succeeded.
pub type Callable = Arc<
    dyn Fn(Option<&RequestContext>, &mut dyn Any, &mut dyn Any) -> Result<(), InvocationError>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// PayloadShape
// ---------------------------------------------------------------------------

/// Concrete argument or reply type of a method, with a factory for fresh
/// default instances.
#[derive(Clone)]
pub struct PayloadShape {
    shape: TypeShape,
    type_id: TypeId,
    type_name: &'static str,
    factory: fn() -> Box<dyn Any + Send>,
}

fn new_boxed<T: Payload>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

impl PayloadShape {
    #[must_use]
    pub fn of<T: Payload>() -> Self {
        Self {
            shape: T::shape(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory: new_boxed::<T>,
        }
    }

    /// Discoverable shape of the payload type.
    #[must_use]
    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full Rust type name of the payload.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Creates a default-initialised instance for the codec to fill.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Any + Send> {
        (self.factory)()
    }

    /// Returns `true` if `value` is an instance of this payload type.
    #[must_use]
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.type_id
    }
}

impl fmt::Debug for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadShape")
            .field("shape", &self.shape)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MethodDescriptor
// ---------------------------------------------------------------------------

/// One method accepted by discovery. Owned by its `Service` and never
/// mutated after construction.
pub struct MethodDescriptor {
    name: String,
    argument: PayloadShape,
    reply: PayloadShape,
    takes_context: bool,
    callable: Callable,
}

impl MethodDescriptor {
    pub(crate) fn new(
        name: String,
        argument: PayloadShape,
        reply: PayloadShape,
        takes_context: bool,
        callable: Callable,
    ) -> Self {
        Self {
            name,
            argument,
            reply,
            takes_context,
            callable,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn argument(&self) -> &PayloadShape {
        &self.argument
    }

    #[must_use]
    pub fn reply(&self) -> &PayloadShape {
        &self.reply
    }

    /// Whether the handler expects a request context as its first parameter.
    #[must_use]
    pub fn takes_context(&self) -> bool {
        self.takes_context
    }

    /// The bound handler.
    #[must_use]
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Fresh default argument instance.
    #[must_use]
    pub fn new_argument(&self) -> Box<dyn Any + Send> {
        self.argument.instantiate()
    }

    /// Fresh default reply instance.
    #[must_use]
    pub fn new_reply(&self) -> Box<dyn Any + Send> {
        self.reply.instantiate()
    }

    /// Runs the bound handler.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError::MissingContext` if the handler takes a
    /// request context and `ctx` is `None`, `ArgumentType`/`ReplyType` if the
    /// instances are not of the descriptor's payload types, and `Handler` if
    /// the handler itself fails.
    pub fn invoke(
        &self,
        ctx: Option<&RequestContext>,
        args: &mut dyn Any,
        reply: &mut dyn Any,
    ) -> Result<(), InvocationError> {
        (self.callable)(ctx, args, reply)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("argument", &self.argument)
            .field("reply", &self.reply)
            .field("takes_context", &self.takes_context)
            .finish_non_exhaustive()
    }
}
