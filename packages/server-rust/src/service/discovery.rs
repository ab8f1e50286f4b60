//! Method discovery: receivers declare their method set, discovery keeps the
//! methods whose signature fits the RPC calling convention.
//!
//! A conforming method takes, after the receiver:
//! 1. a reference to the request context (only when the service passes one),
//! 2. a reference to an exported or builtin argument type,
//! 3. a mutable reference to an exported or builtin reply type,
//!
//! and returns exactly one value, the failure indicator. Anything else is
//! skipped with a `SkipReason`; registration only fails if nothing is left.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use rpcmap_core::{MethodSignature, Payload, RequestContext, TypeShape, Visibility};
use serde::Serialize;
use tracing::debug;

use super::descriptor::{Callable, MethodDescriptor, PayloadShape};
use super::error::{InvocationError, SkipReason};

// ---------------------------------------------------------------------------
// Receiver trait
// ---------------------------------------------------------------------------

/// An application object whose methods can be registered as an RPC service.
pub trait Receiver: Send + Sync + 'static {
    /// Declares every method of the receiver, RPC-callable or not.
    fn methods(receiver: &Arc<Self>) -> MethodSet<Self>
    where
        Self: Sized;

    /// Concrete type name used to derive a service name when none is given.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// MethodCandidate / MethodSet
// ---------------------------------------------------------------------------

/// Dispatch binding of a declared method.
#[derive(Clone)]
pub(crate) struct Binding {
    argument: PayloadShape,
    reply: PayloadShape,
    takes_context: bool,
    callable: Callable,
}

/// One declared method: its signature and, for typed handlers, the binding
/// used to call it.
#[derive(Clone)]
pub struct MethodCandidate {
    signature: MethodSignature,
    binding: Option<Binding>,
}

impl MethodCandidate {
    #[must_use]
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Returns `true` if the candidate carries a handler.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

/// Builder for the method set of a receiver.
///
/// Typed handlers are plain functions or methods of the receiver; their
/// signature is derived from the Rust types, so a handler written with the
/// right parameters cannot be mis-declared.
pub struct MethodSet<R> {
    receiver: Arc<R>,
    candidates: Vec<MethodCandidate>,
}

impl<R: Send + Sync + 'static> MethodSet<R> {
    #[must_use]
    pub fn new(receiver: &Arc<R>) -> Self {
        Self {
            receiver: Arc::clone(receiver),
            candidates: Vec::new(),
        }
    }

    /// Adds a public handler `fn(&R, &A, &mut P) -> anyhow::Result<()>`.
    #[must_use]
    pub fn method<A, P, F>(self, name: &str, handler: F) -> Self
    where
        A: Payload,
        P: Payload,
        F: Fn(&R, &A, &mut P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let signature = plain_signature::<A, P>(name);
        self.bind_plain(signature, handler)
    }

    /// Adds a public handler that receives the request context first.
    #[must_use]
    pub fn contextual<A, P, F>(self, name: &str, handler: F) -> Self
    where
        A: Payload,
        P: Payload,
        F: Fn(&R, &RequestContext, &A, &mut P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            name: name.to_string(),
            visibility: Visibility::Public,
            params: vec![
                TypeShape::RequestContext.by_ref(),
                A::shape().by_ref(),
                P::shape().by_mut(),
            ],
            returns: vec![TypeShape::Failure],
        };
        let receiver = Arc::clone(&self.receiver);
        let method = name.to_string();
        let callable: Callable = Arc::new(
            move |ctx: Option<&RequestContext>,
                  args: &mut dyn Any,
                  reply: &mut dyn Any|
                  -> Result<(), InvocationError> {
                let ctx = ctx.ok_or_else(|| InvocationError::MissingContext {
                    method: method.clone(),
                })?;
                let (args, reply) = downcast_payloads::<A, P>(&method, args, reply)?;
                handler(&*receiver, ctx, args, reply).map_err(InvocationError::Handler)
            },
        );
        self.push(signature, Some(binding::<A, P>(true, callable)))
    }

    /// Adds a handler that is not exported; discovery always skips it.
    #[must_use]
    pub fn internal<A, P, F>(self, name: &str, handler: F) -> Self
    where
        A: Payload,
        P: Payload,
        F: Fn(&R, &A, &mut P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let signature = plain_signature::<A, P>(name).private();
        self.bind_plain(signature, handler)
    }

    /// Declares a method by signature only, e.g. a helper that is not meant
    /// to be called remotely.
    #[must_use]
    pub fn declared(self, signature: MethodSignature) -> Self {
        self.push(signature, None)
    }

    #[must_use]
    pub fn into_candidates(self) -> Vec<MethodCandidate> {
        self.candidates
    }

    fn bind_plain<A, P, F>(self, signature: MethodSignature, handler: F) -> Self
    where
        A: Payload,
        P: Payload,
        F: Fn(&R, &A, &mut P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let method = signature.name.clone();
        let callable: Callable = Arc::new(
            move |_ctx: Option<&RequestContext>,
                  args: &mut dyn Any,
                  reply: &mut dyn Any|
                  -> Result<(), InvocationError> {
                let (args, reply) = downcast_payloads::<A, P>(&method, args, reply)?;
                handler(&*receiver, args, reply).map_err(InvocationError::Handler)
            },
        );
        self.push(signature, Some(binding::<A, P>(false, callable)))
    }

    fn push(mut self, signature: MethodSignature, binding: Option<Binding>) -> Self {
        self.candidates.push(MethodCandidate { signature, binding });
        self
    }
}

fn plain_signature<A: Payload, P: Payload>(name: &str) -> MethodSignature {
    MethodSignature::new(name)
        .param(A::shape().by_ref())
        .param(P::shape().by_mut())
        .returns(TypeShape::Failure)
}

fn binding<A: Payload, P: Payload>(takes_context: bool, callable: Callable) -> Binding {
    Binding {
        argument: PayloadShape::of::<A>(),
        reply: PayloadShape::of::<P>(),
        takes_context,
        callable,
    }
}

fn downcast_payloads<'a, A: Payload, P: Payload>(
    method: &str,
    args: &'a mut dyn Any,
    reply: &'a mut dyn Any,
) -> Result<(&'a A, &'a mut P), InvocationError> {
    let args = args
        .downcast_ref::<A>()
        .ok_or_else(|| InvocationError::ArgumentType {
            method: method.to_string(),
            expected: std::any::type_name::<A>().to_string(),
        })?;
    let reply = reply
        .downcast_mut::<P>()
        .ok_or_else(|| InvocationError::ReplyType {
            method: method.to_string(),
            expected: std::any::type_name::<P>().to_string(),
        })?;
    Ok((args, reply))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks a signature against the calling convention.
///
/// # Errors
///
/// Returns the first rule the signature violates.
pub fn validate_signature(
    signature: &MethodSignature,
    accepts_request_context: bool,
) -> Result<(), SkipReason> {
    if signature.visibility != Visibility::Public {
        return Err(SkipReason::NotExported);
    }

    let offset = usize::from(accepts_request_context);
    let expected = 2 + offset;
    if signature.params.len() != expected {
        return Err(SkipReason::ParamCount {
            expected,
            found: signature.params.len(),
        });
    }

    if accepts_request_context {
        let ctx = &signature.params[0];
        if !(ctx.is_ref() && ctx.referent() == &TypeShape::RequestContext) {
            return Err(SkipReason::RequestContextParam);
        }
    }

    let args = &signature.params[offset];
    if !args.is_ref() {
        return Err(SkipReason::ArgumentNotReference);
    }
    if !args.is_exported_or_builtin() {
        return Err(SkipReason::ArgumentNotExported);
    }

    let reply = &signature.params[1 + offset];
    if !reply.is_mut_ref() {
        return Err(SkipReason::ReplyNotMutable);
    }
    if !reply.is_exported_or_builtin() {
        return Err(SkipReason::ReplyNotExported);
    }

    if signature.returns.len() != 1 {
        return Err(SkipReason::ReturnCount {
            found: signature.returns.len(),
        });
    }
    if signature.returns[0] != TypeShape::Failure {
        return Err(SkipReason::ReturnNotFailure);
    }

    Ok(())
}

/// A declared method that discovery left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMethod {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of running discovery over one receiver.
pub(crate) struct Discovered {
    pub(crate) methods: HashMap<String, Arc<MethodDescriptor>>,
    pub(crate) skipped: Vec<SkippedMethod>,
}

/// Builds descriptors for every conforming candidate.
pub(crate) fn discover(
    service: &str,
    candidates: Vec<MethodCandidate>,
    accepts_request_context: bool,
) -> Discovered {
    let mut methods = HashMap::new();
    let mut skipped = Vec::new();

    for candidate in candidates {
        let MethodCandidate { signature, binding } = candidate;
        debug!(service, method = %signature.name, "got method");

        let outcome = validate_signature(&signature, accepts_request_context)
            .and_then(|()| binding.ok_or(SkipReason::Unbound))
            .and_then(|binding| {
                if methods.contains_key(&signature.name) {
                    Err(SkipReason::DuplicateName)
                } else {
                    Ok(binding)
                }
            });

        match outcome {
            Ok(binding) => {
                let descriptor = MethodDescriptor::new(
                    signature.name.clone(),
                    binding.argument,
                    binding.reply,
                    binding.takes_context,
                    binding.callable,
                );
                methods.insert(signature.name, Arc::new(descriptor));
            }
            Err(reason) => {
                debug!(service, method = %signature.name, %reason, "skipping method");
                skipped.push(SkippedMethod {
                    name: signature.name,
                    reason,
                });
            }
        }
    }

    Discovered { methods, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Args {
        a: i64,
        b: i64,
    }
    impl Payload for Args {}

    #[derive(Debug, Default)]
    struct Sum {
        value: i64,
    }
    impl Payload for Sum {}

    #[allow(non_camel_case_types)]
    #[derive(Debug, Default)]
    struct secret;
    impl Payload for secret {}

    struct Calc;

    impl Calc {
        #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
        fn add(&self, args: &Args, reply: &mut Sum) -> anyhow::Result<()> {
            reply.value = args.a + args.b;
            Ok(())
        }
    }

    fn conforming(pass_req: bool) -> MethodSignature {
        let mut sig = MethodSignature::new("Add");
        if pass_req {
            sig = sig.param(TypeShape::RequestContext.by_ref());
        }
        sig.param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::Failure)
    }

    #[test]
    fn conforming_signatures_pass() {
        assert_eq!(validate_signature(&conforming(false), false), Ok(()));
        assert_eq!(validate_signature(&conforming(true), true), Ok(()));
    }

    #[test]
    fn private_method_is_skipped() {
        let sig = conforming(false).private();
        assert_eq!(validate_signature(&sig, false), Err(SkipReason::NotExported));
    }

    #[test]
    fn param_count_depends_on_request_context() {
        assert_eq!(
            validate_signature(&conforming(false), true),
            Err(SkipReason::ParamCount {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            validate_signature(&conforming(true), false),
            Err(SkipReason::ParamCount {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn first_param_must_be_request_context_reference() {
        let sig = MethodSignature::new("Add")
            .param(TypeShape::RequestContext)
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&sig, true),
            Err(SkipReason::RequestContextParam)
        );

        let sig = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&sig, true),
            Err(SkipReason::RequestContextParam)
        );
    }

    #[test]
    fn argument_rules() {
        let by_value = MethodSignature::new("Add")
            .param(TypeShape::named("Args"))
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&by_value, false),
            Err(SkipReason::ArgumentNotReference)
        );

        let hidden = MethodSignature::new("Add")
            .param(TypeShape::named("args").by_ref())
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&hidden, false),
            Err(SkipReason::ArgumentNotExported)
        );

        let builtin = MethodSignature::new("Add")
            .param(TypeShape::builtin("String").by_ref())
            .param(TypeShape::builtin("i64").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(validate_signature(&builtin, false), Ok(()));
    }

    #[test]
    fn reply_rules() {
        let shared = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_ref())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&shared, false),
            Err(SkipReason::ReplyNotMutable)
        );

        let hidden = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("sum").by_mut())
            .returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&hidden, false),
            Err(SkipReason::ReplyNotExported)
        );
    }

    #[test]
    fn return_rules() {
        let none = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_mut());
        assert_eq!(
            validate_signature(&none, false),
            Err(SkipReason::ReturnCount { found: 0 })
        );

        let two = conforming(false).returns(TypeShape::Failure);
        assert_eq!(
            validate_signature(&two, false),
            Err(SkipReason::ReturnCount { found: 2 })
        );

        let wrong = MethodSignature::new("Add")
            .param(TypeShape::named("Args").by_ref())
            .param(TypeShape::named("Sum").by_mut())
            .returns(TypeShape::builtin("i64"));
        assert_eq!(
            validate_signature(&wrong, false),
            Err(SkipReason::ReturnNotFailure)
        );
    }

    #[test]
    fn discover_keeps_conforming_and_reports_the_rest() {
        let calc = Arc::new(Calc);
        let candidates = MethodSet::new(&calc)
            .method("Add", Calc::add)
            .internal("add_unchecked", Calc::add)
            .method("Leak", |_: &Calc, _: &secret, _: &mut Sum| Ok(()))
            .declared(MethodSignature::new("Len").returns(TypeShape::builtin("usize")))
            .declared(conforming(false))
            .into_candidates();

        let found = discover("Calc", candidates, false);
        assert_eq!(found.methods.len(), 1);
        assert!(found.methods.contains_key("Add"));

        let reasons: Vec<_> = found
            .skipped
            .iter()
            .map(|s| (s.name.as_str(), s.reason.clone()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("add_unchecked", SkipReason::NotExported),
                ("Leak", SkipReason::ArgumentNotExported),
                (
                    "Len",
                    SkipReason::ParamCount {
                        expected: 2,
                        found: 0
                    }
                ),
                ("Add", SkipReason::Unbound),
            ]
        );
    }

    #[test]
    fn discover_skips_duplicate_names() {
        let calc = Arc::new(Calc);
        let candidates = MethodSet::new(&calc)
            .method("Add", Calc::add)
            .method("Add", Calc::add)
            .into_candidates();

        let found = discover("Calc", candidates, false);
        assert_eq!(found.methods.len(), 1);
        assert_eq!(found.skipped.len(), 1);
        assert_eq!(found.skipped[0].reason, SkipReason::DuplicateName);
    }

    #[test]
    fn contextual_handler_requires_context_at_call_time() {
        let calc = Arc::new(Calc);
        let candidates = MethodSet::new(&calc)
            .contextual("Add", |c: &Calc, _ctx: &RequestContext, a: &Args, r: &mut Sum| {
                c.add(a, r)
            })
            .into_candidates();
        assert!(candidates[0].is_bound());

        let found = discover("Calc", candidates, true);
        let add = &found.methods["Add"];
        assert!(add.takes_context());

        let mut args = Args { a: 1, b: 2 };
        let mut reply = Sum::default();
        let err = add.invoke(None, &mut args, &mut reply).unwrap_err();
        assert!(matches!(err, InvocationError::MissingContext { .. }));
    }

    #[test]
    fn bound_handler_computes_reply() {
        let calc = Arc::new(Calc);
        let found = discover(
            "Calc",
            MethodSet::new(&calc).method("Add", Calc::add).into_candidates(),
            false,
        );
        let add = &found.methods["Add"];

        let mut args = Args { a: 40, b: 2 };
        let mut reply = Sum::default();
        add.invoke(None, &mut args, &mut reply).unwrap();
        assert_eq!(reply.value, 42);
    }

    #[test]
    fn handler_failure_is_propagated() {
        let calc = Arc::new(Calc);
        let found = discover(
            "Calc",
            MethodSet::new(&calc)
                .method("Fail", |_: &Calc, _: &Args, _: &mut Sum| {
                    Err(anyhow::anyhow!("boom"))
                })
                .into_candidates(),
            false,
        );
        let mut args = Args::default();
        let mut reply = Sum::default();
        let err = found.methods["Fail"]
            .invoke(None, &mut args, &mut reply)
            .unwrap_err();
        assert!(matches!(err, InvocationError::Handler(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
