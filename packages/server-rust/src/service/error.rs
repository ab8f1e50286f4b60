//! Error and diagnostic types for registration, resolution and invocation.

use std::fmt;

use serde::Serialize;

/// Errors returned by `ServiceRegistry::register` and `ServiceRegistry::resolve`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Empty service name, or a derived name that is not exported.
    #[error("rpc: invalid service name {name:?} for type {receiver_type:?}")]
    InvalidServiceName { name: String, receiver_type: String },
    #[error("rpc: {service:?} has no exported methods of suitable type")]
    NoEligibleMethods { service: String },
    #[error("rpc: service already defined: {service:?}")]
    DuplicateService { service: String },
    #[error("rpc: service/method request ill-formed: {method:?}")]
    MalformedMethodName { method: String },
    #[error("rpc: can't find service {method:?}")]
    ServiceNotFound { method: String },
    #[error("rpc: can't find method {method:?}")]
    MethodNotFound { method: String },
}

/// Errors returned when invoking a resolved method.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("method {method:?} requires a request context")]
    MissingContext { method: String },
    #[error("method {method:?} expects argument of type {expected}")]
    ArgumentType { method: String, expected: String },
    #[error("method {method:?} expects reply of type {expected}")]
    ReplyType { method: String, expected: String },
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Why method discovery left a candidate out of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotExported,
    ParamCount { expected: usize, found: usize },
    RequestContextParam,
    ArgumentNotReference,
    ArgumentNotExported,
    ReplyNotMutable,
    ReplyNotExported,
    ReturnCount { found: usize },
    ReturnNotFailure,
    Unbound,
    DuplicateName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotExported => f.write_str("method is not exported"),
            Self::ParamCount { expected, found } => {
                write!(f, "method needs {expected} parameters, has {found}")
            }
            Self::RequestContextParam => {
                f.write_str("first parameter must be a reference to the request context")
            }
            Self::ArgumentNotReference => f.write_str("argument must be a reference"),
            Self::ArgumentNotExported => f.write_str("argument type must be exported or builtin"),
            Self::ReplyNotMutable => f.write_str("reply must be a mutable reference"),
            Self::ReplyNotExported => f.write_str("reply type must be exported or builtin"),
            Self::ReturnCount { found } => write!(f, "method needs one return value, has {found}"),
            Self::ReturnNotFailure => f.write_str("return type must be the failure indicator"),
            Self::Unbound => f.write_str("method has no dispatch binding"),
            Self::DuplicateName => f.write_str("method name already registered"),
        }
    }
}
