//! `rpcmap` server: discovers, validates, stores and resolves the methods an
//! RPC transport dispatches to.

pub mod logging;
pub mod service;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use service::{
    InvocationError, MethodDescriptor, MethodSet, Receiver, RegistrationReport, RegistryConfig,
    RegistryError, Service, ServiceRegistry, SkipReason,
};
