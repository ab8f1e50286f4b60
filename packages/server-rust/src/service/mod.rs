//! Method-dispatch registry.
//!
//! 1. **Discovery** (`discovery`): receivers declare their method set; methods
//!    that fit the RPC calling convention become `MethodDescriptor`s
//! 2. **Registry** (`registry`): named services plus one default service
//! 3. **Resolution** (`registry`): `"Service.Method"` or bare `"Method"` to a
//!    service and descriptor, for the transport to invoke

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod registry;

// Re-export key types for convenient access.
pub use config::RegistryConfig;
pub use descriptor::{Callable, MethodDescriptor, PayloadShape};
pub use discovery::{validate_signature, MethodCandidate, MethodSet, Receiver, SkippedMethod};
pub use error::{InvocationError, RegistryError, SkipReason};
pub use registry::{RegistrationReport, Service, ServiceRegistry};
