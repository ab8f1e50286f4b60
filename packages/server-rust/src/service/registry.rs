use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rpcmap_core::{is_exported, short_type_name};
use serde::Serialize;
use tracing::{info, trace, warn};

use super::config::RegistryConfig;
use super::descriptor::MethodDescriptor;
use super::discovery::{discover, Discovered, Receiver, SkippedMethod};
use super::error::RegistryError;

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// A named group of methods bound to one receiver instance.
///
/// Immutable once registered; the registry hands out `Arc<Service>` so a
/// caller keeps a consistent view even if the registry changes afterwards.
pub struct Service {
    name: String,
    receiver: Arc<dyn Any + Send + Sync>,
    receiver_type: &'static str,
    accepts_request_context: bool,
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl Service {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the service's methods expect a request context first.
    #[must_use]
    pub fn accepts_request_context(&self) -> bool {
        self.accepts_request_context
    }

    /// Full Rust type name of the receiver.
    #[must_use]
    pub fn receiver_type(&self) -> &'static str {
        self.receiver_type
    }

    /// The receiver instance, shared with whoever registered it.
    #[must_use]
    pub fn receiver(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.receiver
    }

    /// The receiver as its concrete type, if it is a `T`.
    #[must_use]
    pub fn receiver_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.receiver).downcast::<T>().ok()
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name)
    }

    /// Sorted names of all methods of the service.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("receiver_type", &self.receiver_type)
            .field("accepts_request_context", &self.accepts_request_context)
            .field("methods", &self.method_names())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RegistrationReport
// ---------------------------------------------------------------------------

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    /// Resolved service name (explicit or derived from the receiver type).
    pub service: String,
    /// Whether the service was installed as the default service.
    pub is_default: bool,
    /// Sorted names of the registered methods.
    pub registered: Vec<String>,
    /// Declared methods that did not fit the calling convention.
    pub skipped: Vec<SkippedMethod>,
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ServiceMap {
    services: HashMap<String, Arc<Service>>,
    default_service: Option<Arc<Service>>,
}

/// Maps dispatch names to callable methods.
///
/// Provides two lookup forms:
/// - **Dotted** (`"Service.Method"`): a method of a named service
/// - **Bare** (`"Method"`): a method of the default service
///
/// Registration validates a receiver's methods before taking the lock; the
/// lock only guards the service map and is never held across a handler call.
pub struct ServiceRegistry {
    config: RegistryConfig,
    map: Mutex<ServiceMap>,
}

impl ServiceRegistry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            map: Mutex::new(ServiceMap::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register the methods of `receiver` as a service.
    ///
    /// An empty `name` derives the service name from the receiver's type.
    /// With `is_default` the service replaces any previous default service
    /// and is reachable through bare method names; it is not added to the
    /// named services.
    ///
    /// # Errors
    ///
    /// - `InvalidServiceName` if no usable name can be derived
    /// - `NoEligibleMethods` if none of the receiver's methods conform
    /// - `DuplicateService` if a named service with this name exists
    pub fn register<R: Receiver>(
        &self,
        receiver: Arc<R>,
        name: &str,
        accepts_request_context: bool,
        is_default: bool,
    ) -> Result<RegistrationReport, RegistryError> {
        let receiver_type = receiver.type_name();
        let name = self.service_name(name, receiver_type)?;

        let candidates = R::methods(&receiver).into_candidates();
        let Discovered { methods, skipped } =
            discover(&name, candidates, accepts_request_context);
        if methods.is_empty() {
            return Err(RegistryError::NoEligibleMethods { service: name });
        }

        let mut registered: Vec<String> = methods.keys().cloned().collect();
        registered.sort_unstable();

        let service = Arc::new(Service {
            name: name.clone(),
            receiver,
            receiver_type,
            accepts_request_context,
            methods,
        });

        {
            let mut map = self.map.lock();
            if is_default {
                if let Some(previous) = map.default_service.replace(service) {
                    warn!(previous = %previous.name, service = %name, "replacing default service");
                }
            } else {
                match map.services.entry(name.clone()) {
                    Entry::Occupied(_) => {
                        return Err(RegistryError::DuplicateService { service: name });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(service);
                    }
                }
            }
        }

        info!(
            service = %name,
            is_default,
            methods = registered.len(),
            skipped = skipped.len(),
            "registered service"
        );

        Ok(RegistrationReport {
            service: name,
            is_default,
            registered,
            skipped,
        })
    }

    /// Register a named service.
    ///
    /// # Errors
    ///
    /// See [`ServiceRegistry::register`].
    pub fn register_service<R: Receiver>(
        &self,
        receiver: Arc<R>,
        name: &str,
        accepts_request_context: bool,
    ) -> Result<RegistrationReport, RegistryError> {
        self.register(receiver, name, accepts_request_context, false)
    }

    /// Register the default service, reachable through bare method names.
    ///
    /// # Errors
    ///
    /// See [`ServiceRegistry::register`].
    pub fn register_default<R: Receiver>(
        &self,
        receiver: Arc<R>,
        accepts_request_context: bool,
    ) -> Result<RegistrationReport, RegistryError> {
        self.register(receiver, "", accepts_request_context, true)
    }

    /// Resolve a dispatch name to its service and method.
    ///
    /// `"Service.Method"` selects a named service, a bare `"Method"` selects
    /// the default service.
    ///
    /// # Errors
    ///
    /// - `MalformedMethodName` if the name has more than one separator
    /// - `ServiceNotFound` if the selected service is not registered
    /// - `MethodNotFound` if the service has no such method
    pub fn resolve(
        &self,
        method: &str,
    ) -> Result<(Arc<Service>, Arc<MethodDescriptor>), RegistryError> {
        let mut parts = method.split(self.config.separator);
        let (service_name, method_name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(bare), None, None) => (None, bare),
            (Some(service), Some(name), None) => (Some(service), name),
            _ => {
                return Err(RegistryError::MalformedMethodName {
                    method: method.to_string(),
                })
            }
        };

        trace!(method, "resolving method");

        let service = {
            let map = self.map.lock();
            match service_name {
                None => map.default_service.clone(),
                Some(name) => map.services.get(name).cloned(),
            }
        };

        let Some(service) = service else {
            return Err(RegistryError::ServiceNotFound {
                method: method.to_string(),
            });
        };

        trace!(service = %service.name, method = method_name, "found service");

        let Some(descriptor) = service.methods.get(method_name).cloned() else {
            return Err(RegistryError::MethodNotFound {
                method: method.to_string(),
            });
        };

        Ok((service, descriptor))
    }

    /// Returns `true` if `method` resolves to a registered method.
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.resolve(method).is_ok()
    }

    /// Sorted names of the registered named services.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.lock().services.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// The current default service, if any.
    #[must_use]
    pub fn default_service(&self) -> Option<Arc<Service>> {
        self.map.lock().default_service.clone()
    }

    fn service_name(&self, explicit: &str, receiver_type: &str) -> Result<String, RegistryError> {
        let invalid = |name: &str| RegistryError::InvalidServiceName {
            name: name.to_string(),
            receiver_type: receiver_type.to_string(),
        };

        if explicit.is_empty() {
            let derived = short_type_name(receiver_type);
            if derived.is_empty() || !is_exported(derived) {
                return Err(invalid(derived));
            }
            return Ok(derived.to_string());
        }

        if self.config.strict_service_names && !is_exported(explicit) {
            return Err(invalid(explicit));
        }
        Ok(explicit.to_string())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
