//! `rpcmap` core: request context, handler type shapes and the payload contract
//! shared by handlers and the dispatch registry.

pub mod context;
pub mod payload;
pub mod shape;

pub use context::RequestContext;
pub use payload::Payload;
pub use shape::{is_exported, short_type_name, MethodSignature, TypeShape, Visibility};
