//! titan-gateway — the encrypted invocation gateway and its enforcement
//! filter.
//!
//! A hub wires up a `HandlerRegistry`, wraps it and a `SessionManager` in
//! an `InvocationGateway`, and routes every inbound call through either
//! `dispatch_encrypted` (the reserved `"__encrypted__"` handler) or
//! `dispatch_plain` (everything else, subject to enforcement).

pub mod enforcement;
pub mod error;
pub mod gateway;
pub mod registry;

pub use enforcement::{enforce, CallKind, ENFORCEMENT_EXEMPT_HANDLERS};
pub use error::GatewayFailure;
pub use gateway::InvocationGateway;
pub use registry::{
    handler0, handler1, handler1_void, handler2, handler2_void, HandlerFn, HandlerRegistry, Json,
    SingleArgument, RESERVED_HANDLER_NAME,
};
