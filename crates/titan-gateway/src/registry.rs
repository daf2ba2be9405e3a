//! `HandlerRegistry` — a compile-time `name -> handler` map with a typed
//! argument-decoder closure per handler, replacing the source's runtime
//! reflection (spec §9's redesign direction).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GatewayFailure;

/// The reserved handler name the Gateway dispatches encrypted invocations
/// against. Registering a handler under this name is a programming error.
pub const RESERVED_HANDLER_NAME: &str = "__encrypted__";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered handler: decode the invocation payload, call into business
/// logic, and re-encode the result (or signal void).
pub type HandlerFn =
    Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<Option<Vec<u8>>, GatewayFailure>> + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Panics on the reserved name or a
    /// duplicate registration — both are programming errors caught at hub
    /// construction time, not runtime conditions callers need to recover
    /// from.
    pub fn register(&mut self, name: impl Into<String>, handler: HandlerFn) {
        let name = name.into();
        assert_ne!(
            name, RESERVED_HANDLER_NAME,
            "cannot register a business handler under the reserved gateway name"
        );
        let previous = self.handlers.insert(name.clone(), handler);
        assert!(previous.is_none(), "duplicate handler registration for `{name}`");
    }

    pub fn get(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

/// A single-argument handler's payload is the argument, serialized directly
/// — not wrapped in a JSON document. `Vec<u8>` and `String` take the payload
/// verbatim; anything else goes through `Json<T>` to opt into JSON decoding.
pub trait SingleArgument: Sized {
    fn decode_single(payload: &[u8]) -> Result<Self, GatewayFailure>;
}

impl SingleArgument for Vec<u8> {
    fn decode_single(payload: &[u8]) -> Result<Self, GatewayFailure> {
        Ok(payload.to_vec())
    }
}

impl SingleArgument for String {
    fn decode_single(payload: &[u8]) -> Result<Self, GatewayFailure> {
        String::from_utf8(payload.to_vec()).map_err(|_| GatewayFailure::ArgumentDecodeFailure)
    }
}

/// Wraps a single-argument handler's argument when it's a JSON-shaped value
/// rather than raw bytes or text.
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> SingleArgument for Json<T> {
    fn decode_single(payload: &[u8]) -> Result<Self, GatewayFailure> {
        serde_json::from_slice(payload)
            .map(Json)
            .map_err(|_| GatewayFailure::ArgumentDecodeFailure)
    }
}

fn decode_tuple_args(payload: &[u8], arity: usize) -> Result<Vec<serde_json::Value>, GatewayFailure> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(payload).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
    if values.len() != arity {
        return Err(GatewayFailure::ArgumentDecodeFailure);
    }
    Ok(values)
}

fn encode_result<R: Serialize>(value: &R) -> Result<Vec<u8>, GatewayFailure> {
    serde_json::to_vec(value).map_err(|_| GatewayFailure::ArgumentDecodeFailure)
}

/// Business handlers report failures as any displayable error; the gateway
/// wraps it as `HandlerFailed` rather than requiring every handler body to
/// know about gateway-level error types (spec §7: "the original handler
/// exception on business failures").
fn wrap_business_err<E: std::fmt::Display>(err: E) -> GatewayFailure {
    GatewayFailure::HandlerFailed(err.to_string())
}

/// Build a `HandlerFn` for a single-argument handler. The wrapped payload
/// is the argument, serialized directly (spec §4.2: "a single-argument
/// handler's payload is the single value serialized directly").
pub fn handler1<A, R, E, F, Fut>(f: F) -> HandlerFn
where
    A: SingleArgument + Send + 'static,
    R: Serialize + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |payload: Vec<u8>| {
        let f = f.clone();
        let arg = A::decode_single(&payload);
        let fut = async move {
            let arg = arg?;
            let result = f(arg).await.map_err(wrap_business_err)?;
            encode_result(&result).map(Some)
        };
        Box::pin(fut)
    })
}

/// Single-argument handler with no return value.
pub fn handler1_void<A, E, F, Fut>(f: F) -> HandlerFn
where
    A: SingleArgument + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |payload: Vec<u8>| {
        let f = f.clone();
        let arg = A::decode_single(&payload);
        let fut = async move {
            let arg = arg?;
            f(arg).await.map_err(wrap_business_err)?;
            Ok(None)
        };
        Box::pin(fut)
    })
}

/// Build a `HandlerFn` for a two-argument handler. The wrapped payload MUST
/// be a JSON array of exactly two elements, in declared order (spec §4.2).
pub fn handler2<A, B, R, E, F, Fut>(f: F) -> HandlerFn
where
    A: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |payload: Vec<u8>| {
        let f = f.clone();
        let values = decode_tuple_args(&payload, 2);
        let fut = async move {
            let mut values = values?;
            let b = values.pop().unwrap();
            let a = values.pop().unwrap();
            let a: A = serde_json::from_value(a).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
            let b: B = serde_json::from_value(b).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
            let result = f(a, b).await.map_err(wrap_business_err)?;
            encode_result(&result).map(Some)
        };
        Box::pin(fut)
    })
}

/// Two-argument handler with no return value.
pub fn handler2_void<A, B, E, F, Fut>(f: F) -> HandlerFn
where
    A: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |payload: Vec<u8>| {
        let f = f.clone();
        let values = decode_tuple_args(&payload, 2);
        let fut = async move {
            let mut values = values?;
            let b = values.pop().unwrap();
            let a = values.pop().unwrap();
            let a: A = serde_json::from_value(a).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
            let b: B = serde_json::from_value(b).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
            f(a, b).await.map_err(wrap_business_err)?;
            Ok(None)
        };
        Box::pin(fut)
    })
}

/// Zero-argument handler — the payload is ignored.
pub fn handler0<R, E, F, Fut>(f: F) -> HandlerFn
where
    R: Serialize + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |_payload: Vec<u8>| {
        let f = f.clone();
        let fut = async move {
            let result = f().await.map_err(wrap_business_err)?;
            encode_result(&result).map(Some)
        };
        Box::pin(fut)
    })
}
