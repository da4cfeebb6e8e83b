#![warn(missing_docs)]
//! # reqwire-core
//!
//! Core traits and types for the reqwire request pipeline.
//!
//! This crate provides the protocol-agnostic building blocks that the
//! extension modules in `reqwire` are written against:
//!
//! - **Describe** a logical call ([`Request`], [`Method`])
//! - **Share** per-call state between layers ([`Context`])
//! - **Wrap** the call in onion-style layers ([`Middleware`], [`Next`])
//! - **Send** the call to the transport ([`BaseRequestor`])
//! - **Key** and **expire** stored results ([`CacheKey`], [`ExpirableValue`])
//!
//! ## Control flow
//!
//! A middleware receives the request, the shared context and a [`Next`]
//! continuation. Code before `next.run(..)` executes on the way in, code
//! after the returned future resolves executes on the way out. A middleware
//! that never runs `next` short-circuits the chain and the base requestor is
//! never invoked.

pub mod base;
pub mod context;
pub mod error;
pub mod key;
pub mod middleware;
pub mod request;
pub mod response;
pub mod value;

pub use base::{BaseFn, BaseRequestor, base_fn};
pub use context::Context;
pub use error::{BoxError, RequestError, RequestResult};
pub use key::CacheKey;
pub use middleware::{Middleware, MiddlewareFn, Next, middleware_fn};
pub use request::{Method, Request};
pub use response::Response;
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use value::ExpirableValue;
