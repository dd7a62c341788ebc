//! Backend-neutral protocol types for the document-chat client.
//!
//! This crate establishes the contract between the client core and the
//! backends it talks to: a streaming chat endpoint and a table store
//! holding chat history and denial letters. The core only depends on the
//! traits defined here, so backends can be swapped (or faked in tests)
//! without touching the session logic.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod id;
mod provider;
mod request;
mod response;
mod store;

pub use error::*;
pub use id::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use store::*;
