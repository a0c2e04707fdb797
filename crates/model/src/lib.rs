//! An abstraction layer for the text-generation service.
//!
//! This crate establishes a unified protocol for the client to talk to
//! any supported generation backend, so that the rest of the system can
//! switch between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.
//!
//! Users of this crate may add some extra functionalities or wrappers,
//! depending on their own use cases. Those extra code should be placed
//! in their own crate.

#![deny(missing_docs)]

mod descriptor;
mod error;
mod provider;
mod request;
mod response;

pub use descriptor::*;
pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
