//! Core logic including the section codec, the conversation store and
//! the exchange controller.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod conversation;
pub mod exchange;
pub mod sections;
pub mod storage;
pub mod store;
