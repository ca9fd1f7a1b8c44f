//! services/widget/src/lib.rs
//!
//! The ChatLite widget runtime: loader bootstrap, cross-document channel
//! carrier, embedded runtime controller and the session/message exchange,
//! plus the adapters binding them to HTTP, sqlite and a host document.

pub mod adapters;
pub mod config;
pub mod error;
pub mod loader;
pub mod runtime;

#[cfg(test)]
mod testutil;
