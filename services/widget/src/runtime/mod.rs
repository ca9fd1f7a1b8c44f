//! services/widget/src/runtime/mod.rs
//!
//! The embedded document's runtime: lifecycle state machine and chat
//! exchange.

pub mod chat;
pub mod controller;

pub use chat::ChatExchange;
pub use controller::{run_widget, Phase, WidgetController};
