//! Shared Kernel
//!
//! Identifier value objects used across every bounded context.

mod identifiers;

pub use identifiers::{BrokerId, ClientId, OrderId, Symbol, UserId};
