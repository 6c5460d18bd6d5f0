//! Coordination core of the patent drafting assistant.
//!
//! A realtime model emits function calls; the [`relay::EventRelay`] picks
//! them out of the inbound event stream, the [`executor::FunctionExecutor`]
//! runs them against the single active session held by the
//! [`registry::SessionRegistry`], and the results are sent back so the model
//! can speak about them.
pub mod bootstrap;
pub mod document;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod registry;
pub mod relay;

pub use error::PatentError;
