//! Wire types for the realtime speech/language model protocol.
//!
//! Client events flow from us to the model, server events flow back.
//! Only the subset the patent assistant needs is modelled; any other
//! server event deserializes into [`ServerEvent::Unknown`].
pub mod audio;
pub mod events;
pub mod items;
pub mod session;
pub mod tools;

pub use events::{ClientEvent, ServerEvent};
pub use items::{FunctionCallItem, FunctionCallOutputItem, Item, OutputItem};
pub use session::Session;
pub use tools::{FunctionTool, Tool, ToolChoice};
