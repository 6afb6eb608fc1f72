//! Data models for gsuite-mcp
//!
//! Raw Gmail API shapes, the flat records returned to tool callers, and
//! operation outcomes.

mod attachment;
mod label;
mod message;
mod outcome;

pub use attachment::*;
pub use label::*;
pub use message::*;
pub use outcome::*;
