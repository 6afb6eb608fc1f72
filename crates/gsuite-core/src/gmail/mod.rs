//! Gmail access: MIME decoding and encoding, the REST transport, and the
//! per-user mailbox service built on top of them

mod client;
mod decode;
mod encode;
mod service;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{GmailClient, GmailClientFactory};
pub use decode::*;
pub use encode::*;
pub use service::*;
pub use transport::{MailTransport, TransportFactory};
