//! Job intake: a TCP listener that queues jobs for a pool of workers.

mod client;
pub mod protocol;
mod server;

pub use client::JobClient;
pub use protocol::{Job, JobAck};
pub use server::{JobHandler, JobServer, JobServerHandle};
