//! Live notification fabric: per-user mailboxes flushed to attached
//! subscribers on a fixed interval

pub mod client;
pub mod distributor;
pub mod event;
pub mod subscriber;

pub use client::{until_stopped, NotifyClient};
pub use distributor::{Distributor, DistributorError, Severity};
pub use event::{kind, Event};
pub use subscriber::{Subscriber, SubscriberSink, WriteError};
