//! Roster-wide registry of notify clients

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::game::UserId;

use super::client::NotifyClient;
use super::event::{kind, Event};
use super::subscriber::SubscriberSink;

/// Prefix of chat lines the server writes itself
pub const SERVER_CHAT_PREFIX: &str = "SERVER";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributorError {
    #[error("User {0} is not part of this round")]
    UnknownUser(UserId),
}

/// How a chat line is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Default,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Default => "default",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize)]
struct ChatLine<'a> {
    prefix: &'a str,
    msg: &'a str,
    severity: Severity,
}

#[derive(Debug, Serialize)]
struct ConnInfo<'a> {
    established: bool,
    ip: &'a str,
}

#[derive(Debug, Serialize)]
struct Info<'a> {
    conn: ConnInfo<'a>,
}

/// One mailbox per roster user, created up front and torn down with the
/// round
pub struct Distributor {
    roster: Vec<UserId>,
    clients: DashMap<UserId, Arc<NotifyClient>>,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Distributor {
    pub fn new(roster: Vec<UserId>) -> Self {
        let clients = DashMap::with_capacity(roster.len());
        for &user_id in &roster {
            clients.insert(user_id, Arc::new(NotifyClient::new(user_id)));
        }
        let (stop_tx, _) = watch::channel(false);

        Self {
            roster,
            clients,
            stop_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the flush loop of every client. Must run inside a tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        for entry in self.clients.iter() {
            let client = Arc::clone(entry.value());
            tasks.push(tokio::spawn(client.run(self.stop_tx.subscribe())));
        }
        info!(clients = tasks.len(), "Notification distributor started");
    }

    pub fn roster(&self) -> &[UserId] {
        &self.roster
    }

    pub fn client(&self, user_id: UserId) -> Option<Arc<NotifyClient>> {
        self.clients.get(&user_id).map(|c| Arc::clone(c.value()))
    }

    /// Number of live subscribers across all clients
    pub fn attached(&self) -> usize {
        self.clients
            .iter()
            .map(|c| c.value().subscriber_count())
            .sum()
    }

    /// Round-wide stop signal
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn push<T: Serialize + ?Sized>(&self, user_id: UserId, kind: &str, payload: &T) {
        if let Some(client) = self.clients.get(&user_id) {
            client.push(kind, payload);
        }
    }

    /// Push to every listed user. Ids outside the roster are skipped.
    pub fn push_group<'a, I, T>(&self, user_ids: I, kind: &str, payload: &T)
    where
        I: IntoIterator<Item = &'a UserId>,
        T: Serialize + ?Sized,
    {
        let event = match Event::new(kind, payload) {
            Ok(event) => event,
            Err(e) => {
                error!(kind, error = %e, "Failed to serialize notification");
                return;
            }
        };

        for user_id in user_ids {
            if let Some(client) = self.clients.get(user_id) {
                client.push_event(event.clone());
            }
        }
    }

    pub fn push_broadcast<T: Serialize + ?Sized>(&self, kind: &str, payload: &T) {
        self.push_group(&self.roster, kind, payload);
    }

    pub fn push_chat(&self, user_id: UserId, msg: &str, severity: Severity) {
        self.push_chat_prefixed_group(&[user_id], SERVER_CHAT_PREFIX, msg, severity);
    }

    pub fn push_chat_group<'a, I>(&self, user_ids: I, msg: &str, severity: Severity)
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        self.push_chat_prefixed_group(user_ids, SERVER_CHAT_PREFIX, msg, severity);
    }

    pub fn push_chat_prefixed_group<'a, I>(
        &self,
        user_ids: I,
        prefix: &str,
        msg: &str,
        severity: Severity,
    ) where
        I: IntoIterator<Item = &'a UserId>,
    {
        self.push_group(
            user_ids,
            kind::CHAT,
            &ChatLine {
                prefix,
                msg,
                severity,
            },
        );
    }

    pub fn push_chat_broadcast(&self, msg: &str, severity: Severity) {
        self.push_chat_group(&self.roster, msg, severity);
    }

    /// Tell a user's watchers that its play connection came or went
    pub fn push_info(&self, user_id: UserId, established: bool, ip: &str) {
        self.push(
            user_id,
            kind::INFO,
            &Info {
                conn: ConnInfo { established, ip },
            },
        );
    }

    /// Attach a subscriber to `user_id`'s mailbox and wait until it detaches
    pub async fn attach<S, F>(&self, user_id: UserId, sink: S, init: F) -> Result<(), DistributorError>
    where
        S: SubscriberSink + 'static,
        F: FnOnce(&NotifyClient),
    {
        let client = self
            .client(user_id)
            .ok_or(DistributorError::UnknownUser(user_id))?;
        client.subscribe(sink, init, self.stop_signal()).await;
        Ok(())
    }

    /// Stop every flush loop and release every attached subscriber
    pub async fn shutdown(&self) {
        self.stop_tx.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Notification loop panicked");
            }
        }
        // Loops that never started leave their subscribers attached
        for entry in self.clients.iter() {
            entry.value().close();
        }
        info!("Notification distributor stopped");
    }
}
