//! Per-user notification mailbox and its flush loop

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{InitialState, PlayerStats, UserId};
use crate::util::time::notify_flush_interval;

use super::event::{kind, serialize_batch, Event};
use super::subscriber::{Subscriber, SubscriberSink, WriteError};

/// Mailbox of one user. Pushes never block on delivery; a background task
/// drains the queue every flush interval and writes one batch to every
/// attached subscriber.
pub struct NotifyClient {
    user_id: UserId,
    queue: Mutex<VecDeque<Event>>,
    subs: Mutex<Vec<Arc<Subscriber>>>,
}

impl NotifyClient {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            queue: Mutex::new(VecDeque::new()),
            subs: Mutex::new(Vec::new()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Queue `payload` under `kind`
    pub fn push<T: Serialize + ?Sized>(&self, kind: &str, payload: &T) {
        match Event::new(kind, payload) {
            Ok(event) => self.push_event(event),
            Err(e) => {
                error!(user_id = self.user_id, kind, error = %e, "Failed to serialize notification")
            }
        }
    }

    pub fn push_event(&self, event: Event) {
        self.queue.lock().push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs.lock().len()
    }

    pub fn push_flag(&self, name: &str, state: bool) {
        #[derive(Serialize)]
        struct Flag<'a> {
            name: &'a str,
            state: bool,
        }
        self.push(kind::FLAG, &Flag { name, state });
    }

    pub fn push_user_info(&self, render_id: &str) {
        #[derive(Serialize)]
        struct User<'a> {
            name: &'a str,
            username: &'a str,
        }
        #[derive(Serialize)]
        struct UserInfo<'a> {
            user: User<'a>,
        }
        self.push(
            kind::USERINFO,
            &UserInfo {
                user: User {
                    name: render_id,
                    username: render_id,
                },
            },
        );
    }

    pub fn push_initial(&self, initial: &InitialState) {
        self.push(kind::INITIAL, initial);
    }

    pub fn push_stats(&self, stats: &[PlayerStats]) {
        self.push(kind::STATS, stats);
    }

    /// Take everything queued so far
    pub fn drain(&self) -> Vec<Event> {
        self.queue.lock().drain(..).collect()
    }

    fn add(&self, sub: Arc<Subscriber>) {
        self.subs.lock().push(sub);
    }

    fn remove(&self, id: Uuid) {
        self.subs.lock().retain(|s| s.id() != id);
    }

    /// Detach and stop every subscriber still attached
    pub fn close(&self) {
        let subs: Vec<Arc<Subscriber>> = self.subs.lock().drain(..).collect();
        for sub in &subs {
            sub.stop();
        }
        if !subs.is_empty() {
            debug!(user_id = self.user_id, subscribers = subs.len(), "Released subscribers");
        }
    }

    /// Drain the queue and deliver it as one batch. Does nothing when the
    /// queue is empty. Delivery is attempted once, no retries.
    pub fn flush(&self) {
        let events = self.drain();
        if events.is_empty() {
            return;
        }

        let batch = match serialize_batch(&events) {
            Ok(batch) => batch,
            Err(e) => {
                error!(user_id = self.user_id, error = %e, "Failed to serialize batch");
                return;
            }
        };

        let subs: Vec<Arc<Subscriber>> = self.subs.lock().clone();
        debug!(
            user_id = self.user_id,
            events = events.len(),
            subscribers = subs.len(),
            "Flushing notifications"
        );

        for sub in subs {
            match sub.write(batch.clone()) {
                Ok(()) => {}
                Err(WriteError::Disconnected) => {
                    info!(user_id = self.user_id, subscriber = %sub.id(), "Subscriber disconnected");
                    self.remove(sub.id());
                    sub.stop();
                }
                Err(e) => {
                    warn!(user_id = self.user_id, subscriber = %sub.id(), error = %e, "Failed to deliver batch");
                }
            }
        }
    }

    /// Flush every interval until `stop` turns true, then flush once more
    /// and release the subscribers that received it
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut tick = interval(notify_flush_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => self.flush(),
                _ = until_stopped(&mut stop) => break,
            }
        }
        self.flush();
        self.close();

        info!(user_id = self.user_id, "Notification loop stopped");
    }

    /// Attach `sink` until it disconnects or the client is closed.
    ///
    /// `init` runs against a throwaway client with the same user id; its
    /// events are written to the new subscriber before it joins the live
    /// list, so they always precede live events. A subscriber that arrives
    /// after `round_stop` fired is let go at once.
    pub async fn subscribe<S, F>(&self, sink: S, init: F, round_stop: watch::Receiver<bool>)
    where
        S: SubscriberSink + 'static,
        F: FnOnce(&NotifyClient),
    {
        let sub = Subscriber::new(sink);

        let staging = NotifyClient::new(self.user_id);
        init(&staging);
        staging.add(Arc::clone(&sub));
        staging.flush();

        if sub.is_stopped() {
            debug!(user_id = self.user_id, "Subscriber left during bootstrap");
            return;
        }

        self.add(Arc::clone(&sub));
        debug!(user_id = self.user_id, subscriber = %sub.id(), "Subscriber attached");

        // Checked after joining the list: a stop raised later is followed by
        // the final flush and close, which both see this subscriber.
        if *round_stop.borrow() {
            sub.stop();
        }
        sub.stopped().await;

        self.remove(sub.id());
        debug!(user_id = self.user_id, subscriber = %sub.id(), "Subscriber detached");
    }
}

/// Resolves once the round stop flag is set or its sender is gone
pub async fn until_stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}
