//! Store actor
//!
//! A single task owns the store and drains the shared inbound queue one
//! command at a time. Every mutation happens here, so the store moves through
//! a strictly ordered sequence of states no matter how many connections feed
//! the queue.
//!
//! Replies are pushed with an awaiting send on the issuing connection's
//! bounded reply channel. A connection that stops reading while its reply
//! channel is full therefore stalls the actor, and with it every other
//! connection.

use crate::config::Delimiters;
use crate::protocol::{Action, Command, ReplySender};
use crate::store::{render_detail, MemoryStore, Store};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Target for output meant for the operator rather than for debugging
pub const OPERATOR_TARGET: &str = "beamstore::operator";

pub struct StoreActor<S = MemoryStore> {
    store: S,
    delimiters: Delimiters,
    diagnostics: bool,
}

impl<S: Store> StoreActor<S> {
    pub fn new(store: S, delimiters: Delimiters) -> Self {
        Self {
            store,
            delimiters,
            diagnostics: false,
        }
    }

    /// Start with per-command diagnostic logging on or off
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process commands in arrival order until every sender is gone, then
    /// hand the store back
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Command>) -> S {
        while let Some(command) = inbound.recv().await {
            self.apply(command).await;
        }
        debug!("inbound queue closed, store actor stopping");
        self.store
    }

    /// Apply one command to completion
    pub async fn apply(&mut self, command: Command) {
        if self.diagnostics {
            info!(
                target: OPERATOR_TARGET,
                action = %command.action,
                key = %String::from_utf8_lossy(&command.key),
                payload = %String::from_utf8_lossy(&command.payload),
                "command"
            );
        }

        let wildcard = command.is_wildcard();
        let Command {
            action,
            key,
            payload,
            reply,
        } = command;

        match action {
            Action::Put => self.store.put(key, payload),
            Action::Get => {
                if wildcard {
                    for value in self.store.values() {
                        deliver(&reply, value).await;
                    }
                } else {
                    let value = self.store.get(&key).unwrap_or_default();
                    deliver(&reply, value).await;
                }
            }
            Action::Del => {
                if wildcard {
                    self.store.clear();
                } else {
                    self.store.remove(&key);
                }
            }
            Action::Con => {
                if wildcard {
                    for value in self.store.drain() {
                        deliver(&reply, value).await;
                    }
                } else {
                    let value = self.store.remove(&key).unwrap_or_default();
                    deliver(&reply, value).await;
                }
            }
            Action::Cnt => {
                info!(target: OPERATOR_TARGET, count = self.store.len(), "store count");
            }
            Action::Det => {
                let detail = render_detail(&self.store, &self.delimiters);
                info!(
                    target: OPERATOR_TARGET,
                    entries = self.store.len(),
                    "store detail\n{}",
                    String::from_utf8_lossy(&detail)
                );
            }
            Action::Log => {
                self.diagnostics = !self.diagnostics;
                if self.diagnostics {
                    info!(target: OPERATOR_TARGET, "logging turned on");
                }
            }
        }
    }
}

async fn deliver(reply: &ReplySender, value: Bytes) {
    if reply.send(value).await.is_err() {
        trace!("reply channel closed, dropping reply");
    }
}

/// Spawn a store actor behind a fresh inbound queue of `capacity` slots
pub fn spawn<S: Store>(
    store: S,
    delimiters: Delimiters,
    capacity: usize,
    diagnostics: bool,
) -> (mpsc::Sender<Command>, JoinHandle<S>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let actor = StoreActor::new(store, delimiters).with_diagnostics(diagnostics);
    let handle = tokio::spawn(actor.run(inbound_rx));
    (inbound_tx, handle)
}
