//! The ordered message log and its mutation observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::Message;

/// Identifier returned by [`MessageLog::subscribe`].
pub type ObserverId = u64;

/// Callback invoked after every successful mutation, with the log's new contents.
pub type Observer = Box<dyn Fn(LogChange, &[Message]) + Send + Sync>;

/// Kind of mutation that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    /// One message was added at the tail.
    Appended,
    /// The log was emptied.
    Cleared,
    /// The log was replaced by a compaction summary.
    Compacted,
    /// The log was replaced with an externally edited snapshot.
    Reconciled,
    /// The log was replaced with a saved session.
    Loaded,
}

/// Ordered sequence of messages. Insertion order is conversation order.
#[derive(Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: ObserverId,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append one message at the tail.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.notify(LogChange::Appended);
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.notify(LogChange::Cleared);
    }

    /// Replace the whole sequence in one step.
    pub fn replace(&mut self, messages: Vec<Message>, change: LogChange) {
        self.messages = messages;
        self.notify(change);
    }

    /// Register an observer. It runs after each mutation, in registration order.
    pub fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove a previously registered observer.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&self, change: LogChange) {
        for (_, observer) in &self.observers {
            observer(change, &self.messages);
        }
    }
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Handle to a log shared between the session loop and the bridge poller.
///
/// Every mutation and its observers run under one lock, so a reader never
/// sees a half-cleared or half-replaced log. The lock is never held across
/// an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedLog(Arc<Mutex<MessageLog>>);

impl SharedLog {
    pub fn new(log: MessageLog) -> Self {
        Self(Arc::new(Mutex::new(log)))
    }

    /// Lock the log. A panic in an observer does not make the log unusable.
    pub fn lock(&self) -> MutexGuard<'_, MessageLog> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current messages.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().messages().to_vec()
    }
}
