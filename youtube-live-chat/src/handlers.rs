//! Subscriber registries and event dispatch.
//!
//! Every category keeps its own list of callbacks behind a reader/writer lock. Dispatch copies
//! the current callbacks out under the read lock and invokes them after releasing it, so a
//! subscriber may subscribe or unsubscribe (even itself) from inside a callback.
//!
//! Callbacks run synchronously on the task that dispatches, which for the poller and the stream
//! is their background loop. A slow callback therefore delays the next fetch or read. A callback
//! that panics is isolated: the remaining callbacks still run and the panic is reported to the
//! error handlers as [`ChatError::HandlerFault`].

use crate::error::ChatError;
use crate::youtube_api::chat::{
    LiveChatMessage, LiveChatMessageDetails, LiveChatMessageListResponse,
};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Identifies one subscription. Pass it back to `unsubscribe` to remove the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// The kinds of events subscribers can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Message,
    Delete,
    Ban,
    Error,
    Connect,
    Disconnect,
    PollComplete,
    Response,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::Delete => "delete",
            Self::Ban => "ban",
            Self::Error => "error",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::PollComplete => "poll-complete",
            Self::Response => "response",
        };
        f.write_str(name)
    }
}

/// Routes a chat message to the category its handlers are registered under.
///
/// Deletions and bans get their own categories; every other message type, including paid
/// messages, membership events, polls and unknown types, is a plain message.
pub fn classify(details: &LiveChatMessageDetails) -> EventCategory {
    match details {
        LiveChatMessageDetails::MessageDeleted { .. } => EventCategory::Delete,
        LiveChatMessageDetails::UserBanned { .. } => EventCategory::Ban,
        _ => EventCategory::Message,
    }
}

/// Summary of one completed fetch or stream page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollComplete {
    pub item_count: usize,
    /// The clamped interval the loop will wait before fetching again.
    pub interval: Duration,
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of callbacks for one event type.
pub struct HandlerRegistry<T> {
    ids: Arc<AtomicU64>,
    handlers: RwLock<Vec<(HandlerId, Callback<T>)>>,
}

impl<T> fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::with_ids(Arc::default())
    }
}

impl<T> HandlerRegistry<T> {
    /// Creates a registry that draws IDs from a counter shared with other registries.
    fn with_ids(ids: Arc<AtomicU64>) -> Self {
        Self {
            ids,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.ids.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback. Returns `false` if it was not (or no longer) registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every current callback with `event`.
    ///
    /// Returns the panic messages of callbacks that panicked. Callbacks after a panicking one
    /// still run.
    pub fn dispatch(&self, event: &T) -> Vec<String> {
        let snapshot: Vec<Callback<T>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut faults = Vec::new();
        for callback in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                faults.push(panic_message(&*payload));
            }
        }
        faults
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One registry per [`EventCategory`], shared by the poller and the stream.
///
/// Handler IDs are unique across categories, so [`ChatHandlers::unsubscribe`] needs only the ID.
pub struct ChatHandlers {
    message: HandlerRegistry<LiveChatMessage>,
    delete: HandlerRegistry<LiveChatMessage>,
    ban: HandlerRegistry<LiveChatMessage>,
    error: HandlerRegistry<ChatError>,
    connect: HandlerRegistry<()>,
    disconnect: HandlerRegistry<()>,
    poll_complete: HandlerRegistry<PollComplete>,
    response: HandlerRegistry<LiveChatMessageListResponse>,
}

impl fmt::Debug for ChatHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatHandlers")
            .field("message", &self.message.len())
            .field("delete", &self.delete.len())
            .field("ban", &self.ban.len())
            .field("error", &self.error.len())
            .field("connect", &self.connect.len())
            .field("disconnect", &self.disconnect.len())
            .field("poll_complete", &self.poll_complete.len())
            .field("response", &self.response.len())
            .finish()
    }
}

impl Default for ChatHandlers {
    fn default() -> Self {
        let ids = Arc::new(AtomicU64::new(1));
        Self {
            message: HandlerRegistry::with_ids(Arc::clone(&ids)),
            delete: HandlerRegistry::with_ids(Arc::clone(&ids)),
            ban: HandlerRegistry::with_ids(Arc::clone(&ids)),
            error: HandlerRegistry::with_ids(Arc::clone(&ids)),
            connect: HandlerRegistry::with_ids(Arc::clone(&ids)),
            disconnect: HandlerRegistry::with_ids(Arc::clone(&ids)),
            poll_complete: HandlerRegistry::with_ids(Arc::clone(&ids)),
            response: HandlerRegistry::with_ids(ids),
        }
    }
}

impl ChatHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message that is neither a deletion nor a ban.
    pub fn on_message<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&LiveChatMessage) + Send + Sync + 'static,
    {
        self.message.subscribe(f)
    }

    /// `messageDeletedEvent` messages.
    pub fn on_delete<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&LiveChatMessage) + Send + Sync + 'static,
    {
        self.delete.subscribe(f)
    }

    /// `userBannedEvent` messages.
    pub fn on_ban<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&LiveChatMessage) + Send + Sync + 'static,
    {
        self.ban.subscribe(f)
    }

    pub fn on_error<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&ChatError) + Send + Sync + 'static,
    {
        self.error.subscribe(f)
    }

    pub fn on_connect<F>(&self, f: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.connect.subscribe(move |_: &()| f())
    }

    pub fn on_disconnect<F>(&self, f: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.disconnect.subscribe(move |_: &()| f())
    }

    /// Called after each page with the number of items and the interval until the next fetch.
    pub fn on_poll_complete<F>(&self, f: F) -> HandlerId
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.poll_complete
            .subscribe(move |done: &PollComplete| f(done.item_count, done.interval))
    }

    /// The full parsed page, before its items are dispatched.
    pub fn on_response<F>(&self, f: F) -> HandlerId
    where
        F: Fn(&LiveChatMessageListResponse) + Send + Sync + 'static,
    {
        self.response.subscribe(f)
    }

    /// Removes a subscription from whichever category holds it. Safe to call repeatedly.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.message.remove(id)
            || self.delete.remove(id)
            || self.ban.remove(id)
            || self.error.remove(id)
            || self.connect.remove(id)
            || self.disconnect.remove(id)
            || self.poll_complete.remove(id)
            || self.response.remove(id)
    }

    /// Dispatches one chat message to the category chosen by [`classify`].
    pub fn dispatch_item(&self, message: &LiveChatMessage) {
        let category = classify(&message.snippet.details);
        tracing::trace!(
            mid = message.id,
            author = message.author_name(),
            kind = %message.snippet.details,
            %category,
            "dispatching chat message"
        );
        let registry = match category {
            EventCategory::Delete => &self.delete,
            EventCategory::Ban => &self.ban,
            _ => &self.message,
        };
        self.report_faults(category, registry.dispatch(message));
    }

    pub fn dispatch_connect(&self) {
        self.report_faults(EventCategory::Connect, self.connect.dispatch(&()));
    }

    pub fn dispatch_disconnect(&self) {
        self.report_faults(EventCategory::Disconnect, self.disconnect.dispatch(&()));
    }

    pub fn dispatch_poll_complete(&self, done: PollComplete) {
        self.report_faults(
            EventCategory::PollComplete,
            self.poll_complete.dispatch(&done),
        );
    }

    pub fn dispatch_response(&self, page: &LiveChatMessageListResponse) {
        self.report_faults(EventCategory::Response, self.response.dispatch(page));
    }

    /// Delivers an error to the error handlers.
    ///
    /// A panicking error handler is logged and dropped; it is never reported again.
    pub fn dispatch_error(&self, error: &ChatError) {
        for message in self.error.dispatch(error) {
            tracing::warn!(%message, %error, "error handler panicked; dropping");
        }
    }

    fn report_faults(&self, category: EventCategory, faults: Vec<String>) {
        for message in faults {
            tracing::warn!(%category, %message, "chat handler panicked");
            self.dispatch_error(&ChatError::HandlerFault { category, message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn message(kind: &str, extra: &str) -> LiveChatMessage {
        let json = format!(
            r#"{{"id": "m", "snippet": {{"type": "{kind}", "publishedAt": "2024-03-01T12:00:00Z"{extra}}}}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    fn text() -> LiveChatMessage {
        message(
            "textMessageEvent",
            r#", "textMessageDetails": {"messageText": "hi"}"#,
        )
    }

    fn counter(registry: &HandlerRegistry<()>) -> (HandlerId, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (id, count)
    }

    #[test]
    fn dispatch_reaches_exactly_current_subscribers() {
        let registry = HandlerRegistry::<()>::default();
        let (a, count_a) = counter(&registry);
        let (_b, count_b) = counter(&registry);

        assert!(registry.dispatch(&()).is_empty());
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);

        assert!(registry.remove(a));
        registry.dispatch(&());
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 2);

        // second removal is a no-op
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_are_unique_across_categories() {
        let handlers = ChatHandlers::new();
        let a = handlers.on_connect(|| {});
        let b = handlers.on_disconnect(|| {});
        let c = handlers.on_message(|_| {});
        assert_ne!(a, b);
        assert_ne!(b, c);

        assert!(handlers.unsubscribe(b));
        assert!(!handlers.unsubscribe(b));
        assert!(handlers.unsubscribe(c));
        assert_eq!(handlers.disconnect.len(), 0);
        assert_eq!(handlers.connect.len(), 1);
    }

    #[test]
    fn classifies_by_type() {
        assert_eq!(classify(&text().snippet.details), EventCategory::Message);
        let deleted = message(
            "messageDeletedEvent",
            r#", "messageDeletedDetails": {"deletedMessageId": "x"}"#,
        );
        assert_eq!(classify(&deleted.snippet.details), EventCategory::Delete);
        let banned = message(
            "userBannedEvent",
            r#", "userBannedDetails": {"bannedUserDetails": {"channelId": "UC"}, "banType": "permanent"}"#,
        );
        assert_eq!(classify(&banned.snippet.details), EventCategory::Ban);
        let tombstone = message("tombstone", "");
        assert_eq!(classify(&tombstone.snippet.details), EventCategory::Message);
    }

    #[test]
    fn routes_items_to_their_category() {
        let handlers = ChatHandlers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        handlers.on_message(move |_| s.lock().unwrap().push("message"));
        let s = Arc::clone(&seen);
        handlers.on_delete(move |_| s.lock().unwrap().push("delete"));
        let s = Arc::clone(&seen);
        handlers.on_ban(move |_| s.lock().unwrap().push("ban"));

        handlers.dispatch_item(&text());
        handlers.dispatch_item(&message(
            "messageDeletedEvent",
            r#", "messageDeletedDetails": {"deletedMessageId": "x"}"#,
        ));
        assert_eq!(*seen.lock().unwrap(), vec!["message", "delete"]);
    }

    #[test]
    fn panicking_handler_is_contained_and_reported() {
        let handlers = ChatHandlers::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(AtomicUsize::new(0));

        handlers.on_message(|_| panic!("boom"));
        let d = Arc::clone(&delivered);
        handlers.on_message(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });
        let e = Arc::clone(&errors);
        handlers.on_error(move |err| e.lock().unwrap().push(err.to_string()));

        handlers.dispatch_item(&text());

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], "message handler panicked: boom");
    }

    #[test]
    fn panicking_error_handler_is_dropped() {
        let handlers = ChatHandlers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        handlers.on_error(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            panic!("error handler broke");
        });
        handlers.on_connect(|| panic!("connect broke"));

        handlers.dispatch_connect();

        // one delivery of the fault, no recursion on the error handler's own panic
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_may_unsubscribe_during_dispatch() {
        let handlers = Arc::new(ChatHandlers::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None::<HandlerId>));

        let (h, c, s) = (Arc::clone(&handlers), Arc::clone(&calls), Arc::clone(&slot));
        let id = handlers.on_connect(move || {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *s.lock().unwrap() {
                h.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        handlers.dispatch_connect();
        handlers.dispatch_connect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poll_complete_carries_count_and_interval() {
        let handlers = ChatHandlers::new();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        handlers.on_poll_complete(move |count, interval| {
            *s.lock().unwrap() = Some((count, interval));
        });
        handlers.dispatch_poll_complete(PollComplete {
            item_count: 3,
            interval: Duration::from_secs(2),
        });
        assert_eq!(*seen.lock().unwrap(), Some((3, Duration::from_secs(2))));
    }
}
