//! Lifecycle and cursor state shared by [`LiveChatPoller`](crate::LiveChatPoller) and
//! [`LiveChatStream`](crate::LiveChatStream).

use crate::error::ChatError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Where a reader is in its start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Running,
    /// `stop` was requested and the loop task has not finished yet.
    Stopping,
}

/// Clamps a server-advised polling interval into `[min, max]`.
///
/// A missing hint keeps `current`, which is clamped as well.
pub fn clamp_interval(
    hint_millis: Option<u64>,
    current: Duration,
    min: Duration,
    max: Duration,
) -> Duration {
    let interval = hint_millis.map_or(current, Duration::from_millis);
    interval.clamp(min, max.max(min))
}

/// Resumption state of one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionCursor {
    pub(crate) page_token: Option<String>,
    pub(crate) poll_interval: Duration,
    pub(crate) reconnect_delay: Option<Duration>,
}

impl SessionCursor {
    pub(crate) fn new(poll_interval: Duration) -> Self {
        Self {
            page_token: None,
            poll_interval,
            reconnect_delay: None,
        }
    }

    /// Moves the cursor to `next`. An absent or empty token keeps the current position.
    pub(crate) fn advance(&mut self, next: Option<&str>) {
        if let Some(next) = next.filter(|t| !t.is_empty()) {
            self.page_token = Some(next.to_string());
        }
    }
}

/// The lifecycle state machine plus the cursor it protects.
///
/// The state lives in a watch channel: `send_if_modified` runs its closure under the channel's
/// lock, which makes each transition a compare-and-swap, and `stop` callers wait on a receiver
/// until the loop task reports `Stopped`.
#[derive(Debug)]
pub(crate) struct Session {
    state: watch::Sender<LifecycleState>,
    cancel: Mutex<Option<CancellationToken>>,
    cursor: Mutex<SessionCursor>,
    default_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub(crate) fn new(default_interval: Duration) -> Self {
        Self {
            state: watch::Sender::new(LifecycleState::Stopped),
            cancel: Mutex::new(None),
            cursor: Mutex::new(SessionCursor::new(default_interval)),
            default_interval,
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Moves `Stopped -> Running` and returns the token the loop must watch.
    ///
    /// The token is a child of `ctx`, so cancelling the caller's token also stops the loop.
    pub(crate) fn begin(&self, ctx: &CancellationToken) -> Result<CancellationToken, ChatError> {
        let token = ctx.child_token();
        let started = self.state.send_if_modified(|state| {
            if *state != LifecycleState::Stopped {
                return false;
            }
            *state = LifecycleState::Running;
            *lock(&self.cancel) = Some(token.clone());
            true
        });
        if started {
            Ok(token)
        } else {
            Err(ChatError::AlreadyRunning)
        }
    }

    /// Requests cancellation if running, then waits until the loop task has finished.
    pub(crate) async fn stop(&self) {
        let mut stopped = self.state.subscribe();
        let requested = self.state.send_if_modified(|state| {
            if *state != LifecycleState::Running {
                return false;
            }
            *state = LifecycleState::Stopping;
            if let Some(token) = lock(&self.cancel).take() {
                token.cancel();
            }
            true
        });
        if requested {
            tracing::debug!("stop requested; waiting for chat loop to exit");
        }

        // The sender lives as long as `self`, so this only returns once the state is Stopped.
        let _ = stopped
            .wait_for(|state| *state == LifecycleState::Stopped)
            .await;
    }

    /// Called by the loop task as its very last action.
    pub(crate) fn finish(&self) {
        self.state.send_if_modified(|state| {
            lock(&self.cancel).take();
            let changed = *state != LifecycleState::Stopped;
            *state = LifecycleState::Stopped;
            changed
        });
    }

    /// Runs `f` against the cursor if the loop is stopped.
    pub(crate) fn while_stopped<R>(
        &self,
        f: impl FnOnce(&mut SessionCursor) -> R,
    ) -> Result<R, ChatError> {
        // Hold the state borrow so `begin` cannot run concurrently.
        let state = self.state.borrow();
        if *state != LifecycleState::Stopped {
            return Err(ChatError::AlreadyRunning);
        }
        let result = f(&mut lock(&self.cursor));
        drop(state);
        Ok(result)
    }

    pub(crate) fn cursor(&self) -> SessionCursor {
        lock(&self.cursor).clone()
    }

    pub(crate) fn update_cursor<R>(&self, f: impl FnOnce(&mut SessionCursor) -> R) -> R {
        f(&mut lock(&self.cursor))
    }

    pub(crate) fn reset(&self) -> Result<(), ChatError> {
        let default_interval = self.default_interval;
        self.while_stopped(|cursor| *cursor = SessionCursor::new(default_interval))
    }
}

/// Marks the session stopped when the loop task ends, including by unwinding.
pub(crate) struct FinishOnDrop<'a>(pub(crate) &'a Session);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Sleeps for `duration` unless `cancel` fires first. Returns `false` if cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MIN: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);

    #[test]
    fn clamps_server_hint() {
        let current = Duration::from_secs(5);
        assert_eq!(clamp_interval(Some(100), current, MIN, MAX), MIN);
        assert_eq!(clamp_interval(Some(60_000), current, MIN, MAX), MAX);
        assert_eq!(
            clamp_interval(Some(5_000), current, MIN, MAX),
            Duration::from_secs(5)
        );
        assert_eq!(clamp_interval(Some(1_000), current, MIN, MAX), MIN);
        assert_eq!(clamp_interval(Some(30_000), current, MIN, MAX), MAX);
        assert_eq!(clamp_interval(Some(0), current, MIN, MAX), MIN);
    }

    #[test]
    fn missing_hint_keeps_current() {
        assert_eq!(
            clamp_interval(None, Duration::from_secs(7), MIN, MAX),
            Duration::from_secs(7)
        );
        assert_eq!(
            clamp_interval(None, Duration::from_secs(90), MIN, MAX),
            MAX
        );
    }

    #[test]
    fn cursor_only_moves_forward() {
        let mut cursor = SessionCursor::new(MIN);
        cursor.advance(Some("a"));
        cursor.advance(None);
        cursor.advance(Some(""));
        assert_eq!(cursor.page_token.as_deref(), Some("a"));
        cursor.advance(Some("b"));
        assert_eq!(cursor.page_token.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn only_one_begin_wins() {
        let session = Arc::new(Session::new(MIN));
        let ctx = CancellationToken::new();
        let mut wins = 0;
        for _ in 0..8 {
            if session.begin(&ctx).is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert!(session.is_running());
        assert!(session.reset().is_err());

        let waiter = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.stop().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(session.state(), LifecycleState::Stopping);
        session.finish();
        waiter.await.unwrap();
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert!(session.reset().is_ok());
    }

    #[tokio::test]
    async fn stop_when_stopped_returns_immediately() {
        let session = Session::new(MIN);
        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn stop_cancels_the_loop_token() {
        let session = Session::new(MIN);
        let parent = CancellationToken::new();
        let token = session.begin(&parent).unwrap();
        let stopper = session.stop();
        tokio::pin!(stopper);
        // drive stop far enough to request cancellation
        assert!(
            tokio::time::timeout(Duration::from_millis(10), &mut stopper)
                .await
                .is_err()
        );
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
        session.finish();
        stopper.await;
    }
}
