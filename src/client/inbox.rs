//! Per-action reply queues shared between the caller and the poller thread.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::constants::WAIT_POLL_INTERVAL;
use crate::protocol::{Action, Reply};

use super::ClientError;

/// Correlation state: one FIFO queue per action code.
///
/// Replies are filed purely by their `action` tag; nothing ties a reply to
/// the particular request that provoked it. The poller thread pushes,
/// callers pop. Error envelopes queue like successes; the caller inspects
/// `status` after dequeuing.
#[derive(Debug, Default)]
pub(crate) struct Inbox {
    queues: Mutex<HashMap<Action, VecDeque<Reply>>>,
    disconnected: AtomicBool,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// File a reply under its action code.
    pub(crate) fn push(&self, reply: Reply) {
        let mut queues = self.queues.lock().expect("inbox lock poisoned");
        queues.entry(reply.action).or_default().push_back(reply);
    }

    /// Dequeue the oldest reply for `action`, if any.
    pub(crate) fn pop(&self, action: Action) -> Option<Reply> {
        let mut queues = self.queues.lock().expect("inbox lock poisoned");
        queues.get_mut(&action)?.pop_front()
    }

    /// Block until a reply for `action` is queued or `timeout` elapses.
    ///
    /// Polls the queue at a fixed interval. Replies that were queued before
    /// a disconnect remain consumable; only an empty queue surfaces the
    /// disconnect.
    ///
    /// # Errors
    ///
    /// [`ClientError::Timeout`] when the deadline passes with no reply,
    /// [`ClientError::Disconnected`] when the poller has stopped and the
    /// queue is empty.
    pub(crate) fn wait_for(&self, action: Action, timeout: Duration) -> Result<Reply, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(reply) = self.pop(action) {
                return Ok(reply);
            }
            if self.is_disconnected() {
                return Err(ClientError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Dequeue every relayed-message envelope, oldest first.
    pub(crate) fn drain_messages(&self) -> Vec<Reply> {
        let mut queues = self.queues.lock().expect("inbox lock poisoned");
        queues
            .get_mut(&Action::GetMessage)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Dequeue the oldest relayed-message envelope, if any.
    pub(crate) fn pop_message(&self) -> Option<Reply> {
        self.pop(Action::GetMessage)
    }

    /// Mark the connection gone; pending and future waits fail fast.
    pub(crate) fn mark_disconnected(&self) {
        self.disconnected.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_queues_are_fifo_per_action() {
        let inbox = Inbox::new();
        inbox.push(Reply::success(Action::JoinRoom).with_room_id(1));
        inbox.push(Reply::success(Action::JoinRoom).with_room_id(2));
        inbox.push(Reply::success(Action::LeaveRoom));

        assert_eq!(inbox.pop(Action::JoinRoom).unwrap().room_id, Some(1));
        assert_eq!(inbox.pop(Action::JoinRoom).unwrap().room_id, Some(2));
        assert!(inbox.pop(Action::JoinRoom).is_none());
        assert!(inbox.pop(Action::LeaveRoom).is_some());
    }

    #[test]
    fn test_wait_for_returns_already_queued_reply() {
        let inbox = Inbox::new();
        inbox.push(Reply::success(Action::GetRoomInfo));

        let reply = inbox.wait_for(Action::GetRoomInfo, Duration::from_millis(100)).unwrap();
        assert_eq!(reply.action, Action::GetRoomInfo);
    }

    #[test]
    fn test_wait_for_times_out_after_deadline_not_before() {
        let inbox = Inbox::new();
        let timeout = Duration::from_millis(50);

        let start = Instant::now();
        let result = inbox.wait_for(Action::JoinRoom, timeout);
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(ClientError::Timeout)));
        assert!(elapsed >= timeout, "timed out after {elapsed:?}, before the {timeout:?} deadline");
    }

    #[test]
    fn test_wait_for_observes_reply_pushed_mid_wait() {
        let inbox = Arc::new(Inbox::new());
        let pusher = Arc::clone(&inbox);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            pusher.push(Reply::success(Action::AutojoinRoom).with_room_id(5));
        });

        let reply = inbox.wait_for(Action::AutojoinRoom, Duration::from_secs(2)).unwrap();
        assert_eq!(reply.room_id, Some(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_fails_fast_after_disconnect() {
        let inbox = Inbox::new();
        inbox.mark_disconnected();

        let start = Instant::now();
        let result = inbox.wait_for(Action::JoinRoom, Duration::from_secs(5));
        assert!(matches!(result, Err(ClientError::Disconnected)));
        assert!(start.elapsed() < Duration::from_secs(1), "must not wait out the full deadline");
    }

    #[test]
    fn test_reply_queued_before_disconnect_still_consumable() {
        let inbox = Inbox::new();
        inbox.push(Reply::success(Action::LeaveRoom));
        inbox.mark_disconnected();

        assert!(inbox.wait_for(Action::LeaveRoom, Duration::from_millis(50)).is_ok());
        assert!(matches!(
            inbox.wait_for(Action::LeaveRoom, Duration::from_millis(50)),
            Err(ClientError::Disconnected)
        ));
    }

    #[test]
    fn test_error_envelopes_queue_under_their_action() {
        let inbox = Inbox::new();
        inbox.push(Reply::error(Action::JoinRoom, crate::protocol::ErrorKind::RoomFull));

        let reply = inbox.wait_for(Action::JoinRoom, Duration::from_millis(50)).unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.error, Some(crate::protocol::ErrorKind::RoomFull));
    }

    #[test]
    fn test_drain_messages_empties_relay_queue_in_order() {
        let inbox = Inbox::new();
        inbox.push(Reply::success(Action::GetMessage).with_message(1, "first".into()));
        inbox.push(Reply::success(Action::GetMessage).with_message(2, "second".into()));

        let drained = inbox.drain_messages();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message.as_deref(), Some("first"));
        assert_eq!(drained[1].sender_id, Some(2));

        assert!(inbox.drain_messages().is_empty());
        assert!(inbox.pop_message().is_none());
    }
}
