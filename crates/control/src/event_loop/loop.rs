use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{event::Event, timer::TimerWheel};

/// A pluggable producer that feeds `Event`s onto a loop's queue: the kernel
/// client's notification subscription, an application-registration
/// listener, anything that is not the timer wheel (which the loop owns
/// directly). Implementors drive themselves as a background task and push
/// onto the given sender; `spawn` hands ownership of `self` to that task.
pub trait EventSource: Send + 'static {
    fn spawn(self, tx: mpsc::Sender<Event>) -> tokio::task::JoinHandle<()>;
}

/// The per-IPCP event queue: one `mpsc` channel plus a timer wheel. Single-
/// threaded per IPCP (§5): every component that wants to tell this IPCP's
/// loop something sends an `Event`; the owner of the loop is the only
/// thing that calls `poll`/`wait`/`wait_for`.
pub struct EventLoop {
    sender: mpsc::Sender<Event>,
    receiver: mpsc::Receiver<Event>,
    timers: TimerWheel,
}

impl EventLoop {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver,
            timers: TimerWheel::new(),
        }
    }

    /// A sender producers can clone and hold onto to enqueue events.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.sender.clone()
    }

    pub fn register_source(&self, source: impl EventSource) -> tokio::task::JoinHandle<()> {
        source.spawn(self.sender())
    }

    pub fn schedule_in(&mut self, delay: Duration) -> super::timer::TimerId {
        self.timers.schedule_in(delay)
    }

    pub fn schedule_at(&mut self, deadline: Instant) -> super::timer::TimerId {
        self.timers.schedule_at(deadline)
    }

    pub fn cancel_timer(&mut self, id: super::timer::TimerId) {
        self.timers.cancel(id);
    }

    /// Non-blocking: a ready timer or a queued event, or `None` if neither
    /// is available right now.
    pub fn poll(&mut self) -> Option<Event> {
        if let Some(timer_id) = self.timers.pop_expired(Instant::now()) {
            return Some(Event::TimerExpired { timer_id });
        }
        self.receiver.try_recv().ok()
    }

    /// Block until a timer fires or an event is queued. Returns `None`
    /// only once every sender has been dropped and the queue is drained.
    pub async fn wait(&mut self) -> Option<Event> {
        loop {
            if let Some(timer_id) = self.timers.pop_expired(Instant::now()) {
                return Some(Event::TimerExpired { timer_id });
            }

            match self.timers.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        event = self.receiver.recv() => return event,
                        _ = tokio::time::sleep_until(deadline.into()) => continue,
                    }
                }
                None => return self.receiver.recv().await,
            }
        }
    }

    pub async fn wait_for(&mut self, duration: Duration) -> Option<Event> {
        tokio::time::timeout(duration, self.wait()).await.unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_a_sent_event() {
        let mut loop_ = EventLoop::new(8);
        let sender = loop_.sender();
        sender
            .send(Event::OsProcessFinalized { ipcp_id: 1 })
            .await
            .unwrap();

        let event = loop_.wait().await.unwrap();
        assert!(matches!(event, Event::OsProcessFinalized { ipcp_id: 1 }));
    }

    #[tokio::test]
    async fn wait_returns_an_expired_timer_before_a_later_event() {
        let mut loop_ = EventLoop::new(8);
        loop_.schedule_in(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let event = loop_.wait().await.unwrap();
        assert!(matches!(event, Event::TimerExpired { .. }));
    }

    #[tokio::test]
    async fn wait_for_times_out_with_no_events() {
        let mut loop_ = EventLoop::new(8);
        let event = loop_.wait_for(Duration::from_millis(5)).await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn poll_is_non_blocking() {
        let mut loop_ = EventLoop::new(8);
        assert!(loop_.poll().is_none());
    }
}
