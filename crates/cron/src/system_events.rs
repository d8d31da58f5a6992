//! In-memory event buffer the main session drains, plus the heartbeat wake
//! signal cron dispatch uses to nudge the agent runtime.
//!
//! Background work (cron jobs firing) enqueues events here; the agent
//! runtime drains the queue on its next turn and may be woken early.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use tokio::sync::{Mutex, Notify};

use crate::error::{Error, Result};

/// Maximum events retained before oldest entries are dropped.
const MAX_EVENTS: usize = 20;

/// A single system event waiting for the main session to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEvent {
    /// Human-readable event description.
    pub text: String,
    /// Receiving agent.
    pub agent_id: String,
    /// Session the event belongs to.
    pub session_key: String,
    /// When the event was enqueued (epoch milliseconds).
    pub enqueued_at_ms: u64,
}

/// Thread-safe, bounded, dedup-aware event buffer.
pub struct SystemEventsQueue {
    events: Mutex<VecDeque<SystemEvent>>,
    closed: std::sync::atomic::AtomicBool,
}

impl SystemEventsQueue {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Enqueue an event. Consecutive duplicate `text` values for the same
    /// session are deduplicated. When the buffer exceeds [`MAX_EVENTS`], the
    /// oldest entry is dropped.
    pub async fn enqueue(&self, text: String, agent_id: String, session_key: String) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::message("system event sink is unavailable"));
        }
        let mut events = self.events.lock().await;

        if events
            .back()
            .is_some_and(|last| last.text == text && last.session_key == session_key)
        {
            return Ok(());
        }

        let enqueued_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        if events.len() >= MAX_EVENTS {
            events.pop_front();
        }

        events.push_back(SystemEvent {
            text,
            agent_id,
            session_key,
            enqueued_at_ms,
        });
        Ok(())
    }

    /// Drain all pending events, returning them in FIFO order.
    pub async fn drain(&self) -> Vec<SystemEvent> {
        let mut events = self.events.lock().await;
        events.drain(..).collect()
    }

    /// Peek at all pending events without removing them.
    pub async fn peek(&self) -> Vec<SystemEvent> {
        let events = self.events.lock().await;
        events.iter().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Mark the sink unavailable; subsequent enqueues fail. Used to model a
    /// stopped agent runtime.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Wake signal for the agent heartbeat loop.
pub struct HeartbeatWake {
    notify: Notify,
    last_reason: std::sync::Mutex<Option<String>>,
}

impl HeartbeatWake {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notify: Notify::new(),
            last_reason: std::sync::Mutex::new(None),
        })
    }

    pub fn wake(&self, reason: &str) {
        *self
            .last_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(reason.to_string());
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub fn take_last_reason(&self) -> Option<String> {
        self.last_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}
