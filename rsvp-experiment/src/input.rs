use log::debug;
use rsvp_core::{Key, KeyEvent};
use rsvp_timing::{Timer, duration_ns, ns_to_ms};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// One listener firing: which listener, the matched key, and the time since
/// it was armed.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyHit {
    pub listener: ListenerHandle,
    pub key: Key,
    pub rt_ms: f64,
}

#[derive(Debug)]
struct Listener {
    handle: ListenerHandle,
    armed_at: u64,
    keys: Vec<Key>,
    persistent: bool,
}

impl Listener {
    fn accepts(&self, key: &Key) -> bool {
        self.keys.is_empty() || self.keys.contains(key)
    }
}

/// Keyboard listeners, each independently cancellable.
///
/// A single-shot listener disarms itself on its first hit; a persistent one
/// fires on every matching press until cancelled. Auto-repeat events from a
/// held key never fire anything.
#[derive(Debug, Default)]
pub struct KeyboardCapture {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl KeyboardCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty `keys` slice accepts any key.
    pub fn arm(&mut self, now_ns: u64, keys: &[Key], persistent: bool) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            handle,
            armed_at: now_ns,
            keys: keys.to_vec(),
            persistent,
        });
        debug!(
            "armed listener {} for {:?} (persistent: {persistent})",
            handle.0, keys
        );
        handle
    }

    /// Idempotent; returns whether the listener was still armed.
    pub fn cancel(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.handle != handle);
        let removed = before != self.listeners.len();
        if removed {
            debug!("cancelled listener {}", handle.0);
        }
        removed
    }

    pub fn cancel_all(&mut self) {
        self.listeners.clear();
    }

    pub fn is_armed(&self, handle: ListenerHandle) -> bool {
        self.listeners.iter().any(|l| l.handle == handle)
    }

    pub fn armed(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&mut self, now_ns: u64, event: &KeyEvent) -> Vec<KeyHit> {
        if event.repeat {
            debug!("ignoring held key {}", event.key);
            return Vec::new();
        }
        let mut hits = Vec::new();
        self.listeners.retain(|l| {
            if !l.accepts(&event.key) {
                return true;
            }
            hits.push(KeyHit {
                listener: l.handle,
                key: event.key.clone(),
                rt_ms: ns_to_ms(now_ns.saturating_sub(l.armed_at)),
            });
            l.persistent
        });
        hits
    }
}

/// Result of waiting on a [`KeySource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyWait {
    Pressed(KeyEvent),
    /// The deadline passed first. A key arriving exactly at the deadline
    /// comes after it.
    TimedOut,
    /// No key will ever arrive.
    Closed,
}

/// Blocking supply of key events, waited on against the runner's clock.
pub trait KeySource<T: Timer> {
    /// Wait until a key arrives or the clock reaches `deadline_ns`. On
    /// return `timer.now()` is the moment of the key or the deadline.
    fn wait_key(&mut self, timer: &T, deadline_ns: Option<u64>) -> KeyWait;
}

/// Key presses at fixed offsets from an origin on the runner's clock.
///
/// Waiting sleeps the timer, so on a `ManualTimer` the run takes no real time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    origin_ns: u64,
    presses: Vec<(u64, KeyEvent)>,
}

impl ScriptedKeys {
    pub fn new(origin_ns: u64) -> Self {
        Self {
            origin_ns,
            presses: Vec::new(),
        }
    }

    pub fn press_after(mut self, offset: Duration, key: impl Into<Key>) -> Self {
        self.push(offset, KeyEvent::press(key));
        self
    }

    pub fn hold_after(mut self, offset: Duration, key: impl Into<Key>) -> Self {
        self.push(offset, KeyEvent::held(key));
        self
    }

    fn push(&mut self, offset: Duration, event: KeyEvent) {
        let at = self.origin_ns.saturating_add(duration_ns(offset));
        let pos = self.presses.partition_point(|(t, _)| *t <= at);
        self.presses.insert(pos, (at, event));
    }

    pub fn remaining(&self) -> usize {
        self.presses.len()
    }
}

impl<T: Timer> KeySource<T> for ScriptedKeys {
    fn wait_key(&mut self, timer: &T, deadline_ns: Option<u64>) -> KeyWait {
        match (self.presses.first(), deadline_ns) {
            (Some(&(at, _)), Some(deadline)) if at >= deadline => {
                timer.sleep_until(deadline);
                KeyWait::TimedOut
            }
            (Some(&(at, _)), _) => {
                timer.sleep_until(at);
                let (_, event) = self.presses.remove(0);
                KeyWait::Pressed(event)
            }
            (None, Some(deadline)) => {
                timer.sleep_until(deadline);
                KeyWait::TimedOut
            }
            (None, None) => KeyWait::Closed,
        }
    }
}

/// Key events forwarded from another thread, e.g. a window's event loop.
impl<T: Timer> KeySource<T> for Receiver<KeyEvent> {
    fn wait_key(&mut self, timer: &T, deadline_ns: Option<u64>) -> KeyWait {
        let Some(deadline) = deadline_ns else {
            return match self.recv() {
                Ok(event) => KeyWait::Pressed(event),
                Err(_) => KeyWait::Closed,
            };
        };
        let wait = Duration::from_nanos(deadline.saturating_sub(timer.now()));
        match self.recv_timeout(wait) {
            Ok(event) => KeyWait::Pressed(event),
            Err(RecvTimeoutError::Timeout) => {
                timer.sleep_until(deadline);
                KeyWait::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => KeyWait::Closed,
        }
    }
}
