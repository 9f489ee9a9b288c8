//! Threaded runtime
//!
//! On the target the buzzer countdown is a hardware timer whose interrupt
//! preempts the main loop. On a host the same shape is a worker thread that
//! calls back into the node. Both contexts touch the node only through the
//! mutex in [`SharedNode`], so the main loop body and the expiry handler never
//! overlap.
//!
//! A countdown that is stopped or restarted must never deliver its expiry.
//! The worker stamps each expiry with the timer generation it was armed in,
//! and the handler drops any expiry whose generation is no longer current.
//! Because `start`/`stop` are only called with the node locked, and the
//! generation check happens with the node locked, no stale expiry can slip
//! through after `stop` returns.

use crate::config::NodeConfig;
use crate::hal::{BuzzerTimer, FrameSource, OutputLine};
use crate::node::{BrakeLightNode, NodeStatus};
use crate::types::{CanFrame, NodeError, Result};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Identifies which arming of the timer an expiry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryToken(u64);

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

impl TimerShared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot countdown backed by a worker thread
pub struct ThreadTimer {
    period: Duration,
    shared: Arc<TimerShared>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    /// Create a stopped timer; no expiries are delivered until
    /// [`ThreadTimer::spawn_worker`] registers a handler.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            shared: Arc::new(TimerShared::default()),
            worker: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Register the expiry handler and start the worker thread
    pub fn spawn_worker<F>(&mut self, on_expiry: F) -> Result<()>
    where
        F: FnMut(ExpiryToken) + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(NodeError::Timer("expiry handler already registered".to_string()));
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("buzzer-timer".to_string())
            .spawn(move || run_worker(&shared, on_expiry))
            .map_err(|e| NodeError::Timer(format!("failed to spawn timer worker: {}", e)))?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Whether an expiry stamped with `token` still belongs to the latest
    /// arming (no start or stop happened since it fired)
    pub fn is_current(&self, token: ExpiryToken) -> bool {
        self.shared.lock().generation == token.0
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    fn rearm(&mut self, deadline: Option<Instant>) {
        let mut state = self.shared.lock();
        state.generation = state.generation.wrapping_add(1);
        state.deadline = deadline;
        self.shared.wakeup.notify_one();
    }
}

impl BuzzerTimer for ThreadTimer {
    fn start(&mut self) {
        let deadline = Instant::now() + self.period;
        self.rearm(Some(deadline));
    }

    fn stop(&mut self) {
        self.rearm(None);
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wakeup.notify_one();

        if let Some(worker) = self.worker.take() {
            // The last node handle can be released from inside the expiry
            // handler, in which case we are running on the worker itself.
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                log::error!("Buzzer timer worker panicked");
            }
        }
    }
}

fn run_worker<F>(shared: &TimerShared, mut on_expiry: F)
where
    F: FnMut(ExpiryToken),
{
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }

        match state.deadline {
            None => {
                state = shared
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    state.deadline = None;
                    let token = ExpiryToken(state.generation);
                    drop(state);

                    on_expiry(token);
                    state = shared.lock();
                } else {
                    let (guard, _) = shared
                        .wakeup
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }
}

type ThreadedNode<L, P> = BrakeLightNode<L, P, ThreadTimer>;

fn lock_node<L, P>(node: &Mutex<ThreadedNode<L, P>>) -> MutexGuard<'_, ThreadedNode<L, P>> {
    node.lock().unwrap_or_else(|poisoned| {
        log::error!("Node mutex poisoned, continuing with last state");
        poisoned.into_inner()
    })
}

/// A node shared between the main loop and the buzzer timer worker
pub struct SharedNode<L, P> {
    inner: Arc<Mutex<ThreadedNode<L, P>>>,
}

impl<L, P> Clone for SharedNode<L, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, P> SharedNode<L, P>
where
    L: OutputLine + Send + 'static,
    P: OutputLine + Send + 'static,
{
    /// Bring up a node with a thread-backed buzzer timer
    pub fn start(brake_light: L, buzzer_line: P, config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let timer = ThreadTimer::new(config.buzzer_pulse());
        let inner = Arc::new(Mutex::new(BrakeLightNode::new(brake_light, buzzer_line, timer)));

        let weak = Arc::downgrade(&inner);
        lock_node(&inner)
            .buzzer_timer_mut()
            .spawn_worker(move |token| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut node = lock_node(&inner);
                if node.buzzer_timer().is_current(token) {
                    node.on_buzzer_timer_expired();
                } else {
                    log::trace!("Discarding stale buzzer expiry");
                }
            })?;

        let pulse = lock_node(&inner).buzzer_timer().period();
        log::info!(
            "Brake light node started (buzzer pulse {}ms)",
            pulse.as_millis()
        );
        Ok(Self { inner })
    }

    /// One main loop iteration: poll without holding the node, then
    /// dispatch with the node locked
    pub fn run_cycle<S: FrameSource>(&self, source: &mut S) -> bool {
        let frame = source.poll();
        lock_node(&self.inner).dispatch(frame.as_ref());
        frame.is_some()
    }

    pub fn dispatch(&self, frame: Option<&CanFrame>) {
        lock_node(&self.inner).dispatch(frame);
    }

    pub fn status(&self) -> NodeStatus {
        lock_node(&self.inner).status()
    }
}

/// Frame source fed by another thread through a channel
pub struct ChannelSource {
    receiver: Receiver<CanFrame>,
    disconnected: bool,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<CanFrame>) -> Self {
        Self {
            receiver,
            disconnected: false,
        }
    }

    /// True once the sending side is gone and the channel is drained
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl FrameSource for ChannelSource {
    fn poll(&mut self) -> Option<CanFrame> {
        match self.receiver.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }
}
