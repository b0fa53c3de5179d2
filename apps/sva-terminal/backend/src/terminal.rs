use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use biometrics_rs::{BiometricError, DynBiometricProvider};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use types_rs::roster::ExaminationSession;
use types_rs::terminal::{Action, TerminalSnapshot};

use crate::machine::{Effect, Event, Machine, TransitionError};
use crate::tasks::{self, ScreenTimers, TimerKind};

/// Durations the terminal runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Time between two progress increments while scanning.
    pub progress_tick: Duration,

    /// Time the result screen stays up before the terminal resets itself.
    pub auto_reset_after: Duration,

    /// Upper bound on a single biometric call. `None` waits forever.
    pub capability_timeout: Option<Duration>,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            progress_tick: crate::config::PROGRESS_TICK,
            auto_reset_after: crate::config::AUTO_RESET_AFTER,
            capability_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),

    #[error("terminal is not running")]
    Closed,
}

/// Runs the verification flow for one kiosk. Owns the state machine on a
/// dedicated task; this handle only sends it actions and reads its snapshots.
pub struct Terminal {
    /// The inner state of the terminal, uses an Arc to allow cloning.
    inner: Arc<TerminalInner>,
}

struct TerminalInner {
    /// Every change to the verification state is published here. New
    /// subscribers receive the current snapshot.
    snapshot_tx: watch::Sender<TerminalSnapshot>,

    /// Actions for the terminal task.
    ops_tx: mpsc::UnboundedSender<TerminalOperation>,

    exam: Arc<ExaminationSession>,
}

impl Clone for Terminal {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("snapshot", &*self.inner.snapshot_tx.borrow())
            .finish()
    }
}

impl Terminal {
    /// Starts the terminal task. Must be called from within a tokio runtime.
    /// The task stops once every handle has been dropped.
    pub fn new(
        exam: Arc<ExaminationSession>,
        provider: DynBiometricProvider,
        timings: Timings,
    ) -> Self {
        let machine = Machine::new(Arc::clone(&exam));
        let (snapshot_tx, _) = watch::channel(machine.snapshot());
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            machine,
            provider,
            timings,
            timers: ScreenTimers::default(),
            events_tx,
            snapshot_tx: snapshot_tx.clone(),
        };
        tokio::spawn(runner.run(ops_rx, events_rx));

        Self {
            inner: Arc::new(TerminalInner {
                snapshot_tx,
                ops_tx,
                exam,
            }),
        }
    }

    /// Performs a user action and returns the snapshot right after it.
    pub async fn perform(&self, action: Action) -> Result<TerminalSnapshot, TerminalError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .ops_tx
            .send(TerminalOperation::Perform {
                action,
                respond: tx,
            })
            .map_err(|_| TerminalError::Closed)?;
        rx.await.map_err(|_| TerminalError::Closed)?
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<TerminalSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> TerminalSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn exam(&self) -> &ExaminationSession {
        &self.inner.exam
    }
}

/// Operations sent to the terminal task. For operations that require a
/// response, a oneshot channel is provided.
#[derive(Debug)]
enum TerminalOperation {
    Perform {
        action: Action,
        respond: oneshot::Sender<Result<TerminalSnapshot, TerminalError>>,
    },
}

struct Runner {
    machine: Machine,
    provider: DynBiometricProvider,
    timings: Timings,
    timers: ScreenTimers,
    events_tx: mpsc::UnboundedSender<Event>,
    snapshot_tx: watch::Sender<TerminalSnapshot>,
}

impl Runner {
    async fn run(
        mut self,
        mut ops_rx: mpsc::UnboundedReceiver<TerminalOperation>,
        mut events_rx: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            // Select whichever of the following completes first. Each branch
            // applies at most one event, so no two mutations interleave.
            tokio::select! {
                op = ops_rx.recv() => {
                    match op {
                        Some(TerminalOperation::Perform { action, respond }) => {
                            tracing::debug!("received action={action}");
                            let result = match self.dispatch(Event::Action(action)) {
                                Ok(()) => Ok(self.machine.snapshot()),
                                Err(e) => {
                                    tracing::warn!("rejected action: {e}");
                                    Err(TerminalError::Rejected(e))
                                }
                            };
                            let _ = respond.send(result);
                        }
                        None => {
                            tracing::debug!("all terminal handles dropped, exiting loop");
                            break;
                        }
                    }
                }

                Some(event) = events_rx.recv() => {
                    match self.dispatch(event) {
                        Ok(()) => {}
                        Err(e @ TransitionError::Stale { .. }) => {
                            tracing::trace!("dropping completion: {e}");
                        }
                        Err(e) => {
                            tracing::warn!("ignoring completion: {e}");
                        }
                    }
                }
            }
        }

        self.timers.cancel_all();
    }

    fn dispatch(&mut self, event: Event) -> Result<(), TransitionError> {
        let before = self.machine.generation();
        let effects = self.machine.apply(event)?;

        if self.machine.generation() != before {
            self.timers.cancel_all();
        }
        for effect in effects {
            self.execute(effect);
        }

        self.snapshot_tx.send_replace(self.machine.snapshot());
        Ok(())
    }

    fn execute(&mut self, effect: Effect) {
        let generation = self.machine.generation();
        let events = self.events_tx.clone();

        match effect {
            Effect::IdentifyFace => {
                let provider = Arc::clone(&self.provider);
                let limit = self.timings.capability_timeout;
                tokio::spawn(async move {
                    let call = async move { provider.identify_face().await };
                    let result = guarded(call, limit).await;
                    if let Err(e) = &result {
                        tracing::error!("face identification failed: {e}");
                    }
                    let _ = events.send(Event::FaceIdentified { generation, result });
                });
            }
            Effect::VerifyFingerprint(student_id) => {
                let provider = Arc::clone(&self.provider);
                let limit = self.timings.capability_timeout;
                let id = student_id.clone();
                tokio::spawn(async move {
                    let call = async move { provider.verify_fingerprint(&id).await };
                    let result = guarded(call, limit).await;
                    if let Err(e) = &result {
                        tracing::error!("fingerprint verification for {student_id} failed: {e}");
                    }
                    let _ = events.send(Event::FingerprintVerified {
                        generation,
                        result,
                        completed_at: OffsetDateTime::now_utc(),
                    });
                });
            }
            Effect::StartProgress => {
                self.timers.start(
                    TimerKind::Progress,
                    tasks::tick_progress(generation, self.timings.progress_tick, events),
                );
            }
            Effect::StopProgress => self.timers.cancel(TimerKind::Progress),
            Effect::ScheduleAutoReset => {
                self.timers.start(
                    TimerKind::AutoReset,
                    tasks::auto_reset(generation, self.timings.auto_reset_after, events),
                );
            }
        }
    }
}

/// Drives a biometric call on its own task. An overrun becomes
/// [`BiometricError::TimedOut`] and a panicking provider becomes
/// [`BiometricError::Other`]; the call itself is left to finish on its own.
async fn guarded<T, F>(call: F, limit: Option<Duration>) -> Result<T, BiometricError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, BiometricError>> + Send + 'static,
{
    let task = tokio::spawn(call);
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => return Err(BiometricError::TimedOut(limit)),
        },
        None => task.await,
    };
    joined.unwrap_or_else(|e| Err(BiometricError::Other(format!("sensor task failed: {e}"))))
}
