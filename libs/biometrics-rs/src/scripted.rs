//! A provider that plays back a fixed script of outcomes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use types_rs::roster::{Identity, StudentId};

use crate::{BiometricError, BiometricProvider, IdentifyFuture, VerifyFuture};

#[derive(Debug, Clone)]
enum Reply<T> {
    Resolve(T),
    Fail(BiometricError),
    /// Never resolves.
    Hang,
}

#[derive(Debug, Clone)]
struct Step<T> {
    reply: Reply<T>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    faces: VecDeque<Step<Option<Identity>>>,
    fingerprints: VecDeque<Step<bool>>,
    fingerprint_requests: Vec<StudentId>,
    face_requests: usize,
}

/// Replays queued outcomes in order, one per call. Running out of script is a
/// [`BiometricError::ScriptExhausted`] fault rather than a panic so the
/// terminal's fault handling can be exercised too.
///
/// ```
/// # use std::time::Duration;
/// # use biometrics_rs::ScriptedProvider;
/// # use types_rs::roster::Roster;
/// let john = Roster::sample().students()[0].clone();
/// let provider = ScriptedProvider::new()
///     .identify(Some(john))
///     .verify_after(Duration::from_millis(300), true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay used by the steps added without an explicit one.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn identify(self, identity: Option<Identity>) -> Self {
        let delay = self.delay;
        self.identify_after(delay, identity)
    }

    #[must_use]
    pub fn identify_after(self, delay: Duration, identity: Option<Identity>) -> Self {
        self.push_face(Reply::Resolve(identity), delay)
    }

    #[must_use]
    pub fn identify_fault(self, error: BiometricError) -> Self {
        let delay = self.delay;
        self.push_face(Reply::Fail(error), delay)
    }

    #[must_use]
    pub fn identify_hang(self) -> Self {
        self.push_face(Reply::Hang, Duration::ZERO)
    }

    #[must_use]
    pub fn verify(self, matched: bool) -> Self {
        let delay = self.delay;
        self.verify_after(delay, matched)
    }

    #[must_use]
    pub fn verify_after(self, delay: Duration, matched: bool) -> Self {
        self.push_fingerprint(Reply::Resolve(matched), delay)
    }

    #[must_use]
    pub fn verify_fault(self, error: BiometricError) -> Self {
        let delay = self.delay;
        self.push_fingerprint(Reply::Fail(error), delay)
    }

    #[must_use]
    pub fn verify_hang(self) -> Self {
        self.push_fingerprint(Reply::Hang, Duration::ZERO)
    }

    /// Student ids passed to [`BiometricProvider::verify_fingerprint`], in
    /// call order.
    pub fn fingerprint_requests(&self) -> Vec<StudentId> {
        self.lock().fingerprint_requests.clone()
    }

    pub fn face_requests(&self) -> usize {
        self.lock().face_requests
    }

    fn push_face(self, reply: Reply<Option<Identity>>, delay: Duration) -> Self {
        self.lock().faces.push_back(Step { reply, delay });
        self
    }

    fn push_fingerprint(self, reply: Reply<bool>, delay: Duration) -> Self {
        self.lock().fingerprints.push_back(Step { reply, delay });
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // a panic while holding the lock cannot leave the script half-updated
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn play<T>(step: Option<Step<T>>, capability: &'static str) -> Result<T, BiometricError> {
    let Some(Step { reply, delay }) = step else {
        return Err(BiometricError::ScriptExhausted(capability));
    };

    tokio::time::sleep(delay).await;
    match reply {
        Reply::Resolve(value) => Ok(value),
        Reply::Fail(error) => Err(error),
        Reply::Hang => futures::future::pending().await,
    }
}

impl BiometricProvider for ScriptedProvider {
    fn identify_face(&self) -> IdentifyFuture {
        let step = {
            let mut script = self.lock();
            script.face_requests += 1;
            script.faces.pop_front()
        };
        play(step, "face").boxed()
    }

    fn verify_fingerprint(&self, student_id: &StudentId) -> VerifyFuture {
        let step = {
            let mut script = self.lock();
            script.fingerprint_requests.push(student_id.clone());
            script.fingerprints.pop_front()
        };
        play(step, "fingerprint").boxed()
    }
}
