//! A simulated sensor pair with random outcomes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use types_rs::roster::{Roster, StudentId};

use crate::{BiometricError, BiometricProvider, IdentifyFuture, VerifyFuture};

pub const DEFAULT_FACE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_FINGERPRINT_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_FINGERPRINT_SUCCESS_RATE: f64 = 0.9;

/// Picks a random student (or nobody) for every face scan and accepts most
/// fingerprints, after a fixed delay.
///
/// Face scans draw uniformly among `roster.len() + 1` slots; the extra slot
/// means "not recognized". Fingerprints of students not on the roster never
/// verify.
#[derive(Debug, Clone)]
pub struct RandomDelayProvider {
    roster: Arc<Roster>,
    face_delay: Duration,
    fingerprint_delay: Duration,
    fingerprint_success_rate: f64,
    rng: Arc<Mutex<StdRng>>,
}

impl RandomDelayProvider {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self::with_rng(roster, StdRng::from_entropy())
    }

    /// Same draws for the same seed, useful for repeatable demos.
    pub fn with_seed(roster: Arc<Roster>, seed: u64) -> Self {
        Self::with_rng(roster, StdRng::seed_from_u64(seed))
    }

    fn with_rng(roster: Arc<Roster>, rng: StdRng) -> Self {
        Self {
            roster,
            face_delay: DEFAULT_FACE_DELAY,
            fingerprint_delay: DEFAULT_FINGERPRINT_DELAY,
            fingerprint_success_rate: DEFAULT_FINGERPRINT_SUCCESS_RATE,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    #[must_use]
    pub fn face_delay(mut self, delay: Duration) -> Self {
        self.face_delay = delay;
        self
    }

    #[must_use]
    pub fn fingerprint_delay(mut self, delay: Duration) -> Self {
        self.fingerprint_delay = delay;
        self
    }

    /// Clamped to `0.0..=1.0`. NaN never matches.
    #[must_use]
    pub fn fingerprint_success_rate(mut self, rate: f64) -> Self {
        self.fingerprint_success_rate = if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        };
        self
    }
}

impl BiometricProvider for RandomDelayProvider {
    fn identify_face(&self) -> IdentifyFuture {
        let slot = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..=self.roster.len()),
            Err(e) => {
                let message = format!("random source poisoned: {e}");
                return async move { Err(BiometricError::Other(message)) }.boxed();
            }
        };
        let identity = self.roster.students().get(slot).cloned();
        tracing::debug!(
            "simulated face scan drew slot {slot} ({:?})",
            identity.as_ref().map(|identity| identity.id.as_str())
        );

        let delay = self.face_delay;
        async move {
            tokio::time::sleep(delay).await;
            Ok(identity)
        }
        .boxed()
    }

    fn verify_fingerprint(&self, student_id: &StudentId) -> VerifyFuture {
        let enrolled = self.roster.get(student_id).is_some();
        let matched = match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.fingerprint_success_rate),
            Err(e) => {
                let message = format!("random source poisoned: {e}");
                return async move { Err(BiometricError::Other(message)) }.boxed();
            }
        };
        tracing::debug!(
            "simulated fingerprint for {student_id}: enrolled={enrolled} matched={matched}"
        );

        let delay = self.fingerprint_delay;
        async move {
            tokio::time::sleep(delay).await;
            Ok(enrolled && matched)
        }
        .boxed()
    }
}
