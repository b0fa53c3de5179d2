use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use types_rs::roster::{Identity, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BiometricError {
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("no scripted {0} outcome left")]
    ScriptExhausted(&'static str),
    #[error("no response within {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Other(String),
}

/// Resolves to the matched identity, or `None` if the face is not known.
pub type IdentifyFuture = BoxFuture<'static, Result<Option<Identity>, BiometricError>>;

/// Resolves to whether the presented fingerprint belongs to the student.
pub type VerifyFuture = BoxFuture<'static, Result<bool, BiometricError>>;

pub type DynBiometricProvider = Arc<dyn BiometricProvider>;

/// The two capabilities the terminal depends on. Each returned future
/// resolves at most once and owns everything it needs, so callers may drive
/// it on another task.
pub trait BiometricProvider: Send + Sync {
    fn identify_face(&self) -> IdentifyFuture;

    fn verify_fingerprint(&self, student_id: &StudentId) -> VerifyFuture;
}
