//! The verification flow as a pure transition function.
//!
//! [`Machine::apply`] takes one [`Event`] (a user [`Action`] or the completion
//! of something asynchronous) and returns the [`Effect`]s the caller has to
//! carry out. The machine never spawns, sleeps or calls a provider itself; see
//! [`crate::terminal`] for the runtime that does.

use std::fmt;
use std::sync::Arc;

use biometrics_rs::BiometricError;
use time::OffsetDateTime;
use types_rs::roster::{CourseCode, ExaminationSession, Identity, StudentId};
use types_rs::terminal::{Action, Outcome, Screen, TerminalSnapshot};

/// Progress added per tick while scanning a face.
pub const FACE_SCAN_PROGRESS_STEP: u8 = 5;

/// Progress added per tick while scanning a fingerprint.
pub const FINGERPRINT_SCAN_PROGRESS_STEP: u8 = 7;

pub const MAX_PROGRESS: u8 = 100;

/// Identifies one visit to one screen. Every asynchronous completion carries
/// the generation it was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    FaceScan,
    FingerprintScan,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FaceScan => f.write_str("Face scanning"),
            Self::FingerprintScan => f.write_str("Fingerprint scanning"),
        }
    }
}

/// Why a verification ended on the error screen. The display text is what
/// the person at the terminal reads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Face not recognized. Please try again or contact administrator.")]
    FaceNotRecognized,

    #[error("Student is not registered for {course_code} - {course_name}")]
    CourseNotRegistered {
        course_code: CourseCode,
        course_name: String,
    },

    #[error("Fingerprint verification failed. Please try again.")]
    FingerprintFailed,

    #[error("{capability} failed ({source}). Please try again.")]
    CapabilityFault {
        capability: Capability,
        source: BiometricError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{action} is not available on the {screen} screen")]
    InvalidAction { action: Action, screen: Screen },

    #[error("completion from generation {completed} arrived during generation {current}")]
    Stale {
        completed: Generation,
        current: Generation,
    },

    #[error("{event} does not apply to the {screen} screen")]
    UnexpectedEvent { event: &'static str, screen: Screen },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationState {
    pub screen: Screen,
    pub candidate: Option<Identity>,
    pub outcome: Option<Outcome>,
    pub progress: u8,
    pub error: Option<VerificationError>,
    pub approved_at: Option<OffsetDateTime>,
}

impl VerificationState {
    pub fn error_reason(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

#[derive(Debug)]
pub enum Event {
    Action(Action),
    FaceIdentified {
        generation: Generation,
        result: Result<Option<Identity>, BiometricError>,
    },
    FingerprintVerified {
        generation: Generation,
        result: Result<bool, BiometricError>,
        completed_at: OffsetDateTime,
    },
    ProgressTick {
        generation: Generation,
    },
    AutoResetElapsed {
        generation: Generation,
    },
}

impl Event {
    fn generation(&self) -> Option<Generation> {
        match self {
            Self::Action(_) => None,
            Self::FaceIdentified { generation, .. }
            | Self::FingerprintVerified { generation, .. }
            | Self::ProgressTick { generation }
            | Self::AutoResetElapsed { generation } => Some(*generation),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::FaceIdentified { .. } => "face identification",
            Self::FingerprintVerified { .. } => "fingerprint verification",
            Self::ProgressTick { .. } => "progress tick",
            Self::AutoResetElapsed { .. } => "auto-reset",
        }
    }
}

/// Work requested by a transition. Effects belong to the generation the
/// machine is in right after the transition that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    IdentifyFace,
    VerifyFingerprint(StudentId),
    StartProgress,
    StopProgress,
    ScheduleAutoReset,
}

#[derive(Debug)]
pub struct Machine {
    exam: Arc<ExaminationSession>,
    state: VerificationState,
    generation: Generation,
}

impl Machine {
    pub fn new(exam: Arc<ExaminationSession>) -> Self {
        Self {
            exam,
            state: VerificationState::default(),
            generation: Generation::default(),
        }
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn exam(&self) -> &ExaminationSession {
        &self.exam
    }

    pub fn snapshot(&self) -> TerminalSnapshot {
        TerminalSnapshot {
            generation: self.generation.get(),
            screen: self.state.screen,
            candidate: self.state.candidate.clone(),
            outcome: self.state.outcome,
            progress: self.state.progress,
            error_reason: self.state.error_reason(),
            approved_at: self.state.approved_at,
        }
    }

    /// Applies one event. On error the state is left exactly as it was.
    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        if let Some(completed) = event.generation() {
            if completed != self.generation {
                return Err(TransitionError::Stale {
                    completed,
                    current: self.generation,
                });
            }
        }

        match (self.state.screen, event) {
            (Screen::Welcome, Event::Action(Action::BeginFaceScan)) => {
                self.enter(Screen::FaceScanning);
                Ok(vec![Effect::StartProgress, Effect::IdentifyFace])
            }

            (Screen::FaceScanning, Event::FaceIdentified { result, .. }) => match result {
                Ok(Some(identity)) => {
                    tracing::info!("face identified as {}", identity.id);
                    self.state.candidate = Some(identity);
                    self.enter(Screen::StudentInfo);
                    Ok(vec![])
                }
                Ok(None) => Ok(self.fail(VerificationError::FaceNotRecognized)),
                Err(source) => Ok(self.fail(VerificationError::CapabilityFault {
                    capability: Capability::FaceScan,
                    source,
                })),
            },

            (Screen::StudentInfo, Event::Action(Action::ConfirmRegistration)) => {
                let registered = self.state.candidate.as_ref().is_some_and(|candidate| {
                    candidate.is_registered_for(&self.exam.course_code)
                });

                if registered {
                    self.enter(Screen::FingerprintPrompt);
                    Ok(vec![])
                } else {
                    Ok(self.fail(VerificationError::CourseNotRegistered {
                        course_code: self.exam.course_code.clone(),
                        course_name: self.exam.course_name.clone(),
                    }))
                }
            }

            (Screen::FingerprintPrompt, Event::Action(action @ Action::BeginFingerprintScan)) => {
                let Some(student_id) = self.state.candidate.as_ref().map(|c| c.id.clone()) else {
                    return Err(TransitionError::InvalidAction {
                        action,
                        screen: self.state.screen,
                    });
                };
                self.enter(Screen::FingerprintScanning);
                Ok(vec![
                    Effect::StartProgress,
                    Effect::VerifyFingerprint(student_id),
                ])
            }

            (
                Screen::FingerprintScanning,
                Event::FingerprintVerified {
                    result,
                    completed_at,
                    ..
                },
            ) => match result {
                Ok(true) => {
                    self.state.outcome = Some(Outcome::Approved);
                    self.state.approved_at = Some(completed_at);
                    self.enter(Screen::Result);
                    Ok(vec![Effect::ScheduleAutoReset])
                }
                Ok(false) => Ok(self.fail(VerificationError::FingerprintFailed)),
                Err(source) => Ok(self.fail(VerificationError::CapabilityFault {
                    capability: Capability::FingerprintScan,
                    source,
                })),
            },

            (screen, Event::ProgressTick { .. }) if screen.is_scanning() => {
                let step = match screen {
                    Screen::FaceScanning => FACE_SCAN_PROGRESS_STEP,
                    _ => FINGERPRINT_SCAN_PROGRESS_STEP,
                };
                let before = self.state.progress;
                self.state.progress = before.saturating_add(step).min(MAX_PROGRESS);

                if before < MAX_PROGRESS && self.state.progress == MAX_PROGRESS {
                    Ok(vec![Effect::StopProgress])
                } else {
                    Ok(vec![])
                }
            }

            (Screen::Result, Event::AutoResetElapsed { .. })
            | (Screen::Result, Event::Action(Action::VerifyNext))
            | (Screen::Error, Event::Action(Action::Retry))
            | (
                Screen::FaceScanning | Screen::FingerprintScanning,
                Event::Action(Action::CancelScan),
            ) => {
                self.reset();
                Ok(vec![])
            }

            (screen, Event::Action(action)) => {
                Err(TransitionError::InvalidAction { action, screen })
            }

            (screen, event) => Err(TransitionError::UnexpectedEvent {
                event: event.name(),
                screen,
            }),
        }
    }

    fn enter(&mut self, screen: Screen) {
        tracing::info!("screen {} -> {screen}", self.state.screen);
        self.generation = self.generation.next();
        self.state.screen = screen;
        self.state.progress = 0;
    }

    fn fail(&mut self, error: VerificationError) -> Vec<Effect> {
        tracing::warn!("verification failed: {error}");
        self.state.outcome = Some(Outcome::Denied);
        self.state.error = Some(error);
        self.enter(Screen::Error);
        vec![]
    }

    fn reset(&mut self) {
        self.state = VerificationState {
            screen: self.state.screen,
            ..VerificationState::default()
        };
        self.enter(Screen::Welcome);
    }
}
