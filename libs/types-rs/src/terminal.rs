//! Screens, actions and snapshots of the verification terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roster::Identity;

/// One observable mode of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    #[default]
    Welcome,
    FaceScanning,
    StudentInfo,
    FingerprintPrompt,
    FingerprintScanning,
    Result,
    Error,
}

impl Screen {
    pub fn is_scanning(self) -> bool {
        matches!(self, Self::FaceScanning | Self::FingerprintScanning)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Welcome => "welcome",
            Self::FaceScanning => "faceScanning",
            Self::StudentInfo => "studentInfo",
            Self::FingerprintPrompt => "fingerprintPrompt",
            Self::FingerprintScanning => "fingerprintScanning",
            Self::Result => "result",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Approved,
    Denied,
}

/// Actions a person standing at the terminal can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    BeginFaceScan,
    ConfirmRegistration,
    BeginFingerprintScan,
    VerifyNext,
    Retry,
    CancelScan,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginFaceScan => "begin-face-scan",
            Self::ConfirmRegistration => "confirm-registration",
            Self::BeginFingerprintScan => "begin-fingerprint-scan",
            Self::VerifyNext => "verify-next",
            Self::Retry => "retry",
            Self::CancelScan => "cancel-scan",
        };
        f.write_str(name)
    }
}

/// What a kiosk frontend renders. Published after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSnapshot {
    /// Increments on every screen change.
    pub generation: u64,
    pub screen: Screen,
    pub candidate: Option<Identity>,
    pub outcome: Option<Outcome>,
    pub progress: u8,
    pub error_reason: Option<String>,
    #[serde(default, with = "time::serde::iso8601::option")]
    pub approved_at: Option<time::OffsetDateTime>,
}
