//! Application configuration.

use std::{path::PathBuf, sync::Arc, time::Duration};

use biometrics_rs::{DynBiometricProvider, RandomDelayProvider};
use clap::Parser;
use color_eyre::eyre::WrapErr;
use types_rs::roster::{ExaminationSession, Roster};

use crate::terminal::Timings;

pub const PROGRESS_TICK: Duration = Duration::from_millis(100);
pub const AUTO_RESET_AFTER: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,

    /// Directory to serve the kiosk frontend from.
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    /// JSON roster (`{"students": [...]}`). Uses the built-in sample roster
    /// when omitted.
    #[arg(long, env = "ROSTER_PATH")]
    pub roster_path: Option<PathBuf>,

    /// JSON examination session. Uses the built-in sample exam when omitted.
    #[arg(long, env = "EXAM_PATH")]
    pub exam_path: Option<PathBuf>,

    /// How long the simulated face scan takes.
    #[arg(long, env = "FACE_SCAN_DELAY_MS", default_value_t = 2000)]
    pub face_scan_delay_ms: u64,

    /// How long the simulated fingerprint scan takes.
    #[arg(long, env = "FINGERPRINT_SCAN_DELAY_MS", default_value_t = 1500)]
    pub fingerprint_scan_delay_ms: u64,

    /// Share of simulated fingerprint scans that match, from 0 to 1.
    #[arg(
        long,
        env = "FINGERPRINT_SUCCESS_RATE",
        default_value_t = 0.9,
        value_parser = parse_success_rate
    )]
    pub fingerprint_success_rate: f64,

    /// Seed for the simulated sensors, for repeatable demos.
    #[arg(long, env = "BIOMETRICS_SEED")]
    pub biometrics_seed: Option<u64>,

    /// Give up on a biometric scan after this long. 0 waits forever.
    #[arg(long, env = "CAPABILITY_TIMEOUT_MS", default_value_t = 30_000)]
    pub capability_timeout_ms: u64,
}

impl Config {
    pub fn load_roster(&self) -> color_eyre::Result<Roster> {
        match &self.roster_path {
            Some(path) => Roster::load(path)
                .wrap_err_with(|| format!("loading roster from {}", path.display())),
            None => Ok(Roster::sample()),
        }
    }

    pub fn load_exam(&self) -> color_eyre::Result<ExaminationSession> {
        match &self.exam_path {
            Some(path) => ExaminationSession::load(path)
                .wrap_err_with(|| format!("loading exam from {}", path.display())),
            None => Ok(ExaminationSession::sample()),
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            progress_tick: PROGRESS_TICK,
            auto_reset_after: AUTO_RESET_AFTER,
            capability_timeout: match self.capability_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    /// Builds the simulated sensors over `roster`.
    pub fn biometric_provider(&self, roster: Arc<Roster>) -> DynBiometricProvider {
        let provider = match self.biometrics_seed {
            Some(seed) => RandomDelayProvider::with_seed(roster, seed),
            None => RandomDelayProvider::new(roster),
        };
        Arc::new(
            provider
                .face_delay(Duration::from_millis(self.face_scan_delay_ms))
                .fingerprint_delay(Duration::from_millis(self.fingerprint_scan_delay_ms))
                .fingerprint_success_rate(self.fingerprint_success_rate),
        )
    }
}

fn parse_success_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{value} is not a rate between 0 and 1"))
    }
}
