//! Backend for the SVA (student verification assistant) exam terminal.
//!
//! A [`terminal::Terminal`] walks each student through face identification,
//! a course registration check and fingerprint verification, driven by the
//! pure transition function in [`machine`]. The biometric sensors are behind
//! [`biometrics_rs::BiometricProvider`]; [`app`] exposes the terminal over
//! HTTP to the kiosk frontend.

pub mod app;
pub mod config;
pub mod log;
pub mod machine;
mod tasks;
pub mod terminal;
