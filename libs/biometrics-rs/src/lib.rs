//! Biometric capabilities used by the SVA terminal.
//!
//! The terminal only ever talks to a [`BiometricProvider`]. Two simulated
//! providers ship here: [`RandomDelayProvider`] for demos, which behaves like
//! a flaky sensor, and [`ScriptedProvider`] for tests, which plays back exactly
//! the outcomes it is given.

mod provider;
pub mod random;
pub mod scripted;

pub use provider::{
    BiometricError, BiometricProvider, DynBiometricProvider, IdentifyFuture, VerifyFuture,
};
pub use random::RandomDelayProvider;
pub use scripted::ScriptedProvider;
