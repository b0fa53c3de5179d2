//! Types shared by the SVA terminal backend and the biometric providers.
//!
//! [`roster`] holds the static records verification is performed against,
//! [`terminal`] holds the screen/action vocabulary and the snapshot published
//! to kiosk frontends.

pub mod roster;
pub mod terminal;
