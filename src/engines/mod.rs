//! Speech generation engines.
//!
//! Neural engines live outside this crate and plug in through
//! [`SpeechEngine`](crate::SpeechEngine) and
//! [`EngineLoader`](crate::EngineLoader).
//!
//! # Available Engines
//!
//! - `tone` - deterministic tone synthesis for smoke tests and local runs

pub mod tone;
