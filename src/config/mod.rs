//! Configuration module for Stagehand
//!
//! Provides CLI argument definitions, runtime staging configuration, and
//! stage-area resolution from the environment.

mod settings;

pub use settings::*;
