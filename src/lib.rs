//! Subsweep - idempotent batch subtitling
//!
//! Walks a directory tree of videos and, per video, produces source-language
//! subtitles by speech transcription and target-language subtitles by machine
//! translation, skipping whatever a previous run already finished.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod decision;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
