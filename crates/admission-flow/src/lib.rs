//! Core library for the student-organization admission workflow.
//!
//! Applicants move through a fixed sequence of stages (questionnaire,
//! home video, interview) configured per organizational unit by its
//! administrators. This crate owns the stage/submission state machine:
//! the write gate, the volatile draft buffer, the durable submission
//! ledger with its review queue, the interview capacity scheduler, and
//! the stage orchestrator. Storage and notification delivery stay
//! behind traits so the HTTP/bot layers can wire in real adapters.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
