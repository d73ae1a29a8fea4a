//! Anonymized candidate matching with consent-gated identity disclosure.
//!
//! Companies browse candidates as de-identified records, express interest per job, and only see
//! real identity once the candidate accepts. Hiring a candidate suspends them platform-wide until
//! they reactivate their profile.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
