//! Reporting components.
//!
//! This crate turns [`Snapshot`][cirrus_event::Snapshot]s into backend records and delivers them: context filtering,
//! translation, the flush orchestrator, and the transports it sends through.

#![deny(warnings)]
#![deny(missing_docs)]

pub mod filters;
pub mod formatters;
pub mod records;
pub mod reporters;
pub mod transports;
