//! # billdeskapp
//!
//! Core of the billdesk invoicing app: sequential document numbers for
//! invoices, receipts and waybills, document persistence with computed
//! totals, and portable project archives.
//!
//! ## Architecture
//!
//! ```text
//! front end (CLI, tests)
//!        |
//!    BillingApi            api.rs      facade, no logic
//!     /    |    \
//! Document Project  CounterStore       documents.rs, project/, counter/
//!  Store   Archive   (local | remote)
//!     \    |    /
//!     Database                         db.rs, one SQLite connection
//! ```
//!
//! - [`counter`]: the numbering contract and its local (SQLite) and remote
//!   (Firestore) implementations. Which one runs is decided once, at
//!   start-up, by [`counter::selector`].
//! - [`numbering`]: `INV-001` style formatting and parsing.
//! - [`documents`]: CRUD for the three document types. Creating a document
//!   reserves its number first; invoices get their totals from [`calculator`].
//! - [`project`]: zip export and all-or-nothing import of documents,
//!   counters and asset files.
//! - [`config`]: settings from `billdesk.toml` and the environment.
//! - [`init`]: resolves the data directory and wires everything together.
//!
//! Errors are typed ([`error::BillingError`], [`error::ImportError`]) and
//! logging goes through `tracing`; installing a subscriber is left to the
//! binary.

pub mod api;
pub mod calculator;
pub mod config;
pub mod counter;
pub mod db;
pub mod documents;
pub mod error;
pub mod init;
pub mod model;
pub mod numbering;
pub mod project;

#[cfg(test)]
pub mod test_utils;
