//! # CLI Layer
//!
//! The only place that knows about terminal I/O and exit codes.
//!
//! ## Commands
//!
//! | Command | Effect |
//! |---------|--------|
//! | `peek <type>` | Print the next number without consuming it |
//! | `reserve <type>` | Consume and print the next number |
//! | `counts` | Documents issued per type |
//! | `export <file>` | Write a project archive |
//! | `import <file>` | Replace all state with an archive's contents |
//! | `backend` | Which counter store is active, and where data lives |
//!
//! `<type>` is `invoice`, `receipt` or `waybill`. Global flags: `--data <dir>`
//! picks the data directory, `--json` switches output to one JSON object per
//! command, and `-v` (repeatable) raises the log level on stderr.

mod commands;
mod logging;
mod render;
pub mod setup;

pub use commands::run;
