//! # billdesk CLI
//!
//! Admin front end for `billdeskapp`. The binary is thin: everything lives in
//! `src/cli/`, and this file only calls [`cli::run`] and turns an error into
//! exit status 1.
//!
//! ```text
//! cli/setup.rs     clap definitions
//! cli/commands.rs  context wiring and dispatch to BillingApi
//! cli/render.rs    text and JSON output
//! cli/logging.rs   tracing subscriber
//! ```
//!
//! All numbering, persistence and archive logic stays in the library; the CLI
//! only knows about arguments, files on disk, stdout and stderr.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
