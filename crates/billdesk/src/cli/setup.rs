use billdeskapp::model::DocumentType;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "billdesk",
    bin_name = "billdesk",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Document numbering and project archives for billdesk", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to $BILLDESK_DATA, then the OS data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count, help_heading = "Options")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the next document number without consuming it
    Peek {
        #[arg(value_parser = parse_doc_type)]
        doc_type: DocumentType,
    },

    /// Consume and print the next document number
    Reserve {
        #[arg(value_parser = parse_doc_type)]
        doc_type: DocumentType,
    },

    /// Show how many documents of each type have been numbered
    Counts,

    /// Write a project archive (zip) to a file
    Export {
        #[arg(value_name = "FILE")]
        output: PathBuf,
    },

    /// Replace all documents, counters and assets with an archive's contents
    Import {
        #[arg(value_name = "FILE")]
        archive: PathBuf,
    },

    /// Show the active counter store
    Backend,
}

fn parse_doc_type(s: &str) -> Result<DocumentType, String> {
    s.parse::<DocumentType>()
        .map_err(|_| format!("expected invoice, receipt or waybill, got '{}'", s))
}
