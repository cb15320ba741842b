use super::logging;
use super::render;
use super::setup::{Cli, Commands};
use anyhow::{Context, Result};
use billdeskapp::init::initialize;
use clap::Parser;
use std::fs;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = initialize(cli.data.clone()).context("could not initialize billdesk")?;
    let api = &ctx.api;
    let as_json = cli.json;

    let output = match &cli.command {
        Commands::Peek { doc_type } => {
            render::number(*doc_type, &api.peek_document_number(*doc_type)?, as_json)
        }
        Commands::Reserve { doc_type } => {
            render::number(*doc_type, &api.reserve_document_number(*doc_type)?, as_json)
        }
        Commands::Counts => render::counts(&api.get_document_counts()?, as_json),
        Commands::Export { output } => {
            let bytes = api.export_project_archive()?;
            fs::write(output, &bytes)
                .with_context(|| format!("could not write {}", output.display()))?;
            render::exported(output, bytes.len(), as_json)
        }
        Commands::Import { archive } => {
            let bytes = fs::read(archive)
                .with_context(|| format!("could not read {}", archive.display()))?;
            let summary = api
                .import_project_archive(&bytes)
                .with_context(|| format!("import of {} failed", archive.display()))?;
            render::imported(&summary, as_json)
        }
        Commands::Backend => render::backend(ctx.backend, &ctx.data_dir, as_json),
    };

    println!("{}", output);
    Ok(())
}
