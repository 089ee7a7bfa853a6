use std::path::{Path, PathBuf};

use apply::{apply_catalog, open_database, report};
use clap::Parser;
use cli::{Args, Commands};
use decl::{Catalog, Declarations};
use ddl::render_ddl;
use error::{CliError, CliResult};
use info::display_info;
use logging::setup_logging;
use quill_config::config::{
    default_config_document, generate_default_config, get_config, set_config, Config,
};
use quill_db::{Placeholder, RenderOptions};
use tracing::{debug, info};
use utils::set_color;

mod apply;
mod cli;
mod ddl;
mod decl;
mod error;
mod info;
mod logging;
mod utils;

fn load_catalog(file: Option<String>, config: &Config) -> CliResult<Catalog> {
    let path = file
        .map(PathBuf::from)
        .or_else(|| config.get_schema_path())
        .ok_or(CliError::NoSchema)?;
    debug!("reading declarations from {}", path.display());
    Declarations::load(&path)?.into_catalog()
}

fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::new()?,
    };
    set_config(config);
    let config = get_config();

    setup_logging(&args, config.log_sql());

    if args.no_color {
        set_color(false);
    }

    match args.command {
        Commands::Config { init } => {
            if init {
                let path = generate_default_config(args.config.as_deref().map(Path::new))?;
                info!("Wrote {}", path.display());
            } else {
                print!("{}", default_config_document()?);
            }
        }
        Commands::Ddl {
            file,
            if_not_exists,
        } => {
            let catalog = load_catalog(file, &config)?;
            print!("{}", render_ddl(&catalog, if_not_exists)?);
        }
        Commands::Info { file } => {
            let catalog = load_catalog(file, &config)?;
            display_info(&catalog, args.json)?;
        }
        Commands::Apply { file, database } => {
            let catalog = load_catalog(file, &config)?;
            let path = database
                .map(PathBuf::from)
                .unwrap_or_else(|| config.get_database_path());
            let placeholder: Placeholder = config.placeholder.parse()?;

            let db = open_database(&path, config.foreign_keys())?
                .with_options(RenderOptions { placeholder });
            report(&apply_catalog(&db, &catalog)?);
            info!("Applied {} table(s) to {}", catalog.tables.len(), path.display());
        }
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
