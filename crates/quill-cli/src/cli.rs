use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the default configuration, or write it with --init
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Print CREATE TABLE statements for declared tables
    Ddl {
        /// Table declarations file
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,

        /// Emit CREATE TABLE IF NOT EXISTS
        #[arg(long)]
        if_not_exists: bool,
    },

    /// Show the columns, keys and relations of declared tables
    #[clap(name = "info", visible_alias = "inspect")]
    Info {
        /// Table declarations file
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },

    /// Create declared tables in a database file
    Apply {
        /// Table declarations file
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,

        /// Database file, overriding the configured one
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        database: Option<String>,
    },
}
