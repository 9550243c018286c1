use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub(crate) struct LookupOptions {
    /// Path of the configuration file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
    /// URL of the request
    #[clap(value_hint = ValueHint::Url)]
    pub url: String,
    /// Host of the request. Taken from the url if not set.
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigOptions {
    /// Path of the configuration file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(Debug, Subcommand)]
pub(crate) enum SubCommand {
    /// Resolve the proxy for one URL
    Lookup(LookupOptions),
    /// Answer lookups read from stdin, one `{url: .., host: ..}` mapping per line
    Batch(ConfigOptions),
    /// Load a configuration file and report what it installs
    Check(ConfigOptions),
}
