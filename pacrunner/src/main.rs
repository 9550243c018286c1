use crate::app::App;
use crate::cli::SubCommand;
use clap::Parser;
use pacrunner::config::RawRootCfg;
use pacrunner::external;
use std::process::ExitCode;
use std::time::Duration;

mod app;
mod cli;

/// How long `check` waits for script downloads before reporting.
const CHECK_SETTLE: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "pacrunner", about = "Proxy auto-configuration runner")]
struct ProgramArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: SubCommand,
}

fn load_app(path: &std::path::Path) -> anyhow::Result<App> {
    let config = RawRootCfg::load(path)?;
    App::create(&config)
}

fn run(cmd: SubCommand) -> anyhow::Result<()> {
    match cmd {
        SubCommand::Lookup(opts) => {
            let app = load_app(&opts.config)?;
            let resp = app.lookup(&opts.url, opts.host.as_deref());
            println!("{}", resp.directive());
            app.shutdown();
        }
        SubCommand::Batch(opts) => {
            let app = load_app(&opts.config)?;
            app.serve_batch(std::io::stdin().lock(), std::io::stdout().lock())?;
            app.shutdown();
        }
        SubCommand::Check(opts) => {
            let app = load_app(&opts.config)?;
            app.settle(CHECK_SETTLE);
            println!("{}", app.report());
            app.shutdown();
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: ProgramArgs = ProgramArgs::parse();
    if let Err(e) = external::init_tracing(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    match run(args.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
