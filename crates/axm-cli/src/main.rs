use anyhow::Result;
use clap::Parser;

mod args;
mod cmd;
mod output;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = args::Cli::parse();
    output::init(cli.json);

    let code = cmd::dispatch(cli)?;
    std::process::exit(code);
}
