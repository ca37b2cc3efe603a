use clap::Parser;
use fmriprep::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fmri=info,fmriprep=info".into()),
        )
        .init();

    let mut cmd: Cli = Cli::parse();
    if let Err(e) = cmd.run_program() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
