use anyhow::Context;
use clap::Parser;
use parley::cli::command::{CheckCommand, Cli, ColorChoice, Commands};
use parley::cli::{check, output, run};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    // Both reqwest and tokio-tungstenite pull in rustls; pin one provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    output::configure(output::OutputConfig {
        json: cli.json,
        quiet: cli.quiet,
    });

    if let Err(e) = dispatch(cli.command).await {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(arg) => {
            output::header(env!("CARGO_PKG_VERSION"));
            run::execute(&arg.config)
                .await
                .context("session ended")
        }
        Commands::Check(CheckCommand::Config(arg)) => check::execute_config(&arg.config)
            .with_context(|| format!("invalid configuration {}", arg.config.display())),
    }
}
