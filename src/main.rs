//! The `micac` binary: a thin driver over [`micac::cli`].

use micac::cli::Cli;

fn main() -> anyhow::Result<()> {
    better_panic::install();
    env_logger::init();

    let cli: Cli = argh::from_env();
    cli.handle()
}
