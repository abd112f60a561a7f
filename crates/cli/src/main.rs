use clap::Parser;
use k9db_cli::Cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    k9db_cli::run(cli)
}
