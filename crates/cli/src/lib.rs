//! `k9db`, the embedded-database equivalent of `spacetimedb-cli`: opens a
//! database directory and either runs a REPL or executes a batch SQL file
//! against it (SPEC_FULL.md §A).

mod format;
mod repl;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use k9db_engine::{Config, Database, Session};

#[derive(Parser, Debug)]
#[command(name = "k9db", about = "Opens a k9db database directory and runs a REPL or a batch SQL file")]
pub struct Cli {
    /// Directory holding this database's `rocksdb` files and `k9db.toml`.
    pub db_path: PathBuf,

    /// Run every statement in this file instead of starting a REPL.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Disable at-rest encryption (spec.md §4.2's "encryption-off mode").
    #[arg(long)]
    pub no_encryption: bool,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(&cli.db_path).context("loading k9db.toml")?;
    if cli.no_encryption {
        config.encryption_enabled = false;
    }
    config.save().context("writing k9db.toml")?;

    let db = Database::open(config).context("opening the database")?;
    let mut session = Session::new(&db);

    match &cli.file {
        Some(path) => run_batch(&mut session, path),
        None => {
            let name = cli.db_path.file_name().and_then(|n| n.to_str()).unwrap_or("k9db").to_string();
            repl::run(&mut session, &name)
        }
    }
}

fn run_batch(session: &mut Session<'_>, path: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    for stmt in text.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        let result = session.execute(stmt).with_context(|| format!("executing {stmt:?}"))?;
        println!("{}", format::render(&result));
    }
    Ok(())
}
