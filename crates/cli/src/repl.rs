//! An interactive prompt over one [`Session`], grounded on `spacetimedb-cli`'s
//! `subcommands::repl` (a `rustyline::Editor` with on-disk history and a
//! `.exit`/`.clear` escape hatch) with the networking and syntax
//! highlighting stripped: every line is handed straight to the session.

use std::path::PathBuf;

use anyhow::Context;
use k9db_engine::Session;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::format::render;

fn history_path() -> PathBuf {
    dirs_home().join(".k9db_history.txt")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(std::env::temp_dir)
}

pub fn run(session: &mut Session<'_>, db_name: &str) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new().context("failed to start the line editor")?;
    let history = history_path();
    let _ = rl.load_history(&history);

    println!("k9db :: {db_name}");
    println!(".exit to quit, .clear to clear the screen");

    loop {
        let prompt = format!("{db_name}> ");
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();
                match line {
                    ".exit" => break,
                    ".clear" => {
                        rl.clear_screen().ok();
                    }
                    sql => match session.execute(sql) {
                        Ok(result) => println!("{}", render(&result)),
                        Err(e) => eprintln!("error: {e}"),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("readline failed"),
        }
    }

    let _ = rl.save_history(&history);
    Ok(())
}
