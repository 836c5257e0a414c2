//! # CLI - DriftKV Interactive Shell
//!
//! A REPL-style command-line interface for the DriftKV store. Reads commands
//! from stdin, executes them against the store, and prints results to stdout.
//! Logs go to stderr, so piping commands in and reading results out works for
//! scripted use too.
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key (the value is the rest of the line)
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (prints the old value or "(nil)")
//! FLUSH              Force the memtable into a sealed segment
//! COMPACT            Merge every segment into one
//! STATS              Print store counters
//! EXIT / QUIT        Flush and shut down
//! ```
//!
//! ## Configuration
//!
//! ```text
//! DRIFT_DIR                data directory, created if missing  (default: "data")
//! DRIFT_MAX_SEGMENT_SIZE   segment size limit in bytes         (default: 4 MiB)
//! DRIFT_MAX_RECORD_SIZE    record size limit in bytes          (default: 1024)
//! DRIFT_MEMTABLE_CAPACITY  entries before a flush              (default: 100)
//! DRIFT_WAL_SYNC           fsync every log append              (default: "true")
//! RUST_LOG                 log filter                          (default: "info")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ DRIFT_DIR=/tmp/drift cargo run -p cli
//! > SET name Alice
//! OK
//! > GET name
//! Alice
//! > DEL name
//! Alice
//! > GET name
//! (nil)
//! > EXIT
//! bye
//! ```

use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use config::StoreConfig;
use engine::Store;
use tracing_subscriber::EnvFilter;

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Set { key: &'a str, value: String },
    Get(&'a str),
    Del(&'a str),
    Flush,
    Compact,
    Stats,
    Exit,
}

fn parse_command(line: &str) -> Result<Option<Command<'_>>, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(None);
    };
    let command = match cmd.to_uppercase().as_str() {
        "SET" => {
            let key = parts.next().ok_or("usage: SET key value")?;
            let value = parts.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err("usage: SET key value".into());
            }
            Command::Set { key, value }
        }
        "GET" => Command::Get(parts.next().ok_or("usage: GET key")?),
        "DEL" => Command::Del(parts.next().ok_or("usage: DEL key")?),
        "FLUSH" => Command::Flush,
        "COMPACT" => Command::Compact,
        "STATS" => Command::Stats,
        "EXIT" | "QUIT" => Command::Exit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}

/// Runs one command and returns the line to print.
fn execute(store: &Store, command: Command<'_>) -> String {
    match command {
        Command::Set { key, value } => match store.set(key.as_bytes(), value.as_bytes()) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR set failed: {e}"),
        },
        Command::Get(key) => match store.get(key.as_bytes()) {
            Ok(Some(v)) => String::from_utf8_lossy(&v).into_owned(),
            Ok(None) => "(nil)".to_string(),
            Err(e) => format!("ERR read failed: {e}"),
        },
        Command::Del(key) => match store.del(key.as_bytes()) {
            Ok(Some(old)) => String::from_utf8_lossy(&old).into_owned(),
            Ok(None) => "(nil)".to_string(),
            Err(e) => format!("ERR del failed: {e}"),
        },
        Command::Flush => match store.force_flush() {
            Ok(sealed) => format!(
                "OK (sealed {}, total {})",
                sealed.len(),
                store.sealed_segments().len()
            ),
            Err(e) => format!("ERR flush failed: {e}"),
        },
        Command::Compact => match store.compact() {
            Ok(Some(outcome)) => format!(
                "OK (merged {}, live {}, dropped {})",
                outcome.merged_segments, outcome.live_keys, outcome.dropped_tombstones
            ),
            Ok(None) => "OK (nothing to compact)".to_string(),
            Err(e) => format!("ERR compact failed: {e}"),
        },
        Command::Stats => match store.stats() {
            Ok(stats) => format!("{stats:?}"),
            Err(e) => format!("ERR stats failed: {e}"),
        },
        Command::Exit => "bye".to_string(),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = StoreConfig::from_env().context("invalid configuration")?;
    fs::create_dir_all(&config.dir)
        .with_context(|| format!("creating {}", config.dir.display()))?;
    let store = Store::open(config).context("opening store")?;

    let report = store.recovery_report();
    tracing::info!(
        dir = %store.config().dir.display(),
        replayed = report.replayed_records,
        torn_bytes = report.torn_bytes,
        corrupt = report.corrupt_segments.len(),
        "DriftKV started"
    );
    println!("Commands: SET key value | GET key | DEL key | FLUSH | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    for line in io::stdin().lock().lines() {
        let line = line?;
        match parse_command(&line) {
            Ok(Some(Command::Exit)) => {
                println!("bye");
                break;
            }
            Ok(Some(command)) => println!("{}", execute(&store, command)),
            Ok(None) => {}
            Err(msg) => println!("ERR {msg}"),
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    store.close().context("closing store")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!(parse_command("get k"), Ok(Some(Command::Get("k"))));
        assert_eq!(parse_command("Del k"), Ok(Some(Command::Del("k"))));
        assert_eq!(parse_command("flush"), Ok(Some(Command::Flush)));
        assert_eq!(parse_command("quit"), Ok(Some(Command::Exit)));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn set_value_is_rest_of_line() {
        assert_eq!(
            parse_command("SET greeting hello   big world"),
            Ok(Some(Command::Set {
                key: "greeting",
                value: "hello big world".to_string()
            }))
        );
    }

    #[test]
    fn missing_arguments_are_errors() {
        assert!(parse_command("SET k").is_err());
        assert!(parse_command("SET").is_err());
        assert!(parse_command("GET").is_err());
        assert!(parse_command("DEL").is_err());
        assert_eq!(
            parse_command("SCAN a b"),
            Err("unknown command: SCAN".to_string())
        );
    }

    #[test]
    fn execute_runs_against_store() {
        let dir = tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();

        let set = Command::Set {
            key: "k",
            value: "v".into(),
        };
        assert_eq!(execute(&store, set), "OK");
        assert_eq!(execute(&store, Command::Get("k")), "v");
        assert_eq!(execute(&store, Command::Del("k")), "v");
        assert_eq!(execute(&store, Command::Del("k")), "(nil)");
        assert_eq!(execute(&store, Command::Get("k")), "(nil)");
        assert_eq!(execute(&store, Command::Compact), "OK (nothing to compact)");

        let bad = Command::Set {
            key: "a=b",
            value: "v".into(),
        };
        assert!(execute(&store, bad).starts_with("ERR set failed"));
    }
}
