//! Compile a `.usbd` description and print every descriptor buffer as hex.
//!
//! Usage:
//!   usbdc [OPTIONS] FILE.usbd
//!
//! Options:
//!   --verbose, -v   Debug logging, plus a field listing of every descriptor
//!   --lenient       Skip endpoint/interface uniqueness and association contiguity

use log::{Level, LevelFilter, Metadata, Record};
use std::path::PathBuf;
use usbdsl::dump::{describe_set, format_set};
use usbdsl::{compile_str, Options};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if record.level() == Level::Error {
                eprintln!("[{}] {}", record.level(), record.args());
            } else {
                eprintln!("[ {}] {}", record.level(), record.args());
            }
        }
    }

    fn flush(&self) {}
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = if let Some(pos) = raw_args.iter().position(|a| a == "--verbose" || a == "-v") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let lenient = if let Some(pos) = raw_args.iter().position(|a| a == "--lenient") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow::anyhow!("logger: {}", e))?;

    let path: PathBuf = raw_args
        .into_iter()
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: usbdc [--verbose|-v] [--lenient] FILE.usbd"))?;
    let src = std::fs::read_to_string(&path)?;

    let options = if lenient { Options::lenient() } else { Options::default() };
    let set = match compile_str(&src, &options) {
        Ok(set) => set,
        Err(err) => {
            let leaves = err.into_leaves();
            for e in &leaves {
                eprintln!("{}: {}", path.display(), e);
            }
            anyhow::bail!("{} error(s) in {}", leaves.len(), path.display());
        }
    };

    println!("{}", format_set(&set));
    if verbose {
        println!();
        println!("{}", describe_set(&set));
    }
    Ok(())
}
