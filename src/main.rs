use std::io::{self, BufRead, Write};

use args::Cli;
use config::Config;
use symbols::DemangleOptions;

mod threading;

#[macro_export]
macro_rules! exit {
    () => {{
        std::process::exit(0);
    }};

    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
        std::process::exit(1);
    }};
}

/// Decode a single symbol into the line that's printed for it. Symbols that
/// fail to decode are printed as is.
fn process(args: &Cli, options: DemangleOptions, symbol: &str) -> String {
    let node = match symbols::demangle(symbol) {
        Ok(node) => node,
        Err(err) => {
            log::warn!("[demangle] {symbol}: {err}");
            return symbol.to_string();
        }
    };

    if args.tree {
        return node.tree_string().trim_end().to_string();
    }

    let processed = if args.remangle {
        symbols::mangle(&node)
    } else {
        symbols::print_with(&node, options)
    };

    match processed {
        Ok(processed) => processed,
        Err(err) => {
            log::warn!("[process] {symbol}: {err}");
            symbol.to_string()
        }
    }
}

fn read_symbols() -> Vec<String> {
    let mut symbols = Vec::new();
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => symbols.push(line.trim().to_string()),
            Err(err) => exit!("Failed to read symbols from stdin: {err}"),
        }
    }

    symbols.retain(|symbol| !symbol.is_empty());
    symbols
}

fn main() {
    let args = &*args::ARGS;

    let config = match args.config {
        Some(ref path) => {
            if !path.is_file() {
                exit!("Config '{}' doesn't exist.", path.display());
            }

            Config::from_file(path)
        }
        None => config::CONFIG.clone(),
    };

    let mut options = config.options();
    if args.simplify {
        options = DemangleOptions::simplified();
    }

    let symbols = if args.symbols.is_empty() {
        read_symbols()
    } else {
        args.symbols.clone()
    };

    log::notify!("[main] processing {} symbols", symbols.len());
    let processed = threading::parallel_compute(&symbols, |symbol| process(args, options, symbol));

    let mut stdout = io::stdout().lock();
    for line in processed {
        if let Err(err) = writeln!(stdout, "{line}") {
            exit!("Failed to write to stdout: {err}");
        }
    }

    if args.verbose {
        if let Ok(mut logger) = log::LOGGER.lock() {
            let _ = logger.flush(&mut io::stderr(), true);
        }
    }
}
