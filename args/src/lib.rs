use std::path::PathBuf;
use once_cell::sync::Lazy;

#[macro_export]
macro_rules! exit {
    ($code:expr => $($arg:tt)*) => {{
        eprintln!($($arg)*);
        std::process::exit($code);
    }};
}

const HELP: &str = "OVERVIEW: Swift symbol demangler

USAGE: swiftsym [options] [SYMBOL]...

Symbols are read from stdin, one per line, when none are given.

OPTIONS:
  -H, --help          Print usage information
  -S, --simplify      Print symbols in a shortened form
  -R, --remangle      Print the remangled symbol instead of the demangled one
  -T, --tree          Print the tree of nodes a symbol is decoded into
  -C, --config        Path to config used for printing
  -V, --verbose       Print the log once finished";

const ABBRV: &[&str] = &["-H", "-S", "-R", "-T", "-C", "-V"];
const NAMES: &[&str] = &[
    "--help",
    "--simplify",
    "--remangle",
    "--tree",
    "--config",
    "--verbose",
];

pub static ARGS: Lazy<Cli> = Lazy::new(Cli::parse);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cli {
    /// Strip symbols into a simpler format.
    pub simplify: bool,

    /// Encode the decoded symbol again.
    pub remangle: bool,

    /// Dump the node tree.
    pub tree: bool,

    /// Write the log to stderr when finished.
    pub verbose: bool,

    /// Optional path to config.
    pub config: Option<PathBuf>,

    /// Symbols given on the command line.
    pub symbols: Vec<String>,
}

/// The closest known argument to `unknown`, if it's close enough to be a typo.
fn suggestion(unknown: &str) -> Option<&'static str> {
    let mut distance = u32::MAX;
    let mut best_guess = "";
    for name in NAMES {
        let d = triple_accel::levenshtein_exp(unknown.as_bytes(), name.as_bytes());
        if d < distance {
            distance = d;
            best_guess = name;
        }
    }

    // A guess that's less than 3 `steps` away from a correct arg.
    (distance < 4).then_some(best_guess)
}

impl Cli {
    pub fn parse() -> Self {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Self {
        let mut cli = Cli::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-H" | "--help" => exit!(0 => "{HELP}"),
                "-S" | "--simplify" => cli.simplify = true,
                "-R" | "--remangle" => cli.remangle = true,
                "-T" | "--tree" => cli.tree = true,
                "-V" | "--verbose" => cli.verbose = true,
                "-C" | "--config" => match args.next() {
                    Some(path) if !NAMES.contains(&&path[..]) && !ABBRV.contains(&&path[..]) => {
                        cli.config = Some(PathBuf::from(path));
                    }
                    _ => exit!(1 => "Missing path to a config."),
                },
                // everything that follows is a symbol
                "--" => cli.symbols.extend(args.by_ref()),
                unknown if unknown.starts_with('-') => match suggestion(unknown) {
                    Some(best_guess) => {
                        exit!(1 => "Unknown cmd arg '{unknown}' did you mean '{best_guess}'?")
                    }
                    None => exit!(1 => "Unknown cmd arg '{unknown}' was entered."),
                },
                symbol => cli.symbols.push(symbol.to_string()),
            }
        }

        cli.validate_args();
        cli
    }

    fn validate_args(&self) {
        if self.remangle && self.tree {
            exit!(1 => "Invalid combination of arguements.\n\n{HELP}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn flags() {
        let cli = parse(&["-S", "--verbose", "$s4main3fooyyF"]);
        assert!(cli.simplify);
        assert!(cli.verbose);
        assert!(!cli.remangle);
        assert_eq!(cli.symbols, vec!["$s4main3fooyyF".to_string()]);
    }

    #[test]
    fn config() {
        let cli = parse(&["--config", "swiftsym.yaml", "-R"]);
        assert_eq!(cli.config, Some(PathBuf::from("swiftsym.yaml")));
        assert!(cli.remangle);
    }

    #[test]
    fn separator() {
        let cli = parse(&["-T", "--", "-S"]);
        assert!(cli.tree);
        assert!(!cli.simplify);
        assert_eq!(cli.symbols, vec!["-S".to_string()]);
    }

    #[test]
    fn typos() {
        assert_eq!(suggestion("--simplfy"), Some("--simplify"));
        assert_eq!(suggestion("--remangel"), Some("--remangle"));
        assert_eq!(suggestion("--completely-unrelated"), None);
    }
}
