//! rulelight - highlight a source file to HTML using rule files

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use tracing_subscriber::EnvFilter;

use rulelight::syntax::clamp_tab_width;
use rulelight::{Config, HighlightError, Highlighter, Result};

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    file: Option<PathBuf>,
    language: Option<String>,
    rules_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    no_cache: bool,
    embedded: Option<bool>,
    tab_width: Option<usize>,
    list: bool,
    help: bool,
    version: bool,
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, filtered by RUST_LOG (default: warnings only)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&argv)?;

    if args.help {
        print_usage();
        return Ok(());
    }
    if args.version {
        print_version();
        return Ok(());
    }

    let mut config = Config::load();
    if let Some(dir) = &args.rules_dir {
        config.rules_dir = dir.clone();
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if args.no_cache {
        config.use_cache = false;
    }

    let mut highlighter = Highlighter::from_config(&config);

    if args.list {
        for language in highlighter.list_languages() {
            println!("{}", language);
        }
        return Ok(());
    }

    let Some(path) = args.file else {
        return Err(HighlightError::Message(
            "No input file (see --help)".to_string(),
        ));
    };

    let stdin = path.as_os_str() == "-";
    let source = if stdin {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        source
    } else {
        fs::read_to_string(&path)?
    };
    let mut options = config.highlight_options();
    options.embedded_override = args.embedded;
    if args.tab_width.is_some() {
        options.tab_width = args.tab_width;
    }

    // Standard input has no name, so only the shebang can identify it
    let path_name = if stdin { "".into() } else { path.to_string_lossy() };
    let language = args.language.as_deref().unwrap_or(&path_name);
    let result = highlighter.highlight_or_plain(language, &source, &options);

    let mut out = io::stdout().lock();
    writeln!(out, "<ol>{}</ol>", result.rendered)?;
    Ok(())
}

fn parse_args(argv: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => args.help = true,
            "--version" | "-V" => args.version = true,
            "--list" => args.list = true,
            "--no-cache" => args.no_cache = true,
            "--language" | "-l" => args.language = Some(value(&mut iter, arg)?.to_string()),
            "--rules" => args.rules_dir = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--cache" => args.cache_dir = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--embedded" => {
                args.embedded = Some(match value(&mut iter, arg)? {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(HighlightError::Message(format!(
                            "--embedded expects on or off, got '{}'",
                            other
                        )))
                    }
                });
            }
            "--tab-width" => {
                let n = value(&mut iter, arg)?;
                let n: usize = n.parse().map_err(|_| {
                    HighlightError::Message(format!("--tab-width expects a number, got '{}'", n))
                })?;
                args.tab_width = Some(clamp_tab_width(n));
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(HighlightError::Message(format!("Unknown option '{}'", other)));
            }
            file => {
                if args.file.is_some() {
                    return Err(HighlightError::Message(format!(
                        "Unexpected argument '{}'",
                        file
                    )));
                }
                args.file = Some(PathBuf::from(file));
            }
        }
    }

    Ok(args)
}

fn value<'a>(iter: &mut std::slice::Iter<'a, String>, option: &str) -> Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| HighlightError::Message(format!("{} requires a value", option)))
}

fn print_usage() {
    println!("rulelight {} - rule-driven syntax highlighter", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: rulelight [OPTIONS] FILE");
    println!("       rulelight [OPTIONS] -        (read standard input)");
    println!();
    println!("Options:");
    println!("  -l, --language NAME    Highlight as NAME instead of detecting the language");
    println!("      --rules DIR        Read rule files from DIR");
    println!("      --cache DIR        Store compiled rules in DIR");
    println!("      --no-cache         Do not read or write compiled rules on disk");
    println!("      --embedded on|off  Force html-embedded scanning on or off");
    println!("      --tab-width N      Spaces per tab (1-16)");
    println!("      --list             List available languages");
    println!("  -h, --help             Show this help message");
    println!("  -V, --version          Show version information");
    println!();
    println!("Settings are read from ~/.rulelight.toml; RUST_LOG controls logging.");
}

fn print_version() {
    println!("rulelight {}", env!("CARGO_PKG_VERSION"));
}
