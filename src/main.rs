use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use hrq2mongoq::{render_diagnostic, Compiler, CompilerConfig, ConfigError};

#[derive(ClapParser)]
#[command(name = "hrq2mongoq")]
#[command(about = "Compile human-readable queries into MongoDB filter documents")]
#[command(version)]
struct Cli {
    /// Query to compile; starts an interactive session when omitted
    query: Option<String>,

    /// JSON compiler configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the filter document
    #[arg(short, long)]
    pretty: bool,

    /// Print the token stream instead of the filter document
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Print the syntax tree instead of the filter document
    #[arg(long)]
    ast: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy)]
enum Output {
    Filter,
    Tokens,
    Ast,
}

fn setup_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new().filter_level(log_level).init();
}

/// Loads the configuration file if one was given. A missing file falls back
/// to the defaults; an unreadable or malformed one is an error.
fn load_config(path: Option<&PathBuf>) -> Result<CompilerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(CompilerConfig::default());
    };
    match CompilerConfig::from_json_file(path) {
        Ok(config) => {
            info!("loaded compiler config from {}", path.display());
            Ok(config)
        }
        Err(e @ ConfigError::NotFound(_)) => {
            warn!("{}, using default config", e);
            Ok(CompilerConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Runs one query and returns what to print, or a rendered diagnostic.
fn run(compiler: &Compiler, query: &str, output: Output, pretty: bool) -> Result<String, String> {
    let rendered = match output {
        Output::Tokens => match compiler.tokenize(query) {
            Ok(tokens) => tokens
                .iter()
                .map(|t| format!("{:>4}..{:<4} {:?}", t.span.start, t.span.end, t.kind))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => return Err(render_diagnostic(query, &e.into())),
        },
        Output::Ast => match compiler.parse(query) {
            Ok(ast) => format!("{:#?}", ast),
            Err(e) => return Err(render_diagnostic(query, &e)),
        },
        Output::Filter => match compiler.compile(query) {
            Ok(filter) => {
                let json = if pretty {
                    serde_json::to_string_pretty(&filter)
                } else {
                    serde_json::to_string(&filter)
                };
                json.map_err(|e| e.to_string())?
            }
            Err(e) => return Err(render_diagnostic(query, &e)),
        },
    };
    Ok(rendered)
}

fn repl(compiler: &Compiler, mut output: Output, pretty: bool) -> Result<()> {
    let mut rl = DefaultEditor::new().context("cannot start line editor")?;
    println!("hrq2mongoq: enter a query, or :tokens, :ast, :filter, :quit");

    loop {
        match rl.readline("hrq> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                match line {
                    ":quit" | ":q" => break,
                    ":tokens" => output = Output::Tokens,
                    ":ast" => output = Output::Ast,
                    ":filter" => output = Output::Filter,
                    query => match run(compiler, query, output, pretty) {
                        Ok(text) => println!("{}", text),
                        Err(diagnostic) => eprintln!("{}", diagnostic),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("cannot read line"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let compiler = Compiler::new(load_config(cli.config.as_ref())?);
    let output = if cli.tokens {
        Output::Tokens
    } else if cli.ast {
        Output::Ast
    } else {
        Output::Filter
    };

    match cli.query {
        Some(query) => match run(&compiler, &query, output, cli.pretty) {
            Ok(text) => println!("{}", text),
            Err(diagnostic) => {
                eprintln!("{}", diagnostic);
                process::exit(1);
            }
        },
        None => repl(&compiler, output, cli.pretty)?,
    }
    Ok(())
}
