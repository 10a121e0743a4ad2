use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::parser;
use rox::scanner;
use rox::{EvalError, Lox, LoxConfig, RunReport};

/// Exit code for scan, parse and resolve errors.
const EXIT_STATIC: i32 = 65;
/// Exit code for runtime faults.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,

    /// Let `var`, `fun` and `class` rebind an existing global
    #[arg(long, global = true)]
    allow_redefinition: bool,

    /// Scan, parse and resolve, but never execute
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Reads the whole file as UTF‑8.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

fn no_input() -> ! {
    println!("No input filepath was provided. Exiting...");
    process::exit(0);
}

fn config_for(cli: &Cli, file: &Path) -> LoxConfig {
    LoxConfig {
        allow_redefinition: cli.allow_redefinition,
        dry_run: cli.dry_run,
        file: Rc::from(file.display().to_string()),
    }
}

/// Print diagnostics of one run to stderr.
fn report(report: &RunReport) {
    for warning in &report.warnings {
        eprintln!("{}", warning);
    }

    for error in &report.errors {
        eprintln!("{}", error);
    }

    if let Some(fault) = &report.fault {
        eprintln!("{}", fault);
    }
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");

    let source = read_file(filename)?;
    let (tokens, errors) = scanner::scan(&source, filename.display().to_string());

    for e in &errors {
        debug!("Tokenization debug: {}", e);
        eprintln!("{}", e);
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", rendered);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    if !errors.is_empty() {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        process::exit(EXIT_STATIC);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: &Path) -> Result<()> {
    info!("Running Parse subcommand");

    let source = read_file(filename)?;
    let (tokens, errors) = scanner::scan(&source, filename.display().to_string());

    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{}", e);
        }
        process::exit(EXIT_STATIC);
    }

    match parser::parse_expression(&tokens) {
        Ok(expr) => {
            let ast = AstPrinter::print(&expr);
            debug!("AST: {}", ast);
            println!("{}", ast);
        }

        Err(e) => {
            debug!("Parse debug: {}", e);
            eprintln!("{}", e);
            process::exit(EXIT_STATIC);
        }
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn evaluate(cli: &Cli, filename: &Path) -> Result<()> {
    info!("Running Evaluate subcommand");

    let source = read_file(filename)?;
    let mut lox = Lox::new(config_for(cli, filename));

    match lox.evaluate_expression(&source) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
        }

        Err(EvalError::Static(errors)) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            process::exit(EXIT_STATIC);
        }

        Err(EvalError::Fault(fault)) => {
            debug!("Evaluation debug: {}", fault);
            eprintln!("{}", fault);
            process::exit(EXIT_RUNTIME);
        }
    }

    info!("Evaluate subcommand completed");
    Ok(())
}

fn run(cli: &Cli, filename: &Path) -> Result<()> {
    info!("Running Run subcommand");

    let source = read_file(filename)?;
    let mut lox = Lox::new(config_for(cli, filename));

    let outcome = lox.run(&source);
    report(&outcome);

    if !outcome.errors.is_empty() {
        process::exit(EXIT_STATIC);
    }

    if outcome.fault.is_some() {
        process::exit(EXIT_RUNTIME);
    }

    info!("Program executed successfully");
    Ok(())
}

/// Line‑oriented session over one persistent [`Lox`].  Redefinition is always
/// on so a line can be retyped.
fn repl(cli: &Cli) -> Result<()> {
    info!("Starting REPL");

    let config = LoxConfig {
        allow_redefinition: true,
        dry_run: cli.dry_run,
        file: Rc::from("<repl>"),
    };
    let mut lox = Lox::new(config);

    let mut show_tokens = false;
    let mut show_ast = false;

    let stdin = io::stdin();
    let mut lines = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        let read = lines.read_line(&mut line).context("Failed to read input")?;
        if read == 0 {
            println!();
            break;
        }

        let input = line.trim();
        match input {
            "" => continue,

            ":quit" => break,

            ":clear" => {
                lox.clear();
                println!("Globals cleared.");
                continue;
            }

            ":tokens" => {
                show_tokens = !show_tokens;
                println!("Token dump {}.", if show_tokens { "on" } else { "off" });
                continue;
            }

            ":ast" => {
                show_ast = !show_ast;
                println!("AST dump {}.", if show_ast { "on" } else { "off" });
                continue;
            }

            _ => {}
        }

        if show_tokens || show_ast {
            dump(input, show_tokens, show_ast);
        }

        let outcome = lox.run(input);
        report(&outcome);
    }

    info!("REPL finished");
    Ok(())
}

fn dump(input: &str, show_tokens: bool, show_ast: bool) {
    let (tokens, _) = scanner::scan(input, "<repl>");

    if show_tokens {
        for token in &tokens {
            println!("{}", token);
        }
    }

    if show_ast {
        if let (Some(statements), _) = parser::parse(&tokens) {
            for stmt in &statements {
                println!("{}", AstPrinter::print_stmt(stmt));
            }
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match &args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => tokenize(filename, *json)?,
            None => no_input(),
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => parse(filename)?,
            None => no_input(),
        },

        Commands::Evaluate { filename } => match filename {
            Some(filename) => evaluate(&args, filename)?,
            None => no_input(),
        },

        Commands::Run { filename } => match filename {
            Some(filename) => run(&args, filename)?,
            None => no_input(),
        },

        Commands::Repl => repl(&args)?,
    }

    Ok(())
}
