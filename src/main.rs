use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::{Builder, Env};
use log::{debug, info};

use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::scanner::Scanner;
use lox::session::{parse_program, Session};

#[derive(ClapParser, Debug)]
#[command(
    version,
    about = "Lox language interpreter",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run; starts an interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to a file (level from RUST_LOG, default debug)
    #[arg(long, global = true)]
    log: bool,

    /// Where `--log` writes to
    #[arg(long, global = true, value_name = "PATH", default_value = "lox.log")]
    log_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints the AST of each statement
    Parse { filename: PathBuf },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },
}

/// Reads the contents of a file into a String
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

fn init_logger(path: &Path) -> Result<()> {
    let log_file = File::create(path).context(format!("Failed to create {:?}", path))?;

    Builder::from_env(Env::default().default_filter_or("debug"))
        .format(|buf, record| {
            // Strip 'lox::' from module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("lox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    info!("Logger initialized, writing to {:?}", path);
    Ok(())
}

/// Report a Lox error on stderr and return the exit status it maps to.
fn report(error: LoxError) -> i32 {
    let code: i32 = error.exit_code();
    debug!("Reporting {} diagnostic(s), exit code {}", error.count(), code);
    eprintln!("{}", error);
    code
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let source = read_file(filename)?;
    let mut tokens = Vec::new();
    let mut code = 0;

    for result in Scanner::new(&source) {
        match result {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }
            Err(e) => code = report(e),
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?
        );
    }

    Ok(code)
}

fn parse(filename: &Path) -> Result<i32> {
    let source = read_file(filename)?;

    match parse_program(&source) {
        Ok(program) => {
            for stmt in &program {
                println!("{}", AstPrinter::print_stmt(stmt));
            }
            Ok(0)
        }
        Err(e) => Ok(report(e)),
    }
}

fn run_file(filename: &Path) -> Result<i32> {
    let source = read_file(filename)?;
    let mut session = Session::new();

    match session.run(&source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }
        Err(e) => Ok(report(e)),
    }
}

fn run_prompt() -> Result<i32> {
    info!("Starting interactive prompt");

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        if lines.read_line(&mut line).context("Failed to read stdin")? == 0 {
            println!();
            break;
        }

        // Errors end the line, not the session.
        if let Err(e) = session.run(&line) {
            report(e);
        }
    }

    Ok(0)
}

/// Stack for the thread running Lox code; deep enough for
/// `lox::interpreter::MAX_CALL_DEPTH` nested calls in a debug build.
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn dispatch(args: Cli) -> Result<i32> {
    match (args.command, args.script) {
        (Some(Commands::Tokenize { filename, json }), _) => tokenize(&filename, json),
        (Some(Commands::Parse { filename }), _) => parse(&filename),
        (Some(Commands::Run { filename }), _) | (None, Some(filename)) => run_file(&filename),
        (None, None) => run_prompt(),
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger(&args.log_file)?;
    }

    info!("CLI arguments: {:?}", args);

    let code: i32 = thread::Builder::new()
        .name("lox".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || dispatch(args))
        .context("Failed to start interpreter thread")?
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
