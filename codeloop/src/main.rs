//! `codeloop` binary: interactive code generation, execution and repair.
//!
//! Loads `codeloop.toml` (or defaults), applies command-line overrides, wires
//! the configured backend and interpreter into a session, and hands the
//! terminal to the REPL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use codeloop::exit_codes;
use codeloop::generator::CodeGenerator;
use codeloop::io::completer::{CommandCompleter, Completer, GeminiCompleter};
use codeloop::io::config::{
    BackendKind, CodeloopConfig, DEFAULT_CONFIG_FILE, load_config, write_config,
};
use codeloop::io::console::{Console, TerminalConsole};
use codeloop::io::diagnostic_log::DiagnosticLog;
use codeloop::io::executor::InterpreterExecutor;
use codeloop::io::prompt::PromptBuilder;
use codeloop::io::saver::FileSaver;
use codeloop::logging;
use codeloop::repl::{Repl, ReplExit};
use codeloop::session::Session;

#[derive(Parser, Debug)]
#[command(
    name = "codeloop",
    version,
    about = "Generate, run and fix code from natural-language requests"
)]
struct Cli {
    /// Config file; missing file means built-in defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Seconds each run of generated code may take.
    #[arg(long)]
    timeout: Option<u64>,

    /// Text-generation backend.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Diagnostic log path.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory for saved code files.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Write the effective config to `--config` and exit.
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut CodeloopConfig) {
        if let Some(timeout) = self.timeout {
            cfg.timeout_secs = timeout;
        }
        if let Some(backend) = self.backend {
            cfg.backend.kind = backend;
        }
        if let Some(log_file) = &self.log_file {
            cfg.log_path = log_file.clone();
        }
        if let Some(save_dir) = &self.save_dir {
            cfg.save_dir = save_dir.clone();
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = effective_config(&cli)?;

    if cli.init_config {
        write_config(&cli.config, &cfg)?;
        println!("Wrote {}", cli.config.display());
        return Ok(exit_codes::OK);
    }

    let log = DiagnosticLog::new(&cfg.log_path);
    let completer = build_completer(&cfg)?;
    let mut session = Session::new(
        CodeGenerator::new(completer, PromptBuilder::new(cfg.language.clone()), log.clone()),
        executor(&cfg),
        FileSaver::new(cfg.save_dir.clone(), cfg.interpreter.suffix.clone()),
        log.clone(),
        Duration::from_secs(cfg.timeout_secs),
    );
    let mut console = TerminalConsole::new()?;

    info!(backend = ?cfg.backend.kind, language = %cfg.language, "session starting");
    let exit = Repl::new(&mut session, &mut console).run()?;
    info!(?exit, "session finished");

    match exit {
        ReplExit::Exited | ReplExit::EndOfInput => Ok(exit_codes::OK),
        ReplExit::Interrupted => {
            console.write_line("\nInterrupted by user. Bye!");
            log.record("User exited with interrupt.");
            Ok(exit_codes::INTERRUPTED)
        }
    }
}

/// Config file (or defaults) with command-line overrides applied and validated.
fn effective_config(cli: &Cli) -> Result<CodeloopConfig> {
    let mut cfg = load_config(Path::new(&cli.config))?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()
        .with_context(|| format!("invalid settings for {}", cli.config.display()))?;
    Ok(cfg)
}

fn executor(cfg: &CodeloopConfig) -> InterpreterExecutor {
    let executor = InterpreterExecutor::new(
        cfg.interpreter.command.clone(),
        cfg.interpreter.suffix.clone(),
        cfg.output_limit_bytes,
    );
    match &cfg.interpreter.staging_dir {
        Some(dir) => executor.with_staging_dir(dir),
        None => executor,
    }
}

fn build_completer(cfg: &CodeloopConfig) -> Result<Box<dyn Completer>> {
    match cfg.backend.kind {
        BackendKind::Command => Ok(Box::new(CommandCompleter::from_config(
            &cfg.backend.command,
        ))),
        BackendKind::Gemini => Ok(Box::new(
            GeminiCompleter::from_env(&cfg.backend.gemini).context("configure Gemini backend")?,
        )),
    }
}
