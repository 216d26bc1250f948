use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use rewind6502::config::DebuggerConfig;
use rewind6502::console::Console;

#[derive(Parser, Debug)]
#[command(name = "rewind6502", version, about = "Reversible 6502 debugger console", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Program to load. Without --at the first two bytes are the load address
    #[arg(short, long)]
    load: Option<PathBuf>,
    /// Load address for --load
    #[arg(long, requires = "load")]
    at: Option<String>,
    /// VICE label file to import
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Connect to a VICE text monitor (host:port)
    #[arg(long)]
    connect: Option<String>,
    /// Run console commands from a file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(level: LevelFilter, log_file: Option<&PathBuf>) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    CombinedLogger::init(loggers).context("Failed to initialize logging")
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn run_lines(console: &mut Console, input: impl BufRead, interactive: bool) -> Result<()> {
    let mut lines = input.lines();
    loop {
        if interactive {
            print_lines(&console.poll());
            print!("(${:04x}) ", console.machine().registers().pc);
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim() == "q" {
            break;
        }
        print_lines(&console.execute(&line));
        if !interactive && console.machine().is_running() {
            print_lines(&console.wait());
        }
    }
    print_lines(&console.poll());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DebuggerConfig::load_or_default(cli.config.as_deref())?;
    let level = match cli.verbose {
        0 => config.level_filter(),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    init_logging(level, cli.log_file.as_ref())?;

    let mut console = Console::new(config);

    if let Some(path) = &cli.load {
        let addr = cli
            .at
            .as_deref()
            .map(|a| console.parse_address(a))
            .transpose()?;
        let (addr, len) = console.load_file(path, addr)?;
        println!("Loaded ${:x} bytes at ${:04x}", len, addr);
        let mut regs = console.machine().registers();
        regs.pc = addr;
        console.machine().set_registers(regs);
    }
    if let Some(path) = &cli.labels {
        let count = console.load_labels(path)?;
        println!("Imported {} labels", count);
    }
    if let Some(address) = &cli.connect {
        console.connect(address)?;
    }

    match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            run_lines(&mut console, io::BufReader::new(file), false)?;
        }
        None => {
            println!("rewind6502 {}. Type 'help' for commands, 'q' to quit.", env!("CARGO_PKG_VERSION"));
            run_lines(&mut console, io::stdin().lock(), true)?;
        }
    }

    console.shutdown();
    Ok(())
}
