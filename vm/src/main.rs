use clap::Parser as ClapParser;
use std::{io, path::PathBuf, process};

use bytecode::ProgramImage;
use vm::{Interpreter, StdConsole, VmSettings};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Compiled program image to execute
    #[arg(help = "The bytecode file to run")]
    file: PathBuf,

    /// Print the image instead of executing it
    #[arg(long, help = "Dump header, public symbols and disassembly")]
    dump: bool,

    /// Operand stack bound in words
    #[arg(long, default_value_t = vm::DEFAULT_STACK_WORDS)]
    stack_words: usize,

    /// Live objects allowed before the first collection
    #[arg(long)]
    gc_threshold: Option<usize>,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let image = ProgramImage::read_file(&cli.file).unwrap_or_else(|err| fail(err));

    if cli.dump {
        let mut out = io::stdout().lock();
        if let Err(err) = bytecode::dump(&image, &mut out) {
            fail(err);
        }
        return;
    }

    let mut settings = VmSettings {
        stack_words: cli.stack_words,
        ..Default::default()
    };
    if let Some(threshold) = cli.gc_threshold {
        settings.heap.initial_threshold = threshold;
    }
    let file_name = cli.file.display().to_string();
    let mut interpreter = Interpreter::new(&image, file_name, settings, StdConsole::new())
        .unwrap_or_else(|err| fail(err));
    if let Err(err) = interpreter.run() {
        fail(err);
    }
}
