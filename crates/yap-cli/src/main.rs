use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use yap_compiler::eval;
use yap_vm::Vm;

#[derive(Parser)]
#[command(name = "yap", about = "yap — a small language with a bytecode VM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .yap source file and run it on the bytecode VM.
    Run {
        /// Source file path (.yap)
        file: PathBuf,
    },
    /// Run a .yap source file on the tree-walking evaluator.
    Eval {
        /// Source file path (.yap)
        file: PathBuf,
    },
    /// Compile a .yap source file and print its bytecode.
    Dump {
        /// Source file path (.yap)
        file: PathBuf,
        /// Output the program as JSON instead of a textual listing.
        #[arg(long)]
        json: bool,
    },
    /// Dump the AST of a .yap source file as JSON.
    Ast {
        /// Source file path (.yap)
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run { file } => {
            let source = fs::read_to_string(&file)?;
            let program = yap_compiler::compile(&source)?;
            let mut vm = Vm::new(program);
            vm.run()?;
        }
        Command::Eval { file } => {
            let source = fs::read_to_string(&file)?;
            let program = yap_compiler::parse(&source)?;
            eval::run(&program)?;
        }
        Command::Dump { file, json } => {
            let source = fs::read_to_string(&file)?;
            let program = yap_compiler::compile(&source)?;
            if json {
                println!("{}", program.to_json()?);
            } else {
                print!("{}", program.disassemble());
            }
        }
        Command::Ast { file } => {
            let source = fs::read_to_string(&file)?;
            let program = yap_compiler::parse(&source)?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }
    }
    Ok(())
}
