use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser as ClapParser, Subcommand};
use num_bigint::BigInt;

use fint::codegen::{self, CompileOptions, Compiled};
use fint::diagnostic::{self, ansi::AnsiRenderer, json, Diagnostic};
use fint::vm::{disasm, Console, Machine, Scripted};
use fint::{image, Error};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Report diagnostics as JSON, one object per line
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a source file to a program image
    Build {
        file: PathBuf,
        /// Write the image here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Vary the instruction encodings, reproducibly
        #[arg(long)]
        seed: Option<u64>,
        /// First heap address
        #[arg(long, default_value_t = 1_000_000)]
        ram_begin: u64,
    },
    /// Compile and run a source file, or run an image
    Run {
        file: PathBuf,
        /// Treat the file as a program image
        #[arg(long)]
        image: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// Values for the read channel; without any, lines are read from stdin
        #[arg(long = "input", allow_negative_numbers = true)]
        inputs: Vec<BigInt>,
    },
    /// Print the parsed program
    Ast {
        file: PathBuf,
        /// Print fully parenthesised source instead of JSON
        #[arg(long)]
        pretty: bool,
    },
    /// List the instructions of a compiled program or an image
    Disasm {
        file: PathBuf,
        #[arg(long)]
        image: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// The current invocation's output settings and the source being worked on.
struct Session {
    json: bool,
    source: Option<String>,
}

impl Session {
    fn report(&self, d: Diagnostic) {
        let d = match &self.source {
            Some(source) if d.source.is_none() => d.with_source(source.clone()),
            _ => d,
        };
        if self.json {
            eprintln!("{}", json::render(&d));
        } else {
            let renderer = AnsiRenderer { use_color: io::stderr().is_terminal() };
            eprint!("{}", renderer.render(&d));
        }
    }

    fn read(&mut self, path: &Path) -> Result<String, Error> {
        let text = fs::read_to_string(path)?;
        self.source = Some(text.clone());
        Ok(text)
    }

    fn compile(&mut self, path: &Path, options: &CompileOptions) -> Result<Compiled, Error> {
        let text = self.read(path)?;
        let program = fint::parse_source(&text)?;
        for warning in diagnostic::duplicate_globals(&program) {
            self.report(warning);
        }
        Ok(codegen::compile(program, options)?)
    }

    fn load(&mut self, path: &Path, is_image: bool, seed: Option<u64>) -> Result<Vec<BigInt>, Error> {
        if is_image {
            let text = fs::read_to_string(path)?;
            return Ok(image::parse(&text)?);
        }
        let options = CompileOptions { seed, ..CompileOptions::default() };
        Ok(self.compile(path, &options)?.assembly.words)
    }

    fn execute(&mut self, command: &Command) -> Result<(), Error> {
        match command {
            Command::Build { file, output, seed, ram_begin } => {
                let options = CompileOptions { seed: *seed, ram_begin: *ram_begin };
                let compiled = self.compile(file, &options)?;
                let text = format!("{}\n", image::render(compiled.words()));
                match output {
                    Some(path) => fs::write(path, text)?,
                    None => io::stdout().write_all(text.as_bytes())?,
                }
            }
            Command::Run { file, image: is_image, seed, inputs } => {
                let words = self.load(file, *is_image, *seed)?;
                let mut machine = Machine::new(&words);
                if inputs.is_empty() {
                    let stdin = io::stdin();
                    let stdout = io::stdout();
                    let mut host = Console::new(stdin.lock(), stdout.lock());
                    machine.run_to_halt(&mut host)?;
                } else {
                    // values written before a fatal error are still printed
                    let mut host = Scripted::new(inputs.iter().cloned());
                    let result = machine.run_to_halt(&mut host);
                    let mut stdout = io::stdout().lock();
                    for value in host.outputs() {
                        writeln!(stdout, "{value}")?;
                    }
                    result?;
                }
            }
            Command::Ast { file, pretty } => {
                let text = self.read(file)?;
                let program = fint::parse_source(&text)?;
                if *pretty {
                    for a in &program.assignments {
                        print!("{}", a.pretty(0));
                    }
                } else {
                    let json = serde_json::to_string_pretty(&program).map_err(io::Error::from)?;
                    println!("{json}");
                }
            }
            Command::Disasm { file, image: is_image, seed } => {
                let listing = if *is_image {
                    let words = self.load(file, true, None)?;
                    disasm::listing(&words, &[])
                } else {
                    let options = CompileOptions { seed: *seed, ..CompileOptions::default() };
                    let compiled = self.compile(file, &options)?;
                    disasm::listing(compiled.words(), &compiled.symbols())
                };
                print!("{listing}");
            }
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut session = Session { json: cli.json, source: None };
    if let Err(err) = session.execute(&cli.command) {
        session.report(Diagnostic::from(&err));
        process::exit(1);
    }
}
