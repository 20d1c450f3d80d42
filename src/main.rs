use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, miette, IntoDiagnostic, Result};

use lc3sim::debugger::SourceMode;
use lc3sim::device::{self, Console};
use lc3sim::output::Output;
use lc3sim::{env, error, os};
use lc3sim::{Assembly, Image, Simulator};

/// Simulator and two-pass assembler for the LC-3 educational computer.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` or `.bin` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Create binary `.bin` image to run later
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination of the image, defaults to the source with a `.bin` extension
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or writing an image
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Run text `.asm` or binary `.bin` file until the machine halts
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Control the simulator with line-mode commands
    Debug {
        /// `.asm` or `.bin` file to load first
        name: Option<PathBuf>,
        /// Read debugger commands from argument, separated by newline or `;`
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(lc3sim::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, false);
        }
        println!("\n~ lc3sim v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Assemble { name, dest } => {
            file_message(Green, "Assembling", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let image = assemble(&name, &src)?;

            let dest = dest.unwrap_or_else(|| name.with_extension("bin"));
            image
                .write(&dest)
                .map_err(|error| miette!("Could not write `{}`: {}", dest.display(), error))?;

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &dest);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            assemble(&name, &src)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Run { name, minimal } => run(&name, minimal),
        Command::Debug {
            name,
            command,
            minimal,
        } => debug(name.as_deref(), command, minimal),
        Command::Watch { name } => watch(name),
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

/// Progress line on stderr, so that stdout carries only program output.
fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    eprintln!("{left:>12} {right}");
}

/// Print every diagnostic, failing if any is an error.
fn report(name: &Path, src: &str, assembly: &Assembly) -> Result<()> {
    for diag in &assembly.diagnostics {
        eprintln!("{:?}", diag.report(src));
    }
    if !assembly.is_ok() {
        return Err(error::assembly_failed(name, assembly.errors().count()));
    }
    Ok(())
}

/// Assemble source text into an image, reporting diagnostics.
fn assemble(name: &Path, src: &str) -> Result<Image> {
    let assembly = lc3sim::assemble(src);
    report(name, src, &assembly)?;
    match assembly.image {
        Some(image) => Ok(image),
        None => Err(error::assembly_failed(name, 0)),
    }
}

/// Image installed on power-on and every reset, as configured by the environment.
fn system_image() -> Result<Option<Image>> {
    if !env::is_os_enabled() {
        return Ok(None);
    }
    match env::os_image() {
        Some(path) => Image::read(&path)
            .map(Some)
            .map_err(|error| error::load_image(&path, &error)),
        None => os::system_image().map(Some),
    }
}

fn simulator(stdin_reserved: bool) -> Result<Simulator<Box<dyn Console>>> {
    let sim = Simulator::new(device::stdio_console(stdin_reserved));
    Ok(match system_image()? {
        Some(image) => sim.with_system_image(image),
        None => sim,
    })
}

/// Install a `.asm` or `.bin` program. Labels of assembled programs are kept for commands.
fn load_program<C: Console>(sim: &mut Simulator<C>, name: &Path) -> Result<()> {
    match name.extension().and_then(OsStr::to_str) {
        Some("asm") => {
            file_message(MsgColor::Green, "Assembling", name);
            let src = fs::read_to_string(name).into_diagnostic()?;
            let assembly = sim.load_source(&src);
            // Diagnostics are reported below with their source lines
            sim.take_messages();
            report(name, &src, &assembly)?;
        }
        Some("bin") => {
            file_message(MsgColor::Green, "Loading", name);
            let image = Image::read(name).map_err(|error| error::load_image(name, &error))?;
            if !sim.load(&image) {
                sim.print_messages();
                bail!("Could not load `{}`", name.display());
            }
            sim.take_messages();
        }
        _ => return Err(error::unknown_extension(name)),
    }
    Ok(())
}

fn run(name: &Path, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    let mut sim = simulator(false)?;
    sim.print_messages();
    load_program(&mut sim, name)?;

    message(MsgColor::Green, "Running", "loaded program");
    sim.run();
    sim.print_messages();

    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn debug(name: Option<&Path>, command: Option<String>, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    let mut source = SourceMode::from(command);
    let mut sim = simulator(source.is_piped())?;
    sim.print_messages();
    if let Some(name) = name {
        load_program(&mut sim, name)?;
    }
    sim.interact(&mut source);
    Ok(())
}

fn watch(name: PathBuf) -> Result<()> {
    use MsgColor::*;
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(Green, "Watching", &name);
    message(Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                // Clear screen
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Green, "Re-checking", "file change detected");
                message(Cyan, "Help", "press CTRL+C to exit");

                // Makes reruns more obvious
                sleep(Duration::from_millis(50));

                let src = match fs::read_to_string(&name) {
                    Ok(src) => src,
                    Err(e) => {
                        eprintln!("{e}. Exiting...");
                        std::process::exit(1)
                    }
                };
                match assemble(&name, &src) {
                    Ok(_) => message(Green, "Success", "no errors found!"),
                    Err(e) => eprintln!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

const SHORT_INFO: &str = r"
A simulator and two-pass assembler for the LC-3 educational computer.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
