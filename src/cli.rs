// Command-line front end for rspatch.
//
// Subcommands: `patch` applies a delta, `dump` lists its instructions,
// `config` prints build details.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::{LevelFilter, info};

use crate::delta::copy::DEFAULT_BUFFER_SIZE;
use crate::delta::{DELTA_MAGIC, Instruction, InstructionReader, Opcode, PatchOptions, Patcher};
use crate::io::check_output_distinct;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024;

/// Largest accepted `--buffer-size`.
const MAX_BUFFER_SIZE: u64 = 1 << 26; // 64 MiB

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_buffer_size(s: &str) -> Result<usize, String> {
    let n = parse_byte_size(s)?;
    if n == 0 || n > MAX_BUFFER_SIZE {
        return Err(format!("buffer size must be between 1 and {MAX_BUFFER_SIZE}"));
    }
    usize::try_from(n).map_err(|e| e.to_string())
}

/// Accepts `0x`-prefixed or bare hexadecimal.
fn parse_magic(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(&digits.replace('_', ""), 16).map_err(|e| format!("invalid magic '{s}': {e}"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rdiff-style delta patcher.
#[derive(Parser, Debug)]
#[command(
    name = "rspatch",
    version,
    about = "Apply rdiff-style binary deltas",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Rebuild new data from a target file and a delta.
    Patch(PatchArgs),
    /// List the instructions of a delta.
    Dump(DumpArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Expected stream magic (hex).
    #[arg(long, value_parser = parse_magic, default_value = "0x72730236")]
    magic: u32,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Target (original) file copied from.
    #[arg(long, short = 't', value_hint = ValueHint::FilePath)]
    target: PathBuf,

    /// Input delta file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Check only (apply the delta but discard the output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Copy buffer size (supports K/M/G suffix).
    #[arg(long = "buffer-size", value_parser = parse_buffer_size, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    #[command(flatten)]
    format: FormatArgs,

    /// Input delta file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DumpArgs {
    #[command(flatten)]
    format: FormatArgs,

    /// Delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Patch,
    Dump,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    magic: u32,
    buffer_size: usize,
    target_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

impl Options {
    fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            magic: self.magic,
            buffer_size: self.buffer_size,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        no_output: false,
        magic: DELTA_MAGIC,
        buffer_size: DEFAULT_BUFFER_SIZE,
        target_file: None,
        input_file: None,
        output_file: None,
        json_output: cli.json_output,
    };

    match cli.command {
        Cmd::Patch(args) => Options {
            command: Command::Patch,
            use_stdout: args.stdout,
            no_output: args.no_output,
            magic: args.format.magic,
            buffer_size: args.buffer_size,
            target_file: Some(args.target),
            input_file: args.input.or(args.input_pos),
            output_file: args.output.or(args.output_pos),
            ..base
        },
        Cmd::Dump(args) => Options {
            command: Command::Dump,
            magic: args.format.magic,
            input_file: args.input,
            ..base
        },
        Cmd::Config => base,
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("rspatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn open_input(path: Option<&PathBuf>) -> io::Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::with_capacity(BUF_SIZE, File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("rspatch version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DELTA_MAGIC={DELTA_MAGIC:#010x}");
    eprintln!("DEFAULT_BUFFER_SIZE={DEFAULT_BUFFER_SIZE}");
    eprintln!("MAX_BUFFER_SIZE={MAX_BUFFER_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options) -> i32 {
    let Some(target_path) = opts.target_file.as_ref() else {
        eprintln!("rspatch: patch requires --target");
        return 1;
    };
    let target = match File::open(target_path) {
        Ok(f) => BufReader::with_capacity(BUF_SIZE, f),
        Err(e) => {
            eprintln!("rspatch: target file: {}: {e}", target_path.display());
            return 1;
        }
    };

    let delta_reader = match open_input(opts.input_file.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            let name = opts.input_file.as_ref().map(|p| p.display().to_string());
            eprintln!("rspatch: input file: {}: {e}", name.unwrap_or_default());
            return 1;
        }
    };

    let mut output_writer: Box<dyn Write> = match (&opts.output_file, opts.no_output) {
        (_, true) => Box::new(io::sink()),
        (Some(path), false) if !opts.use_stdout => {
            if let Err(e) =
                check_output_distinct(path, target_path, opts.input_file.as_deref())
            {
                eprintln!("rspatch: {e}");
                return 1;
            }
            if path.exists() && !opts.force {
                eprintln!(
                    "rspatch: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return 1;
            }
            match File::create(path) {
                Ok(f) => Box::new(BufWriter::with_capacity(BUF_SIZE, f)),
                Err(e) => {
                    eprintln!("rspatch: output file: {}: {e}", path.display());
                    return 1;
                }
            }
        }
        _ => Box::new(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock())),
    };

    let mut patcher =
        Patcher::with_options(delta_reader, target, &mut output_writer, opts.patch_options());
    let result = patcher.run();
    drop(patcher);

    match result {
        Ok(stats) => {
            if let Err(e) = output_writer.flush() {
                eprintln!("rspatch: write flush error: {e}");
                return 1;
            }
            info!(
                "patch: output size: {}, copies: {}, literals: {}",
                stats.output_bytes(),
                stats.copy_commands,
                stats.literal_commands
            );
            if opts.json_output {
                let json = serde_json::json!({
                    "command": "patch",
                    "output_size": stats.output_bytes(),
                    "commands": stats.commands,
                    "copy_commands": stats.copy_commands,
                    "literal_commands": stats.literal_commands,
                    "copied_bytes": stats.copied_bytes,
                    "literal_bytes": stats.literal_bytes,
                });
                eprintln!("{json:#}");
            }
            0
        }
        Err(e) => {
            let _ = output_writer.flush();
            eprintln!("rspatch: patch error: {e}");
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Dump command
// ---------------------------------------------------------------------------

fn describe(opcode: Opcode) -> String {
    match opcode {
        Opcode::Literal { length } => format!("LITERAL_N{}", length.bytes()),
        Opcode::Copy { offset, length } => {
            format!("COPY_N{}_N{}", offset.bytes(), length.bytes())
        }
    }
}

fn cmd_dump(opts: &Options) -> i32 {
    let reader = match open_input(opts.input_file.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            let name = opts.input_file.as_ref().map(|p| p.display().to_string());
            eprintln!("rspatch: input file: {}: {e}", name.unwrap_or_default());
            return 1;
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut commands = 0u64;
    let mut output_size = 0u64;

    let mut reader = InstructionReader::with_magic(reader, opts.magic);
    loop {
        let cmd = match reader.next_command() {
            Ok(Some(cmd)) => cmd,
            Ok(None) => break,
            Err(e) => {
                let _ = out.flush();
                eprintln!("rspatch: dump error at delta offset {}: {e}", reader.position());
                return 1;
            }
        };
        let line = match cmd.instruction {
            Instruction::Copy { offset, length } => format!(
                "{:>10}  {:#04x} {:<14} where={offset} length={length}",
                cmd.position,
                cmd.opcode.byte(),
                describe(cmd.opcode)
            ),
            Instruction::Literal { length } => format!(
                "{:>10}  {:#04x} {:<14} length={length}",
                cmd.position,
                cmd.opcode.byte(),
                describe(cmd.opcode)
            ),
        };
        if let Err(e) = writeln!(out, "{line}") {
            eprintln!("rspatch: write error: {e}");
            return 1;
        }
        commands += 1;
        output_size += cmd.instruction.output_len();
    }

    if let Err(e) = out.flush() {
        eprintln!("rspatch: write flush error: {e}");
        return 1;
    }
    if !opts.quiet {
        eprintln!("rspatch: {commands} commands, output size {output_size}");
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "dump",
            "commands": commands,
            "output_size": output_size,
            "delta_size": reader.position(),
        });
        eprintln!("{json:#}");
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_level(opts: &Options) -> LevelFilter {
    if opts.quiet {
        return LevelFilter::Error;
    }
    match opts.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Trace,
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if opts.quiet || opts.verbose > 0 {
        logger.filter_level(log_level(&opts));
    }
    logger.format_timestamp(None).format_target(false).init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && !opts.quiet
        && let Some(path) = opts.output_file.take()
    {
        eprintln!(
            "rspatch: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Patch => cmd_patch(&opts),
        Command::Dump => cmd_dump(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
