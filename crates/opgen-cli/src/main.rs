use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use opgen::{CombineOptions, Combiner};

mod parser;
mod render;

#[derive(Parser)]
#[command(name = "opgen")]
#[command(about = "Pattern grammar generator for disassembled instruction sets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Generate {
        #[arg(help = "Newline-delimited listing of opcodes and instruction text")]
        input: PathBuf,

        #[arg(short, long, help = "Output grammar file (defaults to <input>.pat)")]
        output: Option<PathBuf>,

        #[arg(
            short = 't',
            long,
            help = "Worker thread count (defaults to the physical core count)"
        )]
        num_threads: Option<usize>,

        #[arg(
            short = 'n',
            long,
            default_value = "MyProc",
            help = "Processor name recorded in the grammar header"
        )]
        processor_name: String,

        #[arg(
            short,
            long,
            default_value = "big",
            help = "Endianness of the instruction set, big or little"
        )]
        endian: String,

        #[arg(
            long,
            help = "Extra register names the classifier should recognize"
        )]
        additional_registers: Vec<String>,

        #[arg(long, help = "Emit the parsed set without combining (debugging aid)")]
        skip_combining: bool,

        #[arg(long, help = "Parse, list the classified registers, and exit")]
        print_registers_only: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            num_threads,
            processor_name,
            endian,
            additional_registers,
            skip_combining,
            print_registers_only,
        } => generate(&GenerateArgs {
            input,
            output,
            num_threads,
            processor_name,
            endian,
            additional_registers,
            skip_combining,
            print_registers_only,
        }),
    }
}

struct GenerateArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    num_threads: Option<usize>,
    processor_name: String,
    endian: String,
    additional_registers: Vec<String>,
    skip_combining: bool,
    print_registers_only: bool,
}

fn generate(args: &GenerateArgs) -> Result<()> {
    if args.endian != "big" && args.endian != "little" {
        bail!("endianness must be either big or little, got {:?}", args.endian);
    }

    if args.num_threads == Some(0) {
        bail!("--num-threads cannot be 0");
    }

    let mut registers = parser::RegisterTable::with_defaults();
    registers.add_all(&args.additional_registers);

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut set = parser::parse_listing(&text, &registers)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    tracing::info!(
        instructions = set.parsed().len(),
        max_opcode_bits = set.max_opcode_bits(),
        "parsed listing"
    );

    if args.print_registers_only {
        for register in set.registers() {
            println!("{register}");
        }
        return Ok(());
    }

    if args.skip_combining {
        set.seed_patterns();
    } else {
        let mut options = CombineOptions::default();
        if let Some(workers) = args.num_threads {
            options.workers = workers;
        }

        let combiner = Combiner::new(&options)?;
        let stats = combiner.run(&mut set);
        tracing::info!(
            passes = stats.passes,
            merges = stats.merges,
            patterns = set.patterns().len(),
            "combining finished"
        );
    }

    let grammar = render::render(&mut set, &args.processor_name, &args.endian)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("pat"));
    fs::write(&output, &grammar)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Generated {} ({} patterns from {} instructions)",
        output.display(),
        set.patterns().len(),
        set.parsed().len()
    );

    Ok(())
}
