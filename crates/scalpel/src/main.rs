use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use scalpel::config::Config;
use scalpel::criterion::SlicingCriterion;
use scalpel::orchestrator::SliceOrchestrator;

/// Interprocedural static program slicer based on system dependence graphs.
#[derive(Debug, Parser)]
#[command(name = "scalpel", version, about)]
struct Args {
    /// Slicing criterion: file#line[:var1,var2,...[!occ1,occ2,...]]
    #[arg(short = 'c', long = "criterion", value_name = "file#line[:vars[!occs]]")]
    criterion: String,

    /// Directories searched for methods called from the criterion (directly
    /// or transitively). May be repeated or comma-separated.
    #[arg(short = 'i', long = "include", value_name = "DIR", value_delimiter = ',')]
    include: Vec<PathBuf>,

    /// Directory the sliced source code is written to.
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Enable exception-sensitive analysis.
    #[arg(long = "exception-sensitive")]
    exception_sensitive: bool,

    /// Write a Graphviz rendering of the sliced SDG to FILE.
    #[arg(long = "dump-graph", value_name = "FILE")]
    dump_graph: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Validate the criterion string before touching anything else; a parse
    // failure must abort with no partial output.
    let criterion: SlicingCriterion = args.criterion.parse()?;

    let mut config = Config::load()?;
    config.include.extend(args.include);
    if args.output.is_some() {
        config.output = args.output;
    }
    config.exception_sensitive |= args.exception_sensitive;

    let outcome = SliceOrchestrator::new(config).run(&criterion, args.dump_graph.as_deref())?;
    println!(
        "slice of {criterion}: {} of {} nodes, {} file(s) written",
        outcome.slice_nodes,
        outcome.graph_nodes,
        outcome.written.len()
    );
    for path in &outcome.written {
        println!("  {}", path.display());
    }
    Ok(())
}
