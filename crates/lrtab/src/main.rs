use anyhow::Context as _;
use clap::Parser;
use lrtab::{
    automaton,
    codegen::Codegen,
    grammar::Grammar,
    report::Reporter,
    table::ParseTable,
};
use std::{fs, path::PathBuf, time::Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// The head symbol used as the grammar's start symbol.
    #[arg(long, default_value = "program")]
    start: String,

    /// Upper bound on the number of automaton states.
    #[arg(long, default_value_t = automaton::Config::default().max_states)]
    max_states: usize,

    /// Specify the path of generated .rs file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The path of grammar definition file.
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    process_file(&args)
        .with_context(|| anyhow::anyhow!("errored during processing {}", args.input.display()))?;

    Ok(())
}

struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn orphan_line(&mut self, line: usize, text: &str) {
        println!(
            "[warning] line {}: production body before any head declaration, skipped: {:?}",
            line, text
        );
    }

    fn pass_completed(&mut self, pass: usize, states: usize) {
        tracing::debug!("pass {} completed, {} states so far", pass, states);
    }
}

fn process_file(args: &Args) -> anyhow::Result<()> {
    let in_file = fs::canonicalize(&args.input) //
        .context("failed to canonicalize the input file name")?;

    let out_file = args
        .output
        .clone()
        .unwrap_or_else(|| in_file.with_extension("rs"));
    let backup_file = out_file.with_extension("rs.bak");

    let source = fs::read_to_string(&in_file)
        .with_context(|| anyhow::anyhow!("failed to read {}", in_file.display()))?;

    let mut reporter = ConsoleReporter;

    let s = Instant::now();
    let grammar = Grammar::parse(&source, &args.start, &mut reporter)?;
    tracing::info!("parse: {:?} elapsed", s.elapsed());
    tracing::debug!("grammar:\n{}", grammar);

    let mut empty_heads = vec![];
    for head in grammar.heads() {
        if grammar.productions_of(head).is_empty() {
            empty_heads.push(grammar.symbol_name(head));
        }
    }
    if !empty_heads.is_empty() {
        println!(
            "[warning] The following heads have no associated production: {:?}",
            empty_heads
        );
    }

    let config = automaton::Config {
        max_states: args.max_states,
    };
    let s = Instant::now();
    let automaton = automaton::construct(&grammar, &config, &mut reporter)?;
    tracing::info!("construct: {:?} elapsed", s.elapsed());
    tracing::debug!("automaton:\n{}", automaton.display(&grammar));

    let s = Instant::now();
    let table = ParseTable::build(&grammar, &automaton);
    tracing::info!("build_table: {:?} elapsed", s.elapsed());
    tracing::debug!("table:\n{}", table.display(&grammar));

    // no partial artifact on failure: render fully before touching the
    // output path
    let generated = Codegen::new(&grammar, &table)?.to_string();

    if out_file.exists() {
        fs::copy(&out_file, &backup_file).with_context(|| {
            anyhow::anyhow!(
                "failed to backup the output file to {}",
                backup_file.display()
            )
        })?;
    }
    fs::write(&out_file, generated).with_context(|| {
        anyhow::anyhow!("failed to write generated table to {}", out_file.display())
    })?;

    println!("{}", table.statistics(&grammar));

    Ok(())
}
