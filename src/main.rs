use anyhow::*;
use anyhow::Context as _;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use log::*;

use funcdef::{
    pretty::Pretty,
    scenarios::{self, Scenario},
    Context, FunctionSummary,
};

#[derive(Parser)]
#[clap(author, version)]
#[clap(about = "Define and validate the functions of a demonstration pipeline")]
pub struct Args {
    #[clap(flatten)]
    verbose: Verbosity,

    #[clap(long = "json", help = "print the function summaries as JSON")]
    json: bool,

    #[clap(
        help = "the pipeline to build: color, histogram, recursive, extern or noise",
        value_parser = parse_scenario
    )]
    scenario: Scenario,
}

fn parse_scenario(s: &str) -> Result<Scenario> {
    Scenario::try_from(s)
}

fn main() -> Result<()> {
    let args = Args::parse();
    buche::new()
        .verbosity(args.verbose.log_level_filter())
        .quiet(args.verbose.is_silent())
        .init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let ctx = Context::new();
    let built = scenarios::build(args.scenario, &ctx)
        .with_context(|| format!("while building {}", args.scenario))?;
    for advisory in built.advisories.iter() {
        info!("advisory: {}", advisory);
    }

    if args.json {
        let summaries = built
            .functions
            .iter()
            .map(|f| f.summary())
            .collect::<Vec<FunctionSummary>>();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for f in built.functions.iter() {
            println!("{}", f.pretty());
        }
    }
    debug!(
        "{} generations issued, {} live functions",
        ctx.issued(),
        built.pipeline.live_functions()
    );
    Ok(())
}
