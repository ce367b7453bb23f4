mod opt;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use mapred::orchestrator::OrchestratorBuilder;

use crate::opt::Opt;

fn main() {
    if let Err(err) = run_main() {
        eprintln!("ERROR: {err:#}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<()> {
    let opt = Opt::parse();
    let env = Env::default().filter_or("MAPRED_LOG", "info");
    env_logger::init_from_env(env);

    debug!("settings: {opt:?}");

    let orchestrator = OrchestratorBuilder::default().build()?;
    let final_root = orchestrator.run(&opt.input_directory)?;
    info!(
        "All final output has been written to {}",
        final_root.display()
    );
    Ok(())
}
