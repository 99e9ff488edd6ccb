mod commands;
mod terminal;

use commands::CommandLine;
use edgerank_core::hosts::HostsFile;
use edgerank_core::runner;
use rand::SeedableRng;
use rand::rngs::StdRng;
use terminal::{logging, print, progress};

const TOP_ROWS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging();
    print::banner();

    let cfg = commands.build_config()?;

    print::header("measuring candidates");
    let results = runner::run(&cfg, StdRng::from_os_rng(), Some(progress::phase_bar())).await?;

    print::header("results");
    if results.is_empty() {
        print::no_results();
    } else {
        print::results_table(&results, TOP_ROWS);
        print::summary(&results, &cfg.web_hosts);
    }

    let sink = match &commands.hosts_file {
        Some(path) => HostsFile::new(path),
        None => HostsFile::system(),
    };
    runner::pin_best(&results, &cfg.web_hosts, &sink)?;

    print::end_of_program();
    Ok(())
}
