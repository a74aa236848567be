use anyhow::Result;
use clap::Parser;

use imrank::Opts;
use imrank::cli::SubCommandExtend;
use imrank::config::SubCommand;

fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Sync(config) => config.run(&opts),
        SubCommand::Search(config) => config.run(&opts),
        SubCommand::Show(config) => config.run(&opts),
        SubCommand::Check(config) => config.run(&opts),
        SubCommand::Clean(config) => config.run(&opts),
    }
}
