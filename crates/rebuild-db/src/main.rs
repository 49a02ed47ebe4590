// TODO: Add rustdoc to all public items (tracked as tech debt)
#![allow(missing_docs)]

use std::process::ExitCode;

use clap::Parser;
use rebuild_db::{logging, rebuild, Cancelled, Cli, Interrupt, Layout, Options, StdinPrompt};
use tracing::{error, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = Options::from(&cli);
    let layout = Layout::new(rebuild_db::config::volume_root(cli.nochdir));

    let log_file = (!cli.nolog).then(|| layout.log_file(cli.logfile.as_deref()));
    logging::init(log_file.as_deref());

    if options.dump {
        return match rebuild::dump(&layout, std::io::stdout().lock()) {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("{err:#}");
                ExitCode::FAILURE
            }
        };
    }

    let interrupt = Interrupt::install().unwrap_or_else(|err| {
        warn!(%err, "cannot install the Ctrl-C handler");
        Interrupt::new()
    });

    match rebuild::run(
        &layout,
        &options,
        &mut StdinPrompt,
        &mut rand::thread_rng(),
        &interrupt,
    ) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) if err.is::<Cancelled>() => {
            warn!("you decided to cancel processing; this is OK, but please note that");
            warn!("the iPod database is now corrupt and the iPod won't play!");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
