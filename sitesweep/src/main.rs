use clap::ArgMatches;
use sitesweep::commands::command_argument_builder;
use sitesweep::handlers::{handle_check, handle_crawl, handle_plan};
use sitesweep_core::print_banner;
use tracing::Level;

/// Reads a global flag from the top level or from the chosen subcommand.
fn global_flag(matches: &ArgMatches, id: &str) -> bool {
    matches.get_flag(id)
        || matches
            .subcommand()
            .is_some_and(|(_, sub)| sub.get_flag(id))
}

fn init_logging(matches: &ArgMatches) {
    let level = if global_flag(matches, "verbose") {
        Level::DEBUG
    } else if global_flag(matches, "quiet") {
        Level::WARN
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    // Show banner unless --quiet flag is set
    if !global_flag(&chosen_command, "quiet") {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_logging(&chosen_command);

    match chosen_command.subcommand() {
        Some(("check", primary_command)) => handle_check(primary_command).await,
        Some(("plan", primary_command)) => handle_plan(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
