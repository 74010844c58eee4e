pub mod crawl;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    let banner = format!(
        "{} {}\n{}\n",
        "sitesweep".bold().cyan(),
        env!("CARGO_PKG_VERSION").dimmed(),
        "headings · images · links · meta · structure · a11y · performance".dimmed()
    );
    eprintln!("{}", banner);
}
