use crate::CLAP_STYLING;
use clap::{Arg, arg, command};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/sitesweep/config.json";

/// Arguments shared by every audit subcommand.
fn audit_args() -> Vec<Arg> {
    vec![
        arg!(<URL>)
            .required(true)
            .help("The https:// URL to audit"),
        arg!(--"username" <USERNAME>)
            .required(false)
            .help("Basic Auth username for protected sites")
            .requires("password"),
        arg!(--"password" <PASSWORD>)
            .required(false)
            .help("Basic Auth password for protected sites")
            .requires("username"),
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("Path to a JSON config file")
            .default_value(DEFAULT_CONFIG_PATH),
        arg!(--"max-pages" <NUM>)
            .required(false)
            .help("Stop link discovery after this many pages")
            .value_parser(clap::value_parser!(usize)),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, markdown, csv")
            .value_parser(["text", "json", "markdown", "md", "csv"])
            .default_value("text"),
    ]
}

/// Switches for the optional page auditors.
fn auditor_args() -> Vec<Arg> {
    vec![
        arg!(--"no-axe")
            .required(false)
            .help("Skip the axe-core accessibility audit")
            .action(clap::ArgAction::SetTrue),
        arg!(--"no-lighthouse")
            .required(false)
            .help("Skip Lighthouse and use the in-browser performance fallback")
            .action(clap::ArgAction::SetTrue),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitesweep")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitesweep")
        .about("Audits websites for SEO, accessibility, structure and performance problems")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and non-essential output")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("check")
                .about("Analyze a single page")
                .args(audit_args())
                .args(auditor_args()),
        )
        .subcommand(
            command!("plan")
                .about("Discover the pages a crawl would visit, without analyzing them")
                .args(audit_args()),
        )
        .subcommand(
            command!("crawl")
                .about("Discover and analyze every page of a site")
                .args(audit_args())
                .args(auditor_args())
                .arg(
                    arg!(-t --"concurrency" <NUM>)
                        .required(false)
                        .help("Number of pages analyzed at once (default: from config, 3)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-U --"urls-file" <PATH>)
                        .required(false)
                        .help("Newline-delimited file of URLs to analyze instead of discovering them")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_arguments() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "sitesweep",
                "crawl",
                "https://example.com",
                "--concurrency",
                "5",
                "--no-axe",
                "-f",
                "json",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "crawl");
        assert_eq!(sub.get_one::<String>("URL").unwrap(), "https://example.com");
        assert_eq!(sub.get_one::<usize>("concurrency"), Some(&5));
        assert!(sub.get_flag("no-axe"));
        assert!(!sub.get_flag("no-lighthouse"));
        assert_eq!(sub.get_one::<String>("format").unwrap(), "json");
        assert_eq!(sub.get_one::<String>("config").unwrap(), DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_password_requires_username() {
        let result = command_argument_builder().try_get_matches_from([
            "sitesweep",
            "check",
            "https://example.com",
            "--password",
            "secret",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_has_no_auditor_switches() {
        let result = command_argument_builder().try_get_matches_from([
            "sitesweep",
            "plan",
            "https://example.com",
            "--no-axe",
        ]);
        assert!(result.is_err());
    }
}
