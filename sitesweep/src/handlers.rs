use clap::ArgMatches;
use colored::Colorize;
use sitesweep_core::crawl::{
    CrawlOptions, execute_check, execute_crawl, execute_plan, parse_url_list,
};
use sitesweep_core::report::{ReportFormat, render_crawl, render_page, render_plan, save_report};
use sitesweep_scanner::{AuditConfig, BasicAuth, is_allowed_target, validate_target_url};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

// Helper functions shared by the audit handlers

/// Parse a single line as a target URL, adding https:// if no scheme is given.
/// Lines that fail target validation are skipped.
pub fn parse_url_line(line: &str) -> Option<String> {
    let candidate = if line.contains("://") {
        line.to_string()
    } else {
        format!("https://{}", line)
    };

    if is_allowed_target(&candidate) {
        return Some(candidate);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read URLs file {}: {}", path.display(), e))?;

    let urls: Vec<String> = parse_url_list(&content)
        .iter()
        .filter_map(|line| parse_url_line(line))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// The validated `<URL>` argument.
pub fn target_url(args: &ArgMatches) -> Result<String, String> {
    let raw = args
        .get_one::<String>("URL")
        .ok_or_else(|| "URL is required".to_string())?;
    validate_target_url(raw)
        .map(|url| url.to_string())
        .map_err(|e| e.to_string())
}

pub fn auth_from_args(args: &ArgMatches) -> Option<BasicAuth> {
    match (
        args.get_one::<String>("username"),
        args.get_one::<String>("password"),
    ) {
        (Some(username), Some(password)) => Some(BasicAuth::new(username, password)),
        _ => None,
    }
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

/// Loads the config file and applies command-line overrides on top of it.
pub fn build_config(args: &ArgMatches) -> Result<AuditConfig, String> {
    let path = args
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(crate::commands::DEFAULT_CONFIG_PATH);
    let mut config = AuditConfig::load_from(path).map_err(|e| e.to_string())?;
    debug!("Loaded config from {}", path);

    if flag(args, "no-axe") {
        config.axe_enabled = false;
    }
    if flag(args, "no-lighthouse") {
        config.lighthouse_enabled = false;
    }
    if let Ok(Some(concurrency)) = args.try_get_one::<usize>("concurrency") {
        config.crawl_concurrency = *concurrency;
    }
    if let Some(max_pages) = args.get_one::<usize>("max-pages") {
        config.max_pages = Some(*max_pages);
    }

    Ok(config.sanitized())
}

pub fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn is_quiet(args: &ArgMatches) -> bool {
    flag(args, "quiet")
}

/// Writes the report to `--output` when given, stdout otherwise.
pub fn emit_report(content: &str, args: &ArgMatches) -> Result<(), String> {
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(content, path)
                .map_err(|e| format!("Failed to write report {}: {}", path.display(), e))?;
            if !is_quiet(args) {
                eprintln!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
            Ok(())
        }
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn exit_on_error(result: Result<(), String>) {
    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub async fn run_check(args: &ArgMatches) -> Result<(), String> {
    let url = target_url(args)?;
    let config = build_config(args)?;
    let auth = auth_from_args(args);

    let result = execute_check(&url, auth.as_ref(), config, !is_quiet(args)).await?;
    let report = render_page(&result, report_format(args))?;
    emit_report(&report, args)
}

pub async fn run_plan(args: &ArgMatches) -> Result<(), String> {
    let url = target_url(args)?;
    let config = build_config(args)?;
    let auth = auth_from_args(args);

    let plan = execute_plan(&url, auth.as_ref(), config, !is_quiet(args)).await?;
    let report = render_plan(&plan, report_format(args))?;
    emit_report(&report, args)
}

pub async fn run_crawl(args: &ArgMatches) -> Result<(), String> {
    let start_url = target_url(args)?;
    let config = build_config(args)?;
    let urls = match args.get_one::<PathBuf>("urls-file") {
        Some(path) => Some(load_urls_from_file(path)?),
        None => None,
    };

    let options = CrawlOptions {
        start_url,
        urls,
        auth: auth_from_args(args),
        config,
        show_progress_bars: !is_quiet(args),
    };

    let result = execute_crawl(options, None).await?;
    let report = render_crawl(&result, report_format(args))?;
    emit_report(&report, args)
}

pub async fn handle_check(args: &ArgMatches) {
    exit_on_error(run_check(args).await);
}

pub async fn handle_plan(args: &ArgMatches) {
    exit_on_error(run_plan(args).await);
}

pub async fn handle_crawl(args: &ArgMatches) {
    exit_on_error(run_crawl(args).await);
}
