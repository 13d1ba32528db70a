//! CLI entry point for the offline library.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result, bail};
use clap::Parser;
use offline_library_core::{
    DownloadedFile, FetchSession, LibraryConfig, OfflineLibrary, ResourceSummary, WaitCountdown,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use cli::{Args, BrowseArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_default_file_config()?;
    if let Some(file_config) = &loaded.config {
        file_config.validate().with_context(|| match &loaded.path {
            Some(path) => format!("Invalid config file '{}'", path.display()),
            None => "Invalid config file".to_string(),
        })?;
    }

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > default (info)
    let default_level = resolve_default_log_level(&args, loaded.config.as_ref());
    init_tracing(default_level);

    debug!(?args, "CLI arguments parsed");
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.config.is_some()) {
        debug!(path = %path.display(), "config file loaded");
    }

    let mut config = LibraryConfig::default();
    if let Some(file_config) = &loaded.config {
        file_config.apply_to(&mut config);
    }
    apply_cli_overrides(&args, &mut config);

    let library = OfflineLibrary::new(config)?;
    let use_spinner = !args.quiet && io::stderr().is_terminal();

    match args.command {
        Command::Browse(browse) => run_browse(&library, &browse, use_spinner).await,
        Command::Detail { id } => {
            let countdown = WaitCountdown::new();
            let (handle, stop) = progress::spawn_wait_ui(use_spinner, &countdown);
            let result = library.fetcher().fetch_detail(&id, Some(&countdown)).await;
            progress::stop_wait_ui(handle, &stop).await;
            let detail = result?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(())
        }
        Command::Thumbnail { id, url } => {
            let path = library.thumbnails().get_or_fetch(&id, &url).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Download { id, title } => {
            let countdown = WaitCountdown::new();
            let (handle, stop) = progress::spawn_wait_ui(use_spinner, &countdown);
            let result = library
                .downloads()
                .download_with_countdown(&id, &title, Some(&countdown))
                .await;
            progress::stop_wait_ui(handle, &stop).await;
            let outcome = result?;
            if outcome.reused {
                info!(file = %outcome.file.file_name, "already downloaded");
            }
            println!("{}", outcome.file.path.display());
            Ok(())
        }
        Command::List { json } => {
            let files = library.downloads().list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!("{}", format_download_line(file));
                }
            }
            Ok(())
        }
        Command::Delete { file_name } => {
            if library.downloads().delete(&file_name).await? {
                info!(file = %file_name, "deleted");
            } else {
                warn!(file = %file_name, "nothing to delete");
            }
            Ok(())
        }
        Command::Open { file_name } => {
            let file = library.downloads().open(&file_name).await?;
            debug!(path = %file.path.display(), mime = %file.mime, "opened");
            Ok(())
        }
    }
}

async fn run_browse(library: &OfflineLibrary, browse: &BrowseArgs, use_spinner: bool) -> Result<()> {
    let mut session: FetchSession = library.session();
    let countdown = session.state().countdown().clone();
    let (handle, stop) = progress::spawn_wait_ui(use_spinner, &countdown);

    session.fetch_page(browse.query(), browse.offset, false).await;
    for _ in 1..browse.pages {
        if session.state().last_error().is_some() || session.load_more().await.is_none() {
            break;
        }
    }
    progress::stop_wait_ui(handle, &stop).await;

    let state = session.state();
    if let Some(error) = state.last_error() {
        if state.items().is_empty() {
            bail!("catalog request failed: {error}");
        }
        warn!(error = %error, loaded = state.items().len(), "stopped early");
    }
    if state.overlap_count() > 0 {
        warn!(overlaps = state.overlap_count(), "pages repeated some items");
    }

    if browse.json {
        println!("{}", serde_json::to_string_pretty(state.items())?);
    } else {
        for item in state.items() {
            println!("{}", format_summary_line(item));
        }
    }
    info!(items = state.items().len(), "browse complete");
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn resolve_default_log_level(args: &Args, file: Option<&app_config::FileConfig>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file
            .and_then(|cfg| cfg.verbosity)
            .map_or("info", app_config::VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}

fn apply_cli_overrides(args: &Args, config: &mut LibraryConfig) {
    if let Some(dir) = &args.cache_dir {
        config.cache_root.clone_from(dir);
    }
    if let Some(url) = &args.api_url {
        config.api_base_url.clone_from(url);
    }
    if let Some(language) = &args.language {
        config.language.clone_from(language);
    }
}

fn format_summary_line(item: &ResourceSummary) -> String {
    format!("{}\t{}", item.id, item.title)
}

fn format_download_line(file: &DownloadedFile) -> String {
    let marker = if file.metadata_missing { " (no metadata)" } else { "" };
    format!(
        "{}\t{}\t{}\t{}{}",
        file.file_name,
        file.size,
        file.downloaded_at.format("%Y-%m-%d %H:%M"),
        file.title,
        marker
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_log_level_quiet_wins() {
        let args = parse(&["offline-library", "-q", "-vv", "list"]);
        assert_eq!(resolve_default_log_level(&args, None), "error");
    }

    #[test]
    fn test_log_level_cli_verbose_beats_file() {
        let file = app_config::FileConfig {
            verbosity: Some(app_config::VerbositySetting::Quiet),
            ..Default::default()
        };
        let args = parse(&["offline-library", "-v", "list"]);
        assert_eq!(resolve_default_log_level(&args, Some(&file)), "debug");

        let args = parse(&["offline-library", "list"]);
        assert_eq!(resolve_default_log_level(&args, Some(&file)), "error");
        assert_eq!(resolve_default_log_level(&args, None), "info");
    }

    #[test]
    fn test_cli_overrides_replace_config() {
        let args = parse(&[
            "offline-library",
            "--cache-dir",
            "/tmp/lib",
            "--language",
            "fa",
            "list",
        ]);
        let mut config = LibraryConfig::default();
        apply_cli_overrides(&args, &mut config);
        assert_eq!(config.cache_root, PathBuf::from("/tmp/lib"));
        assert_eq!(config.language, "fa");
        assert_eq!(config.api_base_url, LibraryConfig::default().api_base_url);
    }

    #[test]
    fn test_format_summary_line() {
        let item: ResourceSummary =
            serde_json::from_value(serde_json::json!({"id": 7, "title": "Algebra"})).unwrap();
        assert_eq!(format_summary_line(&item), "7\tAlgebra");
    }
}
