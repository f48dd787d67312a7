mod api;
mod config;
mod pr;
mod render;
mod tree;

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::render::ViewMode;

/// PR Viewer: fetches a GitHub Pull Request with its files and comments
/// and renders the changes as a navigable diff.
#[derive(Parser, Debug)]
#[command(name = "pr-viewer", version, about)]
struct Cli {
    /// PR reference: https://github.com/owner/repo/pull/123, owner/repo/pull/123 or owner/repo#123
    ///
    /// Not required when --mock or --health is used.
    reference: Option<String>,

    /// Diff layout; overrides [view] mode from .pr-viewer.toml
    #[arg(long, value_enum)]
    view: Option<ViewMode>,

    /// Optional output file path for a markdown rendering
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the aggregated PR as a JSON envelope instead of rendering it
    #[arg(long)]
    json: bool,

    /// Print a health check payload and exit
    #[arg(long)]
    health: bool,

    /// Use a built-in mock PR for demo purposes (no network access needed)
    #[arg(long)]
    r#mock: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.health {
        println!("{}", serde_json::to_string_pretty(&api::health())?);
        return Ok(());
    }

    info!("loading configuration");
    let config = config::Config::load()?;

    let aggregated = if cli.r#mock {
        info!("using mock PR data for demo");
        load_mock_pr()?
    } else {
        let reference = cli.reference.as_deref().unwrap_or_default();
        let client = pr::GitHubClient::new(&config);

        if cli.json {
            let span = info_span!("pr_view", reference = %reference);
            let response = api::fetch_envelope(&client, reference).instrument(span).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
            return Ok(());
        }

        if reference.is_empty() {
            return Err("PR reference is required unless --mock is used. Usage: pr-viewer <REFERENCE> or pr-viewer --mock".into());
        }

        let span = info_span!("pr_view", reference = %reference);
        match pr::fetch_aggregated_pr(&client, reference).instrument(span).await {
            Ok(aggregated) => aggregated,
            Err(err) => {
                error!(status = ?err.status(), "{err}");
                if let Some(hint) = err.hint() {
                    error!("{hint}");
                }
                return Err(err.into());
            }
        }
    };

    info!(
        files = aggregated.files.len(),
        comments = aggregated.total_comments(),
        "fetched PR"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&api::ApiResponse::ok(&aggregated))?);
        return Ok(());
    }

    let mode = cli.view.unwrap_or(config.view.mode);
    let view = render::build(&aggregated);
    render::output(&view, mode, cli.output.as_deref())?;
    info!(%mode, "done");

    Ok(())
}

/// Load the embedded sample PR so the whole pipeline runs without GitHub.
fn load_mock_pr() -> Result<pr::AggregatedPR, serde_json::Error> {
    serde_json::from_str(include_str!("../tests/fixtures/mock_pr.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DiffState;
    use crate::tree::FileTreeNode;

    #[test]
    fn test_mock_fixture_loads() {
        let pr = load_mock_pr().unwrap();
        assert_eq!(pr.metadata.pr_number, 42);
        assert_eq!(pr.files.len(), 4);
        assert_eq!(pr.total_comments(), 4);
        let readme = pr.review_comments.iter().find(|c| c.path == "README.md").unwrap();
        assert!(readme.is_outdated());
    }

    #[test]
    fn test_mock_fixture_patches_parse() {
        let pr = load_mock_pr().unwrap();
        let view = render::build(&pr);
        for file_view in &view.files {
            match &file_view.diff {
                DiffState::Parsed(diff) => {
                    assert_eq!(diff.additions(), file_view.file.additions, "{}", file_view.file.filename);
                    assert_eq!(diff.deletions(), file_view.file.deletions, "{}", file_view.file.filename);
                }
                DiffState::NoDiff => assert_eq!(file_view.file.filename, "assets/logo.png"),
                DiffState::Failed(err) => panic!("unexpected parse failure: {err}"),
            }
        }
    }

    #[test]
    fn test_mock_fixture_tree() {
        let pr = load_mock_pr().unwrap();
        let tree = tree::build_tree(&pr.files);
        let top: Vec<&str> = tree.iter().map(FileTreeNode::name).collect();
        assert_eq!(top, vec!["assets", "src", "README.md"]);
    }

    #[test]
    fn test_cli_parses_view_flag() {
        let cli = Cli::try_parse_from(["pr-viewer", "acme/widgets#42", "--view", "split"]).unwrap();
        assert_eq!(cli.reference.as_deref(), Some("acme/widgets#42"));
        assert_eq!(cli.view, Some(ViewMode::Split));
        assert!(!cli.json);
    }

    #[test]
    fn test_cli_rejects_unknown_view() {
        assert!(Cli::try_parse_from(["pr-viewer", "--view", "sideways"]).is_err());
    }
}
