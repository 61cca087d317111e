use clap::{Parser, Subcommand};
use pagemill::engine::{self, BuildOptions};
use pagemill::render::PandocRenderer;
use pagemill::repo::GitRepository;
use pagemill::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup; trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pagemill")]
#[command(about = "Incremental static site builder driven by a git repository")]
#[command(long_about = "\
Incremental static site builder driven by a git repository

Content lives in a git repository. pagemill diffs the tree against the last
built revision, compiles changed documents through pandoc, removes outputs
of deleted entries, and regenerates per-directory listing pages that went
stale. The last built revision is recorded only after a clean pass, so an
aborted build retries the same changes next run.

Layout (configurable in pagemill.toml):

  content/            # git repository with the source tree
  ├── theme.html      # pandoc template, wraps every rendered document
  ├── essays/
  │   ├── one.md      # compiled to dist/essays/one.html
  │   └── index.md    # explicit index: pagemill won't generate one here
  └── css/site.css    # copied verbatim (after $KEY substitution)
  dist/               # published output tree
  .pagemill/          # staging area + current_rev marker

Metadata resolution for listings (first available wins):
  Title:    first line of the document → path in backticks
  Created:  Date: directive → date in the title → first commit
  Updated:  always the latest commit

Run 'pagemill gen-config' to print a documented pagemill.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "pagemill.toml", global = true)]
    conf: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site: apply changes since the last built revision
    Build {
        /// Recompile the full tree, ignoring the last built revision
        #[arg(long)]
        full: bool,
        /// Explicit baseline revision (overrides the stored marker)
        #[arg(long)]
        from: Option<String>,
        /// Explicit target revision (defaults to HEAD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show the pending changeset without building
    Status,
    /// Print a stock pagemill.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build { full, from, to } => {
            let config = config::SiteConfig::load(&cli.conf)?;
            let repo = GitRepository::new(&config.paths.repository);
            let renderer = PandocRenderer::default();
            let options = BuildOptions {
                incremental: !full,
                from_rev: from,
                to_rev: to,
            };
            let stats = engine::run_build(&repo, &renderer, &config, &options)?;
            output::print_build_report(&stats);
        }
        Command::Status => {
            let config = config::SiteConfig::load(&cli.conf)?;
            let repo = GitRepository::new(&config.paths.repository);
            let options = BuildOptions {
                incremental: true,
                ..BuildOptions::default()
            };
            let (changes, _tree, _target) = engine::plan(&repo, &config, &options)?;
            output::print_changeset(&changes);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
