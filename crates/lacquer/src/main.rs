//! Lacquer CLI - static-theme build pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lacquer_pipeline::{Config, TaskName, TaskSet};
use lacquer_server::ReloadHub;

#[derive(Parser)]
#[command(name = "lacquer")]
#[command(about = "Static-theme build pipeline with live-reloading dev server")]
#[command(version)]
pub struct Cli {
    /// Task to run: twig, sass, vendor, svg, images, js, fonts, clean,
    /// build, watch, serve, or default
    #[arg(default_value = "default")]
    task: String,

    /// Production build: minified styles, no source maps
    #[arg(long)]
    production: bool,

    /// Packaging mode: run pipelines without writing to dist
    #[arg(long)]
    pack: bool,

    /// Theme name; anything other than "default" imports a theme partial
    #[arg(long)]
    theme: Option<String>,

    /// Text direction for styling (ltr or rtl)
    #[arg(long)]
    direction: Option<String>,

    /// Path to lacquer.toml config file
    #[arg(short, long, default_value = "lacquer.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, mut config: Config) -> Config {
        if self.production {
            config.production = true;
        }
        if self.pack {
            config.pack = true;
        }
        if let Some(theme) = &self.theme {
            config.theme = theme.clone();
        }
        if let Some(direction) = &self.direction {
            config.direction = Some(direction.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let task: TaskName = cli.task.parse()?;

    let config = cli.apply(Config::load(&cli.config)?);
    let tasks = TaskSet::new(config)?;

    match task {
        TaskName::Class(class) => {
            let assets = tasks.run_class(class).await?;
            tracing::info!("{}: {} files", class.name(), assets.len());
        }
        TaskName::Clean => {
            tasks.clean().await?;
            tracing::info!("Cleaned {}", tasks.config().dist_dir.display());
        }
        TaskName::Build | TaskName::Default => {
            tasks.build().await?;
        }
        TaskName::Watch => {
            lacquer_server::watch(tasks, ReloadHub::new(), false).await?;
        }
        TaskName::Serve => {
            lacquer_server::serve(tasks, ReloadHub::new()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence_over_file_values() {
        let cli = Cli::parse_from([
            "lacquer",
            "build",
            "--production",
            "--theme",
            "dark",
            "--direction",
            "rtl",
        ]);

        let config = cli.apply(Config::default());

        assert!(config.production);
        assert!(!config.pack);
        assert_eq!(config.theme, "dark");
        assert_eq!(config.direction.as_deref(), Some("rtl"));
    }

    #[test]
    fn task_defaults_to_default() {
        let cli = Cli::parse_from(["lacquer"]);

        assert_eq!(cli.task.parse::<TaskName>().unwrap(), TaskName::Default);
    }

    #[test]
    fn unknown_tasks_fail_to_parse() {
        let cli = Cli::parse_from(["lacquer", "deploy"]);

        assert!(cli.task.parse::<TaskName>().is_err());
    }
}
