//! Watch rules: rebuild on change, then notify.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use lacquer_pipeline::pipeline::glob_base;
use lacquer_pipeline::{write_assets, Asset, AssetClass, Config, ConfigError, TaskError, TaskSet};

use crate::livereload::{inject_client, ReloadHub};
use crate::server::{DevServer, ServerError};

/// Errors that can occur in a watch session.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("File watch error: {0}")]
    Notify(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// One watch rule: a set of glob patterns bound to an asset class rebuild.
struct WatchRule {
    class: AssetClass,
    patterns: Vec<glob::Pattern>,
}

impl WatchRule {
    fn matches(&self, rel: &Path, abs: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path(rel) || p.matches_path(abs))
    }
}

/// Compile the per-class watch rules from the configuration.
fn compile_rules(config: &Config) -> Result<Vec<WatchRule>, WatchError> {
    let mut rules = Vec::new();

    for class in AssetClass::ALL {
        let globs = class.watch_globs(config);
        if globs.is_empty() {
            continue;
        }

        let patterns = globs
            .iter()
            .map(|g| {
                glob::Pattern::new(g).map_err(|e| WatchError::Pattern {
                    pattern: g.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        rules.push(WatchRule { class, patterns });
    }

    Ok(rules)
}

/// Watch the configured source globs, rebuilding each asset class on change.
///
/// Every rule fires once immediately on registration, before any real
/// filesystem event. Template, vendor, svg, images, js, and fonts rebuilds
/// are followed by a full-reload broadcast; style rebuilds stream the
/// compiled result into live connections instead. With `inject` set,
/// rendered pages get the live-reload client script appended after writing.
pub async fn watch(tasks: TaskSet, hub: ReloadHub, inject: bool) -> Result<(), WatchError> {
    tasks.config().validate_live()?;

    let rules = compile_rules(tasks.config())?;

    // Initial fire, one rebuild per class.
    for rule in &rules {
        rebuild(&tasks, &hub, rule.class, inject).await;
    }

    let roots = watch_roots(tasks.config());
    let (_watcher, mut rx) = spawn_fs_watcher(&roots)?;

    tracing::info!("Watching for changes");

    let cwd = std::env::current_dir().ok();

    while let Some(path) = rx.recv().await {
        let rel = cwd
            .as_deref()
            .and_then(|cwd| path.strip_prefix(cwd).ok())
            .unwrap_or(&path)
            .to_path_buf();

        for rule in &rules {
            if rule.matches(&rel, &path) {
                tracing::debug!("{}: {} changed", rule.class.name(), rel.display());
                rebuild(&tasks, &hub, rule.class, inject).await;
            }
        }
    }

    Ok(())
}

/// Start the dev server, then watch.
///
/// The listener is bound before any watch rule registers, so the very first
/// rebuild notification has a live connection to act on.
pub async fn serve(tasks: TaskSet, hub: ReloadHub) -> Result<(), WatchError> {
    tasks.config().validate_live()?;

    let server = DevServer::new(tasks.config().server.clone(), hub.clone());
    let handle = server.start().await?;

    let result = watch(tasks, hub, true).await;

    handle.shutdown();
    result
}

/// Run one class rebuild and notify clients.
///
/// A failed rebuild aborts only this class: the error is logged and the
/// watch session keeps running.
async fn rebuild(tasks: &TaskSet, hub: &ReloadHub, class: AssetClass, inject: bool) {
    match tasks.run_class(class).await {
        Ok(assets) => {
            if inject && class == AssetClass::Twig {
                if let Err(e) = rewrite_with_client(&assets, tasks.config()) {
                    tracing::warn!("twig: failed to inject reload client: {}", e);
                }
            }

            match class {
                AssetClass::Sass => {
                    let sink = hub.stream();
                    for asset in &assets {
                        if asset.rel.extension().and_then(|e| e.to_str()) != Some("css") {
                            continue;
                        }
                        if let Ok(css) = std::str::from_utf8(&asset.contents) {
                            sink.push(&path_str(&asset.rel), css);
                        }
                    }
                }
                _ => hub.reload(),
            }
        }
        Err(e) => {
            tracing::warn!("{}: rebuild failed: {}", class.name(), e);
        }
    }
}

/// Rewrite rendered pages with the live-reload client script appended.
fn rewrite_with_client(assets: &[Asset], config: &Config) -> Result<(), TaskError> {
    let patched: Vec<Asset> = assets
        .iter()
        .filter(|a| a.rel.extension().and_then(|e| e.to_str()) == Some("html"))
        .filter_map(|a| {
            std::str::from_utf8(&a.contents).ok().map(|html| {
                Asset::generated(a.rel.clone(), inject_client(html).into_bytes())
            })
        })
        .collect();

    if patched.is_empty() {
        return Ok(());
    }

    write_assets(&patched, &config.dist_dir).map_err(|source| TaskError::Pipe {
        class: "twig",
        source,
    })?;

    Ok(())
}

/// The directories to register with the filesystem watcher: the literal
/// prefix of every watch glob.
fn watch_roots(config: &Config) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();

    for class in AssetClass::ALL {
        for pattern in class.watch_globs(config) {
            let base = glob_base(pattern);
            if !base.as_os_str().is_empty() && !roots.contains(&base) {
                roots.push(base);
            }
        }
    }

    roots
}

/// Bridge filesystem events onto the async runtime.
///
/// The returned watcher must be kept alive for the session. Rapid event
/// bursts are debounced; distinct classes still rebuild independently.
fn spawn_fs_watcher(
    paths: &[PathBuf],
) -> Result<(RecommendedWatcher, async_mpsc::Receiver<PathBuf>), WatchError> {
    let (sync_tx, sync_rx) = mpsc::channel();
    let (async_tx, async_rx) = async_mpsc::channel(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if let Ok(event) = res {
            let _ = sync_tx.send(event);
        }
    })
    .map_err(|e| WatchError::Notify(e.to_string()))?;

    for path in paths {
        if path.exists() {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| WatchError::Notify(e.to_string()))?;
        }
    }

    // Forward events, coalescing rapid bursts.
    std::thread::spawn(move || {
        let debounce_duration = Duration::from_millis(100);
        let mut last_event_time: Option<Instant> = None;

        while let Ok(event) = sync_rx.recv() {
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                continue;
            }

            let now = Instant::now();
            if let Some(last) = last_event_time {
                if now.duration_since(last) < debounce_duration {
                    continue;
                }
            }
            last_event_time = Some(now);

            for path in event.paths {
                if async_tx.blocking_send(path).is_err() {
                    return;
                }
            }
        }
    });

    Ok((watcher, async_rx))
}

fn path_str(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livereload::ReloadMessage;
    use std::fs;
    use tempfile::tempdir;

    /// A config rooted in a temp directory with only the given classes wired.
    fn quiet_config(temp: &Path) -> Config {
        let mut config = Config::default();
        config.dist_dir = temp.join("dist");
        config.server.base_dir = temp.join("dist");
        config.server.open = false;

        config.twig.src = Vec::new();
        config.twig.watch = Vec::new();
        config.sass.src = Vec::new();
        config.sass.watch = Vec::new();
        config.vendor.src = Vec::new();
        config.vendor.watch = Vec::new();
        config.svg.src = Vec::new();
        config.svg.watch = Vec::new();
        config.images.src = Vec::new();
        config.images.watch = Vec::new();
        config.js.src = Vec::new();
        config.js.watch = Vec::new();
        config.fonts.src = Vec::new();
        config.fonts.watch = Vec::new();
        config
    }

    #[test]
    fn rules_bind_paths_to_their_class_only() {
        let mut config = quiet_config(Path::new("/tmp"));
        config.sass.watch = vec!["src/scss/**/*".to_string()];
        config.js.watch = vec!["src/js/**/*".to_string()];

        let rules = compile_rules(&config).unwrap();
        assert_eq!(rules.len(), 2);

        let matched: Vec<AssetClass> = rules
            .iter()
            .filter(|r| {
                r.matches(
                    Path::new("src/scss/style.scss"),
                    Path::new("/site/src/scss/style.scss"),
                )
            })
            .map(|r| r.class)
            .collect();

        assert_eq!(matched, vec![AssetClass::Sass]);
    }

    #[test]
    fn watch_roots_deduplicate_literal_prefixes() {
        let mut config = quiet_config(Path::new("/tmp"));
        config.twig.watch = vec![
            "src/data/**/*".to_string(),
            "src/twig/**/*".to_string(),
        ];
        config.sass.watch = vec!["src/scss/**/*".to_string()];
        config.svg.watch = vec!["src/svg/**/*.svg".to_string()];

        let roots = watch_roots(&config);

        assert_eq!(
            roots,
            vec![
                PathBuf::from("src/data"),
                PathBuf::from("src/twig"),
                PathBuf::from("src/scss"),
                PathBuf::from("src/svg"),
            ]
        );
    }

    #[tokio::test]
    async fn watch_rejects_pack_mode() {
        let temp = tempdir().unwrap();
        let mut config = quiet_config(temp.path());
        config.pack = true;

        let tasks = TaskSet::new(config).unwrap();

        let err = watch(tasks, ReloadHub::new(), false).await.unwrap_err();

        assert!(matches!(
            err,
            WatchError::Config(ConfigError::PackWithLiveTask)
        ));
    }

    #[tokio::test]
    async fn every_rule_fires_once_on_registration() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/images")).unwrap();
        fs::write(temp.path().join("src/images/logo.png"), b"png").unwrap();

        let mut config = quiet_config(temp.path());
        config.images.src = vec![format!("{}/src/images/**/*", temp.path().display())];
        config.images.watch = vec![format!("{}/src/images/**/*", temp.path().display())];
        let dist = config.dist_dir.clone();

        let tasks = TaskSet::new(config).unwrap();
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        let session = tokio::spawn(watch(tasks, hub, false));

        let msg = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("timeout waiting for initial fire")
            .unwrap();

        assert!(matches!(msg, ReloadMessage::Reload));
        assert!(dist.join("images/logo.png").exists());

        session.abort();
    }

    #[tokio::test]
    async fn style_rebuilds_stream_instead_of_reloading() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/scss")).unwrap();
        fs::write(
            temp.path().join("src/scss/a.scss"),
            "body {\n  color: #ff0000;\n}\n",
        )
        .unwrap();

        let mut config = quiet_config(temp.path());
        config.sass.src = vec![format!("{}/src/scss/a.scss", temp.path().display())];
        config.sass.watch = vec![format!("{}/src/scss/**/*", temp.path().display())];

        let tasks = TaskSet::new(config).unwrap();
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        let session = tokio::spawn(watch(tasks, hub, false));

        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for style stream")
            .unwrap();

        match msg {
            ReloadMessage::InjectCss { path, css } => {
                assert_eq!(path, "css/a.css");
                assert!(css.contains("color"));
            }
            other => panic!("Expected InjectCss, got {:?}", other),
        }

        session.abort();
    }

    #[tokio::test]
    async fn a_failing_rebuild_keeps_the_session_alive() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/scss")).unwrap();
        fs::write(temp.path().join("src/scss/a.scss"), "body { color: ").unwrap();
        fs::create_dir_all(temp.path().join("src/js")).unwrap();
        fs::write(temp.path().join("src/js/app.js"), b"app").unwrap();

        let mut config = quiet_config(temp.path());
        config.sass.src = vec![format!("{}/src/scss/a.scss", temp.path().display())];
        config.sass.watch = vec![format!("{}/src/scss/**/*", temp.path().display())];
        config.js.src = vec![format!("{}/src/js/**/*", temp.path().display())];
        config.js.watch = vec![format!("{}/src/js/**/*", temp.path().display())];

        let tasks = TaskSet::new(config).unwrap();
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        let session = tokio::spawn(watch(tasks, hub, false));

        // The broken stylesheet aborts only its own rebuild; the js rule
        // still fires its initial reload.
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for js initial fire")
            .unwrap();

        assert!(matches!(msg, ReloadMessage::Reload));

        session.abort();
    }
}
