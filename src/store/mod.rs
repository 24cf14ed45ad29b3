//! Settings persistence and hot reload.
//!
//! The engine itself holds no persistence logic; this module is the
//! configuration source/sink. Settings live in a TOML file, loaded once at
//! startup and re-applied to the running [`PolicyEngine`] whenever the file
//! changes. Reload triggers:
//!
//! - **File change**: [`start_file_watcher`] uses the [`notify`] crate to
//!   detect modifications to the settings file.
//! - **SIGHUP** (Unix only): [`start_sighup_handler`] listens for the HUP
//!   signal for manual reload via `kill -HUP <pid>`.
//!
//! Invalid settings are handled fail-safe: the engine keeps its current
//! state and a warning is logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::policy::config::Settings;
use crate::policy::engine::PolicyEngine;

/// Load settings from `path`, falling back to defaults if the file does not
/// exist. The engine starts from this snapshot at process start.
pub fn load_or_default(path: &Path) -> Settings {
    if !path.exists() {
        info!(path = %path.display(), "no settings file, starting from defaults");
        return Settings::default();
    }
    match Settings::load_from_path(path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), "unreadable settings file, starting from defaults: {e}");
            Settings::default()
        }
    }
}

/// Re-read the settings file and apply it to the engine.
///
/// On success the new state is swapped in atomically setter-by-setter. On
/// failure (I/O error, invalid TOML) the engine keeps its current state and
/// the error is returned.
pub fn reload_settings(engine: &Arc<PolicyEngine>, path: &Path) -> crate::error::Result<()> {
    let settings = Settings::load_from_path(path)?;
    engine.apply_settings(&settings);
    info!(
        path = %path.display(),
        blacklist = settings.blacklist.len(),
        whitelist = settings.whitelist.len(),
        "settings reloaded"
    );
    Ok(())
}

/// Start a file-system watcher that triggers [`reload_settings`] on change.
///
/// Returns a [`RecommendedWatcher`] handle that must be kept alive for the
/// duration of the watch. Dropping the handle stops the watcher.
pub fn start_file_watcher(
    settings_path: PathBuf,
    engine: Arc<PolicyEngine>,
) -> notify::Result<RecommendedWatcher> {
    let path = settings_path.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                info!("settings file changed, reloading...");
                if let Err(e) = reload_settings(&engine, &path) {
                    warn!("settings reload failed (keeping current state): {e}");
                }
            }
        }
        Err(e) => {
            warn!("file watcher error: {e}");
        }
    })?;

    watcher.watch(&settings_path, RecursiveMode::NonRecursive)?;
    info!("watching {} for changes", settings_path.display());
    Ok(watcher)
}

/// Start a SIGHUP handler that reloads the settings on signal.
#[cfg(unix)]
pub fn start_sighup_handler(settings_path: PathBuf, engine: Arc<PolicyEngine>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sig = match signal(SignalKind::hangup()) {
            Ok(sig) => sig,
            Err(e) => {
                warn!("failed to register SIGHUP handler: {e}");
                return;
            }
        };
        loop {
            sig.recv().await;
            info!("SIGHUP received, reloading settings...");
            if let Err(e) = reload_settings(&engine, &settings_path) {
                warn!("settings reload on SIGHUP failed (keeping current state): {e}");
            }
        }
    });
}

/// No-op SIGHUP handler for non-Unix platforms.
#[cfg(not(unix))]
pub fn start_sighup_handler(_settings_path: PathBuf, _engine: Arc<PolicyEngine>) {
    // SIGHUP is not available on this platform
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DetachedHost;
    use crate::policy::config::Mode;

    fn make_toml(mode: &str, entry: &str) -> String {
        format!(
            r#"
enabled = true
mode = "{mode}"
blacklist = ["{entry}"]
"#
        )
    }

    fn engine() -> Arc<PolicyEngine> {
        Arc::new(PolicyEngine::new(Arc::new(DetachedHost)))
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = load_or_default(&path);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reload_updates_engine_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navgate.toml");
        std::fs::write(&path, make_toml("blacklist", "*.example.com/*")).unwrap();

        let engine = engine();
        reload_settings(&engine, &path).unwrap();
        assert!(engine.is_enabled());
        assert_eq!(engine.blacklist(), vec!["*.example.com/*".to_string()]);

        std::fs::write(&path, make_toml("whitelist", "*.other.org/*")).unwrap();
        reload_settings(&engine, &path).unwrap();
        assert_eq!(engine.mode(), Mode::Whitelist);
        assert_eq!(engine.blacklist(), vec!["*.other.org/*".to_string()]);
    }

    #[test]
    fn reload_invalid_toml_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navgate.toml");
        std::fs::write(&path, make_toml("blacklist", "*.example.com/*")).unwrap();

        let engine = engine();
        reload_settings(&engine, &path).unwrap();

        std::fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(reload_settings(&engine, &path).is_err());

        // Old state retained.
        assert_eq!(engine.mode(), Mode::Blacklist);
        assert_eq!(engine.blacklist(), vec!["*.example.com/*".to_string()]);
    }

    #[test]
    fn reload_missing_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navgate.toml");
        std::fs::write(&path, make_toml("blacklist", "*.example.com/*")).unwrap();

        let engine = engine();
        reload_settings(&engine, &path).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(reload_settings(&engine, &path).is_err());
        assert_eq!(engine.blacklist(), vec!["*.example.com/*".to_string()]);
    }

    #[test]
    fn file_watcher_starts_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.toml");
        std::fs::write(&path, make_toml("blacklist", "*.example.com/*")).unwrap();

        let watcher = start_file_watcher(path, engine());
        assert!(watcher.is_ok());
    }

    #[test]
    fn file_watcher_triggers_reload_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch_reload.toml");
        std::fs::write(&path, make_toml("blacklist", "*.original.com/*")).unwrap();

        let engine = engine();
        reload_settings(&engine, &path).unwrap();
        let _watcher = start_file_watcher(path.clone(), engine.clone()).unwrap();

        std::fs::write(&path, make_toml("whitelist", "*.reloaded.com/*")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(500));

        // File watcher events may not fire instantly on all platforms, so
        // this is best-effort; reload_updates_engine_state is authoritative.
        if engine.blacklist() == vec!["*.reloaded.com/*".to_string()] {
            assert_eq!(engine.mode(), Mode::Whitelist);
        }
    }
}
