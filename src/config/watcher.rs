//! Configuration file watcher for hot reload.
//!
//! Translates changes of the config file into [`Intent::Reload`], using the
//! same coalescing channel as SIGHUP. The file itself is not parsed here; the
//! supervisor reloads it at the start of its next iteration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::lifecycle::signals::{Delivery, Intent, IntentSender};

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    intents: IntentSender,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher that requests reloads through `intents`.
    pub fn new(path: &Path, intents: IntentSender) -> Self {
        Self {
            path: path.to_path_buf(),
            intents,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads should
    /// be triggered.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let intents = self.intents.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        // Editors often replace the file, so watch the directory and filter.
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_config {
                        return;
                    }
                    match intents.request(Intent::Reload) {
                        Delivery::Delivered => {
                            tracing::info!("Config file change detected, requesting reload");
                        }
                        Delivery::Coalesced => {
                            tracing::debug!("Config file change coalesced with pending reload");
                        }
                        Delivery::Closed => {}
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
