//! Shared application state for the LapTrack HTTP server.
//!
//! [`AppState`] holds the two doors into the core pipeline (the tag
//! channel readers push into and the hub handle displays register
//! through) plus the read-only team directory the admin pages use. The
//! directory is optional: when storage was unreachable at startup the
//! process still serves readers and displays, and admin pages answer 503.

use std::path::PathBuf;
use std::time::Duration;

use laptrack_core::config::LapTrackConfig;
use laptrack_core::{HubHandle, LapPipeline, TeamDirectory};
use laptrack_types::TagId;
use tokio::sync::mpsc;

use crate::error::WebError;
use crate::pages::Pages;

/// Filesystem roots served verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDirs {
    /// Served under `/templates/`.
    pub templates: PathBuf,
    /// Served under `/clients/`.
    pub clients: PathBuf,
}

impl Default for AssetDirs {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates"),
            clients: PathBuf::from("clients"),
        }
    }
}

/// Per-display delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Depth of each display's private delivery queue.
    pub queue_capacity: usize,
    /// Upper bound on a single frame write before the display is dropped.
    pub write_timeout: Duration,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared state behind every route.
#[derive(Debug)]
pub struct AppState<D> {
    /// Ingestion channel; every reader connection holds a clone.
    pub tags: mpsc::Sender<TagId>,
    /// Front door to the broadcast hub.
    pub hub: HubHandle,
    /// Team listings, `None` when storage is unavailable.
    pub directory: Option<D>,
    /// Admin page templates.
    pub pages: Pages,
    /// Static file roots.
    pub assets: AssetDirs,
    /// Display queue depth and write timeout.
    pub display: DisplaySettings,
}

impl<D: TeamDirectory> AppState<D> {
    /// Assemble state from raw parts. Asset and display settings start at
    /// their defaults.
    pub fn new(
        tags: mpsc::Sender<TagId>,
        hub: HubHandle,
        directory: Option<D>,
        pages: Pages,
    ) -> Self {
        Self {
            tags,
            hub,
            directory,
            pages,
            assets: AssetDirs::default(),
            display: DisplaySettings::default(),
        }
    }

    /// Wire state to a running pipeline using the loaded configuration.
    pub fn from_pipeline(
        pipeline: &LapPipeline,
        directory: Option<D>,
        config: &LapTrackConfig,
    ) -> Self {
        Self {
            tags: pipeline.tags(),
            hub: pipeline.hub(),
            directory,
            pages: Pages::new(&config.http.templates_dir),
            assets: AssetDirs {
                templates: PathBuf::from(&config.http.templates_dir),
                clients: PathBuf::from(&config.http.clients_dir),
            },
            display: DisplaySettings {
                queue_capacity: config.channels.subscriber_capacity,
                write_timeout: config.sink.write_timeout(),
            },
        }
    }

    /// Override the static file roots.
    #[must_use]
    pub fn with_assets(mut self, assets: AssetDirs) -> Self {
        self.assets = assets;
        self
    }

    /// Override display delivery settings.
    #[must_use]
    pub fn with_display(mut self, display: DisplaySettings) -> Self {
        self.display = display;
        self
    }

    /// The team directory, or [`WebError::Unavailable`] in degraded mode.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Unavailable`] when storage was never reached.
    pub fn directory(&self) -> Result<&D, WebError> {
        self.directory
            .as_ref()
            .ok_or_else(|| WebError::Unavailable(String::from("team storage is not connected")))
    }
}
