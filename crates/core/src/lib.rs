//! MapNote Core Library
//!
//! This library provides the core functionality for MapNote, a map annotation
//! client that places points, lines and polygons and keeps them in a remote
//! geometry store.
//!
//! # Overview
//!
//! A session lets the user draft a geometry on the map, name it and save it,
//! then select, reshape, rename or delete stored records. The library handles:
//!
//! - **Geometry**: Record types, validation and the coordinate codec via [`geometry`]
//! - **Persistence**: The REST store client and an in-memory store via [`store`]
//! - **Editing**: The session state machine via [`session`]
//! - **Browsing**: Table rows and record details via [`table`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`MapNote`] facade:
//!
//! ```ignore
//! use mapnote_core::MapNote;
//! use mapnote_core::session::{HeadlessSurface, Size};
//!
//! let app = MapNote::new()?;
//! let surface = HeadlessSurface::new(Size::new(800.0, 600.0), Size::new(240.0, 120.0));
//!
//! let mut session = app.session(surface)?;
//! session.settle().await;
//! println!("{} points", session.records(GeometryKind::Point).len());
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: Configuration loading and management
//! - [`error`]: Error types and result aliases
//! - [`geometry`]: Geometry records and coordinate encoding
//! - [`projection`]: Display projection at the rendering boundary
//! - [`session`]: Session controller and the surface it drives
//! - [`store`]: Remote store contract and implementations
//! - [`table`]: Tabular view of stored records

pub mod config;
pub mod error;
pub mod geometry;
pub mod projection;
pub mod session;
pub mod store;
pub mod table;

// Re-export primary types for convenience
pub use config::Config;
pub use error::{AppError, ErrorCategory, Result};
pub use geometry::{GeometryKind, GeometryRecord, LonLat, RecordId, RecordPatch};
pub use session::{SessionController, Settings};
pub use store::{MemoryStore, RemoteStore, RestStore};

use session::MapSurface;
use std::sync::Arc;

/// Main entry point for the MapNote application.
///
/// This struct pairs the environment configuration with the user's persisted
/// settings and builds sessions from them.
///
/// # Example
///
/// ```ignore
/// use mapnote_core::MapNote;
///
/// let app = MapNote::new()?;
/// let mut session = app.session(surface)?;
/// ```
pub struct MapNote {
    config: Config,
    settings: Settings,
}

impl MapNote {
    /// Creates an instance from the environment and the settings file.
    ///
    /// A store URL saved in the settings takes precedence over
    /// `MAPNOTE_API_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds an invalid URL or timeout.
    pub fn new() -> Result<Self> {
        Self::with_settings(Config::load()?, Settings::load())
    }

    /// Creates an instance with custom configuration and settings.
    pub fn with_settings(config: Config, settings: Settings) -> Result<Self> {
        let config = match settings.api_url.as_deref() {
            Some(url) => Config::builder()
                .with_api_url(url)
                .with_timeout_secs(config.request_timeout.as_secs())
                .with_notification_secs(config.notification_duration.as_secs())
                .build()?,
            None => config,
        };
        Ok(Self { config, settings })
    }

    /// Starts a session against the configured REST store.
    ///
    /// Must be called from within a tokio runtime; the initial reload is
    /// already in flight when this returns.
    pub fn session<S: MapSurface>(&self, surface: S) -> Result<SessionController<S>> {
        let store = RestStore::new(&self.config)?;
        Ok(self.session_with(Arc::new(store), surface))
    }

    /// Starts a session against any store, e.g. a [`MemoryStore`] offline.
    pub fn session_with<S: MapSurface>(
        &self,
        store: Arc<dyn RemoteStore>,
        surface: S,
    ) -> SessionController<S> {
        let mut session =
            SessionController::new(store, surface, self.config.notification_duration);
        session.start(self.settings.center, self.settings.zoom);
        session
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LonLat;
    use crate::session::{HeadlessSurface, Size};

    fn config() -> Config {
        Config::builder()
            .with_api_url("http://geo.local/api")
            .with_timeout_secs(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_settings_url_overrides_environment() {
        let settings = Settings {
            api_url: Some("https://store.example/v1".into()),
            ..Settings::default()
        };
        let app = MapNote::with_settings(config(), settings).unwrap();
        assert_eq!(app.config().api_base_url.as_str(), "https://store.example/v1/");
        assert_eq!(app.config().request_timeout.as_secs(), 4);
    }

    #[tokio::test]
    async fn test_offline_session_starts_at_settings_view() {
        let settings = Settings {
            center: LonLat::new(29.0, 41.0),
            zoom: 9.0,
            api_url: None,
        };
        let app = MapNote::with_settings(config(), settings).unwrap();
        let store = MemoryStore::seeded(vec![GeometryRecord::new(
            GeometryKind::Point,
            "pier",
            vec![LonLat::new(29.01, 41.0)],
        )])
        .unwrap();
        let surface = HeadlessSurface::new(Size::new(800.0, 600.0), Size::new(100.0, 50.0));

        let mut session = app.session_with(Arc::new(store), surface);
        session.settle().await;

        assert_eq!(session.records(GeometryKind::Point).len(), 1);
        assert_eq!(session.surface().view().1, 9.0);
    }
}
