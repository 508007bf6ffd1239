//! The annotation session.
//!
//! This module turns map input into draft, select, edit and delete flows
//! against a [`RemoteStore`](crate::store::RemoteStore).
//!
//! # Architecture
//!
//! The session is split into focused submodules:
//! - [`state`]: Editing modes, drafts, selections and panels
//! - [`controller`]: The state machine and completion handling
//! - [`surface`]: The map and widget interface the controller drives
//! - [`headless`]: An in-memory surface for the CLI and tests
//! - [`placement`]: Panel positioning next to the pointer
//! - [`gesture`]: Drag detection and vertex accumulation
//! - [`notification`]: Transient messages
//! - [`settings`]: User preferences and persistence
//!
//! # Usage
//!
//! ```ignore
//! use mapnote_core::session::{HeadlessSurface, SessionController, Size};
//! use mapnote_core::{GeometryKind, MemoryStore};
//!
//! let surface = HeadlessSurface::new(Size::new(800.0, 600.0), Size::new(240.0, 120.0));
//! let mut session = SessionController::new(Arc::new(MemoryStore::new()), surface, timeout);
//!
//! session.begin_add(GeometryKind::Point);
//! session.on_map_click(coordinate, pixel);
//! session.commit_draft("Harbour")?;
//! session.settle().await;
//! ```

pub mod controller;
pub mod gesture;
pub mod headless;
pub mod notification;
pub mod placement;
pub mod settings;
pub mod state;
pub mod surface;

// Public API exports
pub use controller::SessionController;
pub use headless::HeadlessSurface;
pub use notification::{Notification, NotificationLevel};
pub use placement::{Pixel, Size, place_panel};
pub use settings::Settings;
pub use state::{EditingMode, Panel, PanelState, PendingDraft, RecordRef, Selection};
pub use surface::{Cursor, Interaction, Layer, MapSurface, Marker, MarkerHandle, MarkerRole};
