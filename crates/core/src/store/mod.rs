//! Remote persistence for geometry records.
//!
//! The session controller talks to the store only through [`RemoteStore`], so
//! the REST client ([`RestStore`]) and the in-process store ([`MemoryStore`])
//! are interchangeable. Every method resolves to a fresh server view; callers
//! never merge optimistic local state.

mod memory;
mod rest;
mod wire;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::error::Result;
use crate::geometry::{GeometryKind, GeometryRecord, RecordId};
use futures::future::BoxFuture;

/// Contract the session controller needs from the persistence service.
///
/// Futures borrow the store and are `Send`, so the controller can drive them on
/// a spawned task that owns an `Arc` of the store.
pub trait RemoteStore: Send + Sync {
    /// `GET /{Kind}`: every record of one kind.
    fn list(&self, kind: GeometryKind) -> BoxFuture<'_, Result<Vec<GeometryRecord>>>;

    /// `GET /{Kind}/{id}`: a single record, [`AppError::NotFound`] when gone.
    ///
    /// [`AppError::NotFound`]: crate::error::AppError::NotFound
    fn get(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<GeometryRecord>>;

    /// `POST /{Kind}`: persists a new record and returns it with its id.
    fn create(&self, record: GeometryRecord) -> BoxFuture<'_, Result<GeometryRecord>>;

    /// `PUT /{Kind}/{id}`: replaces name and coordinates of a stored record.
    fn update(&self, record: GeometryRecord) -> BoxFuture<'_, Result<()>>;

    /// `DELETE /{Kind}/{id}`.
    fn delete(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<()>>;
}
