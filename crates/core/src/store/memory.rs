use super::RemoteStore;
use crate::error::{AppError, Result};
use crate::geometry::{GeometryKind, GeometryRecord, RecordId};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// In-process [`RemoteStore`] with server-like id assignment.
///
/// Used for offline sessions and as the backing store in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

#[derive(Default)]
struct Collections {
    next_id: u64,
    records: HashMap<GeometryKind, BTreeMap<u64, GeometryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `records`, assigning fresh ids.
    pub fn seeded(records: impl IntoIterator<Item = GeometryRecord>) -> Result<Self> {
        let store = Self::new();
        {
            let mut inner = store.lock()?;
            for record in records {
                inner.insert(record);
            }
        }
        Ok(store)
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: GeometryKind) -> usize {
        self.lock()
            .map(|inner| inner.records.get(&kind).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.inner
            .lock()
            .map_err(|_| AppError::invalid_state("Failed to acquire store lock"))
    }

    fn list_now(&self, kind: GeometryKind) -> Result<Vec<GeometryRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .get(&kind)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_now(&self, kind: GeometryKind, id: RecordId) -> Result<GeometryRecord> {
        let inner = self.lock()?;
        inner
            .find(kind, &id)
            .cloned()
            .ok_or(AppError::NotFound { kind, id })
    }

    fn create_now(&self, record: GeometryRecord) -> Result<GeometryRecord> {
        record.validate()?;
        let mut inner = self.lock()?;
        Ok(inner.insert(record))
    }

    fn update_now(&self, record: GeometryRecord) -> Result<()> {
        let id = record
            .id
            .clone()
            .ok_or_else(|| AppError::invalid_state("cannot update a record without an id"))?;
        record.validate()?;
        let mut inner = self.lock()?;
        let kind = record.kind;
        let slot = inner
            .find_mut(kind, &id)
            .ok_or(AppError::NotFound { kind, id })?;
        *slot = record;
        Ok(())
    }

    fn delete_now(&self, kind: GeometryKind, id: RecordId) -> Result<()> {
        let mut inner = self.lock()?;
        let key = numeric_key(&id);
        let removed = key.and_then(|key| inner.records.get_mut(&kind)?.remove(&key));
        match removed {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound { kind, id }),
        }
    }
}

impl Collections {
    fn insert(&mut self, mut record: GeometryRecord) -> GeometryRecord {
        self.next_id += 1;
        let key = self.next_id;
        record.id = Some(RecordId::from(key));
        self.records
            .entry(record.kind)
            .or_default()
            .insert(key, record.clone());
        record
    }

    fn find(&self, kind: GeometryKind, id: &RecordId) -> Option<&GeometryRecord> {
        self.records.get(&kind)?.get(&numeric_key(id)?)
    }

    fn find_mut(&mut self, kind: GeometryKind, id: &RecordId) -> Option<&mut GeometryRecord> {
        self.records.get_mut(&kind)?.get_mut(&numeric_key(id)?)
    }
}

fn numeric_key(id: &RecordId) -> Option<u64> {
    id.as_str().parse().ok()
}

impl RemoteStore for MemoryStore {
    fn list(&self, kind: GeometryKind) -> BoxFuture<'_, Result<Vec<GeometryRecord>>> {
        future::ready(self.list_now(kind)).boxed()
    }

    fn get(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<GeometryRecord>> {
        future::ready(self.get_now(kind, id)).boxed()
    }

    fn create(&self, record: GeometryRecord) -> BoxFuture<'_, Result<GeometryRecord>> {
        future::ready(self.create_now(record)).boxed()
    }

    fn update(&self, record: GeometryRecord) -> BoxFuture<'_, Result<()>> {
        future::ready(self.update_now(record)).boxed()
    }

    fn delete(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<()>> {
        future::ready(self.delete_now(kind, id)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LonLat;

    fn point(name: &str, lon: f64, lat: f64) -> GeometryRecord {
        GeometryRecord::new(GeometryKind::Point, name, vec![LonLat::new(lon, lat)])
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let store = MemoryStore::new();
        let a = store.create(point("A", 35.0, 39.0)).await.unwrap();
        let b = store.create(point("B", 36.0, 40.0)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.count(GeometryKind::Point), 2);
        assert_eq!(store.count(GeometryKind::Polygon), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::seeded([point("A", 35.0, 39.0)]).unwrap();
        let mut a = store.list(GeometryKind::Point).await.unwrap().remove(0);
        let id = a.id.clone().unwrap();

        a.name = "Renamed".into();
        store.update(a).await.unwrap();
        assert_eq!(
            store.get(GeometryKind::Point, id.clone()).await.unwrap().name,
            "Renamed"
        );

        store.delete(GeometryKind::Point, id.clone()).await.unwrap();
        let err = store.get(GeometryKind::Point, id.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(store.delete(GeometryKind::Point, id).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_invalid_records() {
        let store = MemoryStore::new();
        assert!(store.create(point("", 35.0, 39.0)).await.is_err());
        assert_eq!(store.count(GeometryKind::Point), 0);
    }
}
