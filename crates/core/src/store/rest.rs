use super::RemoteStore;
use super::wire::{ListBody, RecordBody, WireRecord};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::{GeometryKind, GeometryRecord, RecordId};
use futures::FutureExt;
use futures::future::BoxFuture;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use url::Url;

/// [`RemoteStore`] backed by the geometry REST service.
pub struct RestStore {
    client: Client,
    base_url: Url,
}

impl RestStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    fn collection_url(&self, kind: GeometryKind) -> Result<Url> {
        self.base_url
            .join(kind.collection())
            .map_err(|e| AppError::Config(format!("Invalid collection URL: {}", e)))
    }

    fn record_url(&self, kind: GeometryKind, id: &RecordId) -> Result<Url> {
        let mut url = self.collection_url(kind)?;
        url.path_segments_mut()
            .map_err(|_| AppError::config("API URL cannot be a base"))?
            .push(id.as_str());
        Ok(url)
    }

    async fn list_records(&self, kind: GeometryKind) -> Result<Vec<GeometryRecord>> {
        let url = self.collection_url(kind)?;
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(response, &url, None)?;
        let body: ListBody = response.json().await?;
        Ok(body.into_records(kind))
    }

    async fn get_record(&self, kind: GeometryKind, id: RecordId) -> Result<GeometryRecord> {
        let url = self.record_url(kind, &id)?;
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(response, &url, Some((kind, &id)))?;
        let wire: WireRecord = response.json().await?;
        let mut record = wire.into_record(kind)?;
        if record.id.is_none() {
            record.id = Some(id);
        }
        Ok(record)
    }

    async fn create_record(&self, record: GeometryRecord) -> Result<GeometryRecord> {
        let url = self.collection_url(record.kind)?;
        debug!("POST {url}");
        let response = {
            let body = RecordBody::from_record(&record)?;
            self.client.post(url.clone()).json(&body).send().await?
        };
        let response = check_status(response, &url, None)?;

        let wire: WireRecord = response.json().await?;
        let id = wire
            .id()
            .cloned()
            .ok_or_else(|| AppError::network("server did not return an id for the new record"))?;
        // Some deployments echo only the id; fall back to what was sent.
        let created = wire.into_record(record.kind).unwrap_or(record);
        Ok(GeometryRecord {
            id: Some(id),
            ..created
        })
    }

    async fn update_record(&self, record: GeometryRecord) -> Result<()> {
        let id = record
            .id
            .clone()
            .ok_or_else(|| AppError::invalid_state("cannot update a record without an id"))?;
        let url = self.record_url(record.kind, &id)?;
        let body = RecordBody::from_record(&record)?;
        debug!("PUT {url}");
        let response = self.client.put(url.clone()).json(&body).send().await?;
        check_status(response, &url, Some((record.kind, &id)))?;
        Ok(())
    }

    async fn delete_record(&self, kind: GeometryKind, id: RecordId) -> Result<()> {
        let url = self.record_url(kind, &id)?;
        debug!("DELETE {url}");
        let response = self.client.delete(url.clone()).send().await?;
        check_status(response, &url, Some((kind, &id)))?;
        Ok(())
    }
}

/// Passes successful responses through, anything else becomes an error.
fn check_status(
    response: Response,
    url: &Url,
    target: Option<(GeometryKind, &RecordId)>,
) -> Result<Response> {
    match status_error(response.status(), url, target) {
        Some(error) => Err(error),
        None => Ok(response),
    }
}

/// Maps a response status onto an error; 404 on a record URL is `NotFound`.
fn status_error(
    status: StatusCode,
    url: &Url,
    target: Option<(GeometryKind, &RecordId)>,
) -> Option<AppError> {
    if status.is_success() {
        return None;
    }
    Some(match target {
        Some((kind, id)) if status == StatusCode::NOT_FOUND => AppError::NotFound {
            kind,
            id: id.clone(),
        },
        _ => AppError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        },
    })
}

impl RemoteStore for RestStore {
    fn list(&self, kind: GeometryKind) -> BoxFuture<'_, Result<Vec<GeometryRecord>>> {
        self.list_records(kind).boxed()
    }

    fn get(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<GeometryRecord>> {
        self.get_record(kind, id).boxed()
    }

    fn create(&self, record: GeometryRecord) -> BoxFuture<'_, Result<GeometryRecord>> {
        self.create_record(record).boxed()
    }

    fn update(&self, record: GeometryRecord) -> BoxFuture<'_, Result<()>> {
        self.update_record(record).boxed()
    }

    fn delete(&self, kind: GeometryKind, id: RecordId) -> BoxFuture<'_, Result<()>> {
        self.delete_record(kind, id).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> RestStore {
        let config = Config::builder().with_api_url(base).build().unwrap();
        RestStore::new(&config).unwrap()
    }

    #[test]
    fn test_collection_urls() {
        let store = store("http://localhost:5183/api");
        assert_eq!(
            store.collection_url(GeometryKind::Point).unwrap().as_str(),
            "http://localhost:5183/api/Point"
        );
        assert_eq!(
            store
                .record_url(GeometryKind::Polygon, &RecordId::from("42"))
                .unwrap()
                .as_str(),
            "http://localhost:5183/api/Polygon/42"
        );
    }

    #[test]
    fn test_record_ids_are_escaped() {
        let store = store("http://localhost/api/");
        assert_eq!(
            store
                .record_url(GeometryKind::LineString, &RecordId::from("a/b"))
                .unwrap()
                .as_str(),
            "http://localhost/api/LineString/a%2Fb"
        );
    }

    #[test]
    fn test_status_mapping() {
        let url = Url::parse("http://localhost/api/Point/7").unwrap();
        let id = RecordId::from("7");
        let target = Some((GeometryKind::Point, &id));

        assert!(status_error(StatusCode::OK, &url, target).is_none());
        assert!(status_error(StatusCode::NO_CONTENT, &url, target).is_none());

        match status_error(StatusCode::NOT_FOUND, &url, target) {
            Some(AppError::NotFound { kind, id }) => {
                assert_eq!(kind, GeometryKind::Point);
                assert_eq!(id.as_str(), "7");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }

        match status_error(StatusCode::INTERNAL_SERVER_ERROR, &url, target) {
            Some(AppError::Status { status, url }) => {
                assert_eq!(status, 500);
                assert_eq!(url, "http://localhost/api/Point/7");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_collection_is_not_a_missing_record() {
        let url = Url::parse("http://localhost/api/Point").unwrap();
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, &url, None),
            Some(AppError::Status { status: 404, .. })
        ));
    }
}
