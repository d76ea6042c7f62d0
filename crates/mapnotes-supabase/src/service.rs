use mapnotes_config::PersistenceConfig;
use mapnotes_engine::{
    Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, AnnotationService, ImageRef,
    ServiceError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::row::{NewPolygonRow, PolygonRow, PolygonUpdate};

const CACHE_CONTROL: &str = "3600";

/// Annotations in a Supabase project: rows through PostgREST, images through Storage.
pub struct SupabaseService {
    agent: ureq::Agent,
    base: Url,
    anon_key: String,
    table: String,
    bucket: String,
}

impl SupabaseService {
    pub fn new(config: &PersistenceConfig) -> Result<Self, ServiceError> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| ServiceError::Rejected(format!("invalid project URL {}: {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::Rejected(format!(
                "project URL {} cannot be used as a base",
                config.url
            )));
        }
        // keep any path prefix when joining
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Ok(Self {
            agent,
            base,
            anon_key: config.anon_key.clone(),
            table: config.table.clone(),
            bucket: config.bucket.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `/rest/v1/<table>`
    pub fn table_url(&self) -> Url {
        self.url(&["rest", "v1", &self.table])
    }

    /// `/storage/v1/object/<bucket>/<name>`
    pub fn object_url(&self, name: &str) -> Url {
        self.url(&["storage", "v1", "object", &self.bucket, name])
    }

    /// `/storage/v1/object/public/<bucket>/<name>`
    pub fn public_url(&self, name: &str) -> Url {
        self.url(&["storage", "v1", "object", "public", &self.bucket, name])
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        self.agent
            .request_url(method, url)
            .set("apikey", &self.anon_key)
            .set("Authorization", &format!("Bearer {}", self.anon_key))
    }

    fn rows_url(&self, id: Option<&AnnotationId>) -> Url {
        let mut url = self.table_url();
        match id {
            Some(id) => {
                url.query_pairs_mut()
                    .append_pair("id", &format!("eq.{id}"));
            }
            None => {
                url.query_pairs_mut()
                    .append_pair("select", "*")
                    .append_pair("order", "created_at.desc");
            }
        }
        url
    }

    /// Convert rows one at a time; a row that does not decode or has an unusable
    /// geometry is skipped with a warning.
    fn rows_to_annotations(rows: Vec<Value>) -> Vec<Annotation> {
        rows.into_iter()
            .filter_map(|value| {
                let id = value.get("id").map(Value::to_string).unwrap_or_default();
                let row = match serde_json::from_value::<PolygonRow>(value) {
                    Ok(row) => row,
                    Err(e) => {
                        log::warn!("Skipping polygon {id}: {e}");
                        return None;
                    }
                };
                match row.into_annotation() {
                    Ok(annotation) => Some(annotation),
                    Err(e) => {
                        log::warn!("Skipping polygon {id}: {e}");
                        None
                    }
                }
            })
            .collect()
    }
}

impl AnnotationService for SupabaseService {
    fn list(&mut self) -> Result<Vec<Annotation>, ServiceError> {
        let url = self.rows_url(None);
        let rows: Vec<Value> = decode(self.request("GET", &url).call())?;
        log::debug!("Fetched {} polygons", rows.len());
        Ok(Self::rows_to_annotations(rows))
    }

    fn create(&mut self, draft: &AnnotationDraft) -> Result<Annotation, ServiceError> {
        let url = self.table_url();
        let body = [NewPolygonRow::from(draft)];
        let rows: Vec<PolygonRow> = decode(
            self.request("POST", &url)
                .set("Prefer", "return=representation")
                .send_json(&body),
        )?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("insert returned no rows".to_string()))?;
        row.into_annotation()
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, ServiceError> {
        let url = self.rows_url(Some(id));
        let rows: Vec<PolygonRow> = decode(
            self.request("PATCH", &url)
                .set("Prefer", "return=representation")
                .send_json(PolygonUpdate::from(patch)),
        )?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        row.into_annotation()
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    fn delete(&mut self, id: &AnnotationId) -> Result<(), ServiceError> {
        let url = self.rows_url(Some(id));
        self.request("DELETE", &url).call().map_err(map_error)?;
        Ok(())
    }

    fn upload_image(&mut self, bytes: &[u8], name: &str) -> Result<ImageRef, ServiceError> {
        let url = self.object_url(name);
        self.request("POST", &url)
            .set("x-upsert", "true")
            .set("cache-control", CACHE_CONTROL)
            .set("Content-Type", content_type(name))
            .send_bytes(bytes)
            .map_err(map_error)?;
        log::info!("Uploaded image {name} ({} bytes)", bytes.len());
        Ok(ImageRef::new(self.public_url(name).as_str()))
    }

    fn delete_image(&mut self, name: &str) -> Result<(), ServiceError> {
        let url = self.url(&["storage", "v1", "object", &self.bucket]);
        self.request("DELETE", &url)
            .send_json(serde_json::json!({ "prefixes": [name] }))
            .map_err(map_error)?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    response: Result<ureq::Response, ureq::Error>,
) -> Result<T, ServiceError> {
    response
        .map_err(map_error)?
        .into_json::<T>()
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "msg")]
    message: String,
}

fn map_error(error: ureq::Error) -> ServiceError {
    match error {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            ServiceError::Http { status, message }
        }
        ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
    }
}

fn content_type(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
