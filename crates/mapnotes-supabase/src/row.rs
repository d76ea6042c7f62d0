//! Rows of the `polygons` table and their mapping to annotations.

use chrono::{DateTime, Utc};
use mapnotes_engine::{
    Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Color, Geometry, GeometryError,
    ImageRef, Position, Ring,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A row as PostgREST returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolygonRow {
    #[serde(deserialize_with = "row_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub area: Option<f64>,
    pub geometry: Geometry,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

impl PolygonRow {
    /// Convert to an annotation. The area is recomputed from the geometry; an
    /// unparseable color falls back to the palette default.
    pub fn into_annotation(self) -> Result<Annotation, RowError> {
        let boundary = Ring::from_geometry(&self.geometry)?;
        let color = self
            .color
            .as_deref()
            .and_then(|c| Color::parse(c).ok())
            .unwrap_or_default();
        let image = self
            .image_url
            .filter(|url| !url.is_empty())
            .map(ImageRef::new);

        Ok(Annotation::new(
            AnnotationId::new(self.id),
            self.name,
            boundary,
            color,
            self.created_at,
            image,
        ))
    }
}

/// PostgREST ids may be integers or uuids
fn row_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Insert payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPolygonRow {
    pub name: String,
    pub color: String,
    pub area: f64,
    pub coordinates: Vec<Vec<Position>>,
    pub geometry: Geometry,
    pub image_url: String,
}

impl From<&AnnotationDraft> for NewPolygonRow {
    fn from(draft: &AnnotationDraft) -> Self {
        let geometry = draft.boundary.to_geometry();
        Self {
            name: draft.name.clone(),
            color: draft.color.as_str().to_string(),
            area: draft.area(),
            coordinates: vec![draft.boundary.closed()],
            geometry,
            image_url: draft
                .image
                .as_ref()
                .map(|i| i.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Patch payload; only the changed columns are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolygonUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Vec<Position>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&AnnotationPatch> for PolygonUpdate {
    fn from(patch: &AnnotationPatch) -> Self {
        Self {
            name: patch.name.as_ref().map(|n| n.trim().to_string()),
            color: patch.color.as_ref().map(|c| c.as_str().to_string()),
            area: patch.boundary.as_ref().map(Ring::area),
            coordinates: patch.boundary.as_ref().map(|b| vec![b.closed()]),
            geometry: patch.boundary.as_ref().map(Ring::to_geometry),
            image_url: patch
                .image
                .as_ref()
                .map(|i| i.as_ref().map(|i| i.as_str().to_string()).unwrap_or_default()),
        }
    }
}
