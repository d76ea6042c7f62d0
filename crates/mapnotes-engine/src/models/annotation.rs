use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::geometry::Ring;
use crate::models::{Color, Feature, Properties};

/// Stable identifier of an annotation, assigned by the persistence service or locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for records created without a server
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL (or storage handle) of an image attached to an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("a name is required")]
    NameRequired,
    #[error(transparent)]
    InvalidColor(#[from] super::color::InvalidColor),
}

/// A persisted polygon with its metadata.
///
/// The area is derived from the boundary at construction and whenever a patch
/// replaces the boundary; it cannot be set independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    name: String,
    boundary: Ring,
    color: Color,
    area_m2: f64,
    created_at: DateTime<Utc>,
    image: Option<ImageRef>,
}

impl Annotation {
    pub fn new(
        id: AnnotationId,
        name: impl Into<String>,
        boundary: Ring,
        color: Color,
        created_at: DateTime<Utc>,
        image: Option<ImageRef>,
    ) -> Self {
        let area_m2 = boundary.area();
        Self {
            id,
            name: name.into(),
            boundary,
            color,
            area_m2,
            created_at,
            image,
        }
    }

    /// Materialize a draft once the persistence service has assigned id and timestamp.
    pub fn from_draft(draft: AnnotationDraft, id: AnnotationId, created_at: DateTime<Utc>) -> Self {
        Self::new(
            id,
            draft.name,
            draft.boundary,
            draft.color,
            created_at,
            draft.image,
        )
    }

    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn boundary(&self) -> &Ring {
        &self.boundary
    }

    pub fn color(&self) -> &Color {
        &self.color
    }

    /// Area in square meters
    pub fn area(&self) -> f64 {
        self.area_m2
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn apply(&mut self, patch: &AnnotationPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(boundary) = &patch.boundary {
            self.boundary = boundary.clone();
            self.area_m2 = self.boundary.area();
        }
        if let Some(image) = &patch.image {
            self.image = image.clone();
        }
    }

    /// The GeoJSON feature the map renders for this annotation.
    ///
    /// Paint rules read `color` from the properties, so each feature carries its own.
    pub fn to_feature(&self) -> Feature {
        let mut properties = Properties::new();
        properties.insert("id".into(), Value::from(self.id.as_str()));
        properties.insert("name".into(), Value::from(self.name.as_str()));
        properties.insert("color".into(), Value::from(self.color.as_str()));
        properties.insert("area".into(), Value::from(self.area_m2));
        properties.insert(
            "time".into(),
            Value::from(self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if let Some(image) = &self.image {
            properties.insert("imageUrl".into(), Value::from(image.as_str()));
        }
        Feature::new(self.boundary.to_geometry(), properties)
    }
}

/// Everything needed to create an annotation, before the service assigns id and time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    pub name: String,
    pub boundary: Ring,
    pub color: Color,
    pub image: Option<ImageRef>,
}

impl AnnotationDraft {
    pub fn new(
        name: &str,
        boundary: Ring,
        color: Color,
        image: Option<ImageRef>,
    ) -> Result<Self, MetadataError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MetadataError::NameRequired);
        }
        Ok(Self {
            name: name.to_string(),
            boundary,
            color,
            image,
        })
    }

    pub fn area(&self) -> f64 {
        self.boundary.area()
    }
}

/// A partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub name: Option<String>,
    pub color: Option<Color>,
    pub boundary: Option<Ring>,
    /// `Some(None)` clears the image
    pub image: Option<Option<ImageRef>>,
}

impl AnnotationPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn boundary(mut self, boundary: Ring) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn image(mut self, image: Option<ImageRef>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none() && self.boundary.is_none() && self.image.is_none()
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err(MetadataError::NameRequired),
            _ => Ok(()),
        }
    }
}
