//! Drawing a new annotation, from the draw tool firing to a confirmed draft.
//!
//! ```text
//! Idle ──begin──▶ Drawing ──complete──▶ Pending ──finish──▶ Idle
//!   ▲                │ invalid shape        │
//!   └────────────────┴──────── discard ─────┘
//! ```
//!
//! At most one pending annotation exists. Starting another draw, or receiving
//! another shape, while one is pending is refused and the pending one is kept.

use crate::geometry::{GeometryError, Ring};
use crate::models::{AnnotationDraft, Color, Geometry, ImageRef, MetadataError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DrawError {
    #[error("an annotation is already waiting for confirmation")]
    PendingExists,
    #[error("no annotation is waiting for confirmation")]
    NoPending,
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// A validated shape waiting for its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnnotation {
    boundary: Ring,
    area: f64,
}

impl PendingAnnotation {
    fn new(boundary: Ring) -> Self {
        let area = boundary.area();
        Self { boundary, area }
    }

    pub fn boundary(&self) -> &Ring {
        &self.boundary
    }

    /// Square meters
    pub fn area(&self) -> f64 {
        self.area
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What the user fills in for a pending annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationMetadata {
    pub name: String,
    /// Palette default when unset
    pub color: Option<Color>,
    pub image: Option<ImageUpload>,
}

impl AnnotationMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_image(mut self, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.image = Some(ImageUpload {
            file_name: file_name.into(),
            bytes,
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
    Pending(PendingAnnotation),
}

#[derive(Debug, Default)]
pub struct DrawSession {
    state: DrawState,
}

impl DrawSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingAnnotation> {
        match &self.state {
            DrawState::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.state == DrawState::Drawing
    }

    /// The draw tool was picked.
    pub fn begin(&mut self) -> Result<(), DrawError> {
        if self.pending().is_some() {
            return Err(DrawError::PendingExists);
        }
        self.state = DrawState::Drawing;
        Ok(())
    }

    /// The draw tool produced a shape.
    ///
    /// A shape may arrive without a preceding [`begin`](Self::begin); engines do
    /// not always report the tool being picked.
    pub fn complete(&mut self, geometry: &Geometry) -> Result<&PendingAnnotation, DrawError> {
        if self.pending().is_some() {
            return Err(DrawError::PendingExists);
        }
        match Ring::from_geometry(geometry) {
            Ok(boundary) => {
                self.state = DrawState::Pending(PendingAnnotation::new(boundary));
                self.pending().ok_or(DrawError::NoPending)
            }
            Err(e) => {
                self.state = DrawState::Idle;
                Err(e.into())
            }
        }
    }

    /// Build the draft for the pending shape; the session stays pending until
    /// [`finish`](Self::finish) so a failed save can be retried.
    pub fn confirm(
        &self,
        metadata: &AnnotationMetadata,
        image: Option<ImageRef>,
    ) -> Result<AnnotationDraft, DrawError> {
        let pending = self.pending().ok_or(DrawError::NoPending)?;
        let color = metadata.color.clone().unwrap_or_default();
        Ok(AnnotationDraft::new(
            &metadata.name,
            pending.boundary.clone(),
            color,
            image,
        )?)
    }

    /// The draft was persisted; back to idle.
    pub fn finish(&mut self) -> Option<PendingAnnotation> {
        match std::mem::take(&mut self.state) {
            DrawState::Pending(pending) => Some(pending),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Drop whatever is in progress. Returns whether anything was dropped.
    pub fn discard(&mut self) -> bool {
        let had_something = self.state != DrawState::Idle;
        self.state = DrawState::Idle;
        had_something
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            [0.0, 0.0],
            [0.01, 0.0],
            [0.01, 0.01],
            [0.0, 0.01],
            [0.0, 0.0],
        ]])
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = DrawSession::new();
        session.begin().unwrap();
        assert!(session.is_drawing());

        let area = session.complete(&square()).unwrap().area();
        assert!(area > 0.0);

        let draft = session
            .confirm(&AnnotationMetadata::named("Zone A"), None)
            .unwrap();
        assert_eq!(draft.name, "Zone A");
        assert_eq!(draft.color, Color::default());
        assert!(session.pending().is_some());

        assert!(session.finish().is_some());
        assert_eq!(session.state(), &DrawState::Idle);
    }

    #[test]
    fn test_invalid_shape_returns_to_idle() {
        let mut session = DrawSession::new();
        session.begin().unwrap();

        let result = session.complete(&Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]));
        assert!(matches!(result, Err(DrawError::Geometry(_))));
        assert_eq!(session.state(), &DrawState::Idle);
    }

    #[test]
    fn test_second_shape_while_pending_is_refused() {
        let mut session = DrawSession::new();
        session.complete(&square()).unwrap();
        let pending = session.pending().cloned();

        assert_eq!(session.begin(), Err(DrawError::PendingExists));
        assert!(matches!(
            session.complete(&square()),
            Err(DrawError::PendingExists)
        ));
        assert_eq!(session.pending().cloned(), pending);
    }

    #[test]
    fn test_confirm_requires_name_and_keeps_pending() {
        let mut session = DrawSession::new();
        session.complete(&square()).unwrap();

        let result = session.confirm(&AnnotationMetadata::named("  "), None);
        assert_eq!(result, Err(DrawError::Metadata(MetadataError::NameRequired)));
        assert!(session.pending().is_some());
    }

    #[test]
    fn test_confirm_without_pending() {
        let session = DrawSession::new();
        assert_eq!(
            session.confirm(&AnnotationMetadata::named("Zone A"), None),
            Err(DrawError::NoPending)
        );
    }

    #[test]
    fn test_discard() {
        let mut session = DrawSession::new();
        assert!(!session.discard());

        session.complete(&square()).unwrap();
        assert!(session.discard());
        assert_eq!(session.state(), &DrawState::Idle);
        assert!(session.finish().is_none());
    }
}
