//! Persistence collaborator.
//!
//! The core never talks to a database directly; everything durable goes through an
//! [`AnnotationService`]. Calls block until the round trip completes and the store is
//! only touched after a successful return.

pub mod memory;

pub use memory::{MemoryService, Operation};

use crate::models::{Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, ImageRef};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("could not reach the persistence service: {0}")]
    Transport(String),
    #[error("persistence service returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unexpected response from the persistence service: {0}")]
    Decode(String),
    #[error("persistence service has no annotation {0}")]
    NotFound(AnnotationId),
    #[error("persistence service rejected the request: {0}")]
    Rejected(String),
}

pub trait AnnotationService {
    /// All annotations, newest first.
    fn list(&mut self) -> Result<Vec<Annotation>, ServiceError>;

    /// Persist a draft; the service assigns id and creation time.
    fn create(&mut self, draft: &AnnotationDraft) -> Result<Annotation, ServiceError>;

    fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, ServiceError>;

    fn delete(&mut self, id: &AnnotationId) -> Result<(), ServiceError>;

    /// Store image bytes under `name` and return a reference the map can display.
    fn upload_image(&mut self, bytes: &[u8], name: &str) -> Result<ImageRef, ServiceError>;

    fn delete_image(&mut self, name: &str) -> Result<(), ServiceError>;
}

impl<S: AnnotationService + ?Sized> AnnotationService for Box<S> {
    fn list(&mut self) -> Result<Vec<Annotation>, ServiceError> {
        (**self).list()
    }

    fn create(&mut self, draft: &AnnotationDraft) -> Result<Annotation, ServiceError> {
        (**self).create(draft)
    }

    fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, ServiceError> {
        (**self).update(id, patch)
    }

    fn delete(&mut self, id: &AnnotationId) -> Result<(), ServiceError> {
        (**self).delete(id)
    }

    fn upload_image(&mut self, bytes: &[u8], name: &str) -> Result<ImageRef, ServiceError> {
        (**self).upload_image(bytes, name)
    }

    fn delete_image(&mut self, name: &str) -> Result<(), ServiceError> {
        (**self).delete_image(name)
    }
}
