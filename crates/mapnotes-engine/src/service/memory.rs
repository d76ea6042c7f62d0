use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::models::{Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, ImageRef};
use crate::service::{AnnotationService, ServiceError};

/// Service calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
    UploadImage,
    DeleteImage,
}

/// In-process persistence with failure injection.
#[derive(Debug, Default)]
pub struct MemoryService {
    records: Vec<Annotation>,
    images: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<Operation>,
    calls: Vec<Operation>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Annotation>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Make every call of `operation` fail until [`recover`](Self::recover).
    pub fn fail(&mut self, operation: Operation) {
        self.failing.insert(operation);
    }

    pub fn recover(&mut self, operation: Operation) {
        self.failing.remove(&operation);
    }

    pub fn records(&self) -> &[Annotation] {
        &self.records
    }

    pub fn image_names(&self) -> Vec<&str> {
        self.images.keys().map(String::as_str).collect()
    }

    /// Every call made so far, failed ones included
    pub fn calls(&self) -> &[Operation] {
        &self.calls
    }

    fn enter(&mut self, operation: Operation) -> Result<(), ServiceError> {
        self.calls.push(operation);
        if self.failing.contains(&operation) {
            return Err(ServiceError::Transport(format!(
                "injected failure for {operation:?}"
            )));
        }
        Ok(())
    }

    fn position(&self, id: &AnnotationId) -> Result<usize, ServiceError> {
        self.records
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }
}

impl AnnotationService for MemoryService {
    fn list(&mut self) -> Result<Vec<Annotation>, ServiceError> {
        self.enter(Operation::List)?;
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(records)
    }

    fn create(&mut self, draft: &AnnotationDraft) -> Result<Annotation, ServiceError> {
        self.enter(Operation::Create)?;
        let annotation = Annotation::from_draft(draft.clone(), AnnotationId::generate(), Utc::now());
        self.records.push(annotation.clone());
        Ok(annotation)
    }

    fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, ServiceError> {
        self.enter(Operation::Update)?;
        let index = self.position(id)?;
        self.records[index].apply(patch);
        Ok(self.records[index].clone())
    }

    fn delete(&mut self, id: &AnnotationId) -> Result<(), ServiceError> {
        self.enter(Operation::Delete)?;
        let index = self.position(id)?;
        self.records.remove(index);
        Ok(())
    }

    fn upload_image(&mut self, bytes: &[u8], name: &str) -> Result<ImageRef, ServiceError> {
        self.enter(Operation::UploadImage)?;
        self.images.insert(name.to_string(), bytes.to_vec());
        Ok(ImageRef::new(format!("memory://images/{name}")))
    }

    fn delete_image(&mut self, name: &str) -> Result<(), ServiceError> {
        self.enter(Operation::DeleteImage)?;
        self.images.remove(name);
        Ok(())
    }
}
