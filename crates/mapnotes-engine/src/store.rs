use crate::models::{Annotation, AnnotationId, AnnotationPatch, FeatureCollection};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("annotation {0} already exists")]
    DuplicateIdentifier(AnnotationId),
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
}

/// In-memory, newest-first collection of annotations.
///
/// This is the single source of truth the map renders from. The revision counter
/// increases on every successful mutation so callers can tell whether a re-render
/// is due.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    revision: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, newest first
    pub fn list(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert at the front
    pub fn add(&mut self, annotation: Annotation) -> Result<(), StoreError> {
        if self.contains(annotation.id()) {
            return Err(StoreError::DuplicateIdentifier(annotation.id().clone()));
        }
        self.annotations.insert(0, annotation);
        self.revision += 1;
        Ok(())
    }

    /// Apply a patch in place and return the updated annotation.
    pub fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<&Annotation, StoreError> {
        let index = self.position(id)?;
        self.annotations[index].apply(patch);
        self.revision += 1;
        Ok(&self.annotations[index])
    }

    /// Swap in the persisted version of an annotation, keeping its position.
    pub fn replace(
        &mut self,
        id: &AnnotationId,
        annotation: Annotation,
    ) -> Result<&Annotation, StoreError> {
        let index = self.position(id)?;
        if annotation.id() != id && self.contains(annotation.id()) {
            return Err(StoreError::DuplicateIdentifier(annotation.id().clone()));
        }
        self.annotations[index] = annotation;
        self.revision += 1;
        Ok(&self.annotations[index])
    }

    pub fn remove(&mut self, id: &AnnotationId) -> Result<Annotation, StoreError> {
        let index = self.position(id)?;
        self.revision += 1;
        Ok(self.annotations.remove(index))
    }

    /// Replace the whole collection, e.g. after fetching from the persistence service.
    ///
    /// Entries are ordered newest first; later duplicates of an id are dropped.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        let mut annotations = annotations;
        annotations.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let mut unique: Vec<Annotation> = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            if unique.iter().any(|a| a.id() == annotation.id()) {
                log::warn!("Dropping duplicate annotation {}", annotation.id());
                continue;
            }
            unique.push(annotation);
        }

        self.annotations = unique;
        self.revision += 1;
    }

    /// Project the store into the collection the annotation source renders.
    pub fn feature_collection(&self) -> FeatureCollection {
        self.annotations.iter().map(Annotation::to_feature).collect()
    }

    fn position(&self, id: &AnnotationId) -> Result<usize, StoreError> {
        self.annotations
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
