use crate::models::FeatureCollection;
use crate::reconcile::{ANNOTATION_SOURCE, FILL_LAYER, OUTLINE_LAYER};

/// Ids the annotation source and its layers occupy on the surface.
const RESERVED_IDS: [&str; 3] = [ANNOTATION_SOURCE, FILL_LAYER, OUTLINE_LAYER];

/// Circle paint for point layers
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub radius: f64,
    pub color: String,
    pub stroke_width: f64,
    pub stroke_color: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: 8.0,
            color: "#ff0000".to_string(),
            stroke_width: 2.0,
            stroke_color: "#ffffff".to_string(),
        }
    }
}

/// A read-only overlay layer with a fixed feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub features: FeatureCollection,
    pub marker: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    #[error("layer {0:?} is already registered")]
    Duplicate(String),
    #[error("no layer named {0:?}")]
    Unknown(String),
    #[error("layer id {0:?} is reserved for annotations")]
    Reserved(String),
}

/// Ordered set of overlay layers, unique by id.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerDescriptor>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layer: LayerDescriptor) -> Result<(), LayerError> {
        if RESERVED_IDS.contains(&layer.id.as_str()) {
            return Err(LayerError::Reserved(layer.id));
        }
        if self.get(&layer.id).is_some() {
            return Err(LayerError::Duplicate(layer.id));
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Set visibility; returns whether anything changed.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> Result<bool, LayerError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .ok_or_else(|| LayerError::Unknown(id.to_string()))?;
        let changed = layer.visible != visible;
        layer.visible = visible;
        Ok(changed)
    }

    /// Flip visibility and return the new value.
    pub fn toggle(&mut self, id: &str) -> Result<bool, LayerError> {
        let visible = self
            .get(id)
            .map(|layer| !layer.visible)
            .ok_or_else(|| LayerError::Unknown(id.to_string()))?;
        self.set_visible(id, visible)?;
        Ok(visible)
    }
}
