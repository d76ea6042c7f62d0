//! Static point-of-interest overlays.
//!
//! Category layers are declarative: a fixed feature collection plus marker paint. The
//! reconciler registers them on every style load; nothing mutates them afterwards
//! except their visibility flag in the [`LayerRegistry`].

use serde_json::Value;

use crate::models::{
    Feature, Geometry, LayerDescriptor, LayerRegistry, MarkerStyle, Position, Properties,
};

/// A named point in a category layer
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPoint {
    pub name: String,
    pub position: Position,
}

impl CategoryPoint {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }

    fn to_feature(&self, label: &str) -> Feature {
        let mut properties = Properties::new();
        properties.insert("name".into(), Value::from(self.name.as_str()));
        properties.insert("category".into(), Value::from(label));
        Feature::new(Geometry::Point(self.position), properties)
    }
}

pub fn category_layer(
    id: &str,
    label: &str,
    visible: bool,
    points: &[CategoryPoint],
    marker: MarkerStyle,
) -> LayerDescriptor {
    LayerDescriptor {
        id: id.to_string(),
        label: label.to_string(),
        visible,
        features: points.iter().map(|p| p.to_feature(label)).collect(),
        marker,
    }
}

/// The overlays every map starts with.
pub fn builtin_layers() -> Vec<LayerDescriptor> {
    vec![
        category_layer(
            "hospitals",
            "Hospitals",
            true,
            &[
                CategoryPoint::new("AIIMS Hospital", [77.2107, 28.5672]),
                CategoryPoint::new("Safdarjung Hospital", [77.1909, 28.5646]),
            ],
            MarkerStyle::default(),
        ),
        category_layer(
            "police",
            "Police Stations",
            true,
            &[],
            MarkerStyle {
                color: "#1d4ed8".to_string(),
                ..MarkerStyle::default()
            },
        ),
        category_layer(
            "shelters",
            "Shelters",
            true,
            &[],
            MarkerStyle {
                color: "#16a34a".to_string(),
                ..MarkerStyle::default()
            },
        ),
    ]
}

pub fn builtin_registry() -> LayerRegistry {
    let mut registry = LayerRegistry::new();
    for layer in builtin_layers() {
        // ids above are distinct
        let _ = registry.register(layer);
    }
    registry
}
