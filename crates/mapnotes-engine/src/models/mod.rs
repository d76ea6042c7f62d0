pub mod annotation;
pub mod color;
pub mod feature;
pub mod layer;
pub mod style;

pub use annotation::{
    Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, ImageRef, MetadataError,
};
pub use color::{Color, InvalidColor, PALETTE, Swatch};
pub use feature::{Feature, FeatureCollection, Geometry, Position, Properties};
pub use layer::{LayerDescriptor, LayerError, LayerRegistry, MarkerStyle};
pub use style::{BasemapStyle, StyleCatalog, UnknownStyle};
