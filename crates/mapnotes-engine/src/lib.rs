pub mod categories;
pub mod draw;
pub mod geometry;
pub mod models;
pub mod popup;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod surface;
pub mod workspace;

// Re-export key types for easier usage
pub use categories::{CategoryPoint, builtin_layers, builtin_registry, category_layer};
pub use draw::{AnnotationMetadata, DrawError, DrawSession, DrawState, ImageUpload, PendingAnnotation};
pub use geometry::{GeometryError, Ring, ring_area};
pub use models::*;
pub use reconcile::{ANNOTATION_SOURCE, FILL_LAYER, OUTLINE_LAYER, Reconcile, Reconciler};
pub use service::{AnnotationService, MemoryService, Operation, ServiceError};
pub use store::{AnnotationStore, StoreError};
pub use surface::{
    Container, HeadlessEngine, HeadlessProbe, MapSurface, SurfaceAdapter, SurfaceError,
    SurfaceEvent, SurfaceFactory,
};
pub use workspace::{MapWorkspace, WorkspaceError};

/// Where the map opens before anything else moves it: `[lon, lat]` and zoom.
pub const INITIAL_CENTER: Position = [0.0, 20.0];
pub const INITIAL_ZOOM: f64 = 2.0;
