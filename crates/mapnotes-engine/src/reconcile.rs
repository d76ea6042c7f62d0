//! Re-establishing custom map state after a style load.
//!
//! A completed style load leaves the surface with none of our sources, layers or
//! bindings. [`Reconciler::run`] derives all of them from the annotation store and
//! the layer registry and ensures each one exists, so running it on a fresh style,
//! on an untouched one, or twice in a row converges to the same surface.

use crate::models::{LayerDescriptor, LayerRegistry};
use crate::store::AnnotationStore;
use crate::surface::{
    Binding, BindingAction, Cursor, Ensured, LayerPaint, LayerSpec, PaintValue, PointerEvent,
    SurfaceAdapter, SurfaceError,
};

pub const ANNOTATION_SOURCE: &str = "annotations";
pub const FILL_LAYER: &str = "annotations-fill";
pub const OUTLINE_LAYER: &str = "annotations-outline";

const FILL_OPACITY: f64 = 0.6;
const OUTLINE_WIDTH: f64 = 2.0;
const OUTLINE_OPACITY: f64 = 0.8;

/// Fill and outline layers of the annotation source, painted from each feature's `color`.
pub fn annotation_layers() -> [LayerSpec; 2] {
    [
        LayerSpec {
            id: FILL_LAYER.to_string(),
            source: ANNOTATION_SOURCE.to_string(),
            paint: LayerPaint::Fill {
                color: PaintValue::Property("color".to_string()),
                opacity: FILL_OPACITY,
            },
            visible: true,
        },
        LayerSpec {
            id: OUTLINE_LAYER.to_string(),
            source: ANNOTATION_SOURCE.to_string(),
            paint: LayerPaint::Line {
                color: PaintValue::Property("color".to_string()),
                width: OUTLINE_WIDTH,
                opacity: OUTLINE_OPACITY,
            },
            visible: true,
        },
    ]
}

/// Circle layer for a category; its source shares the layer id.
pub fn category_layer_spec(layer: &LayerDescriptor) -> LayerSpec {
    LayerSpec {
        id: layer.id.clone(),
        source: layer.id.clone(),
        paint: LayerPaint::Circle {
            radius: layer.marker.radius,
            color: PaintValue::Constant(layer.marker.color.clone()),
            stroke_width: layer.marker.stroke_width,
            stroke_color: PaintValue::Constant(layer.marker.stroke_color.clone()),
        },
        visible: layer.visible,
    }
}

/// Every pointer binding the map should carry.
pub fn bindings(layers: &LayerRegistry) -> Vec<Binding> {
    let mut bindings = hover_bindings(FILL_LAYER);
    bindings.push(Binding::new(
        FILL_LAYER,
        PointerEvent::Click,
        BindingAction::AnnotationPopup,
    ));
    for layer in layers.iter() {
        bindings.extend(hover_bindings(&layer.id));
        bindings.push(Binding::new(
            layer.id.as_str(),
            PointerEvent::Click,
            BindingAction::CategoryPopup,
        ));
    }
    bindings
}

fn hover_bindings(layer: &str) -> Vec<Binding> {
    vec![
        Binding::new(
            layer,
            PointerEvent::Enter,
            BindingAction::SetCursor(Cursor::Pointer),
        ),
        Binding::new(
            layer,
            PointerEvent::Leave,
            BindingAction::SetCursor(Cursor::Default),
        ),
    ]
}

/// What a reconcile run did to the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub existing: usize,
}

impl ReconcileReport {
    fn record(&mut self, ensured: Ensured) {
        match ensured {
            Ensured::Created => self.created += 1,
            Ensured::Existing => self.existing += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Applied(ReconcileReport),
    /// The surface was not ready; the run happens on the next style load.
    Deferred,
}

/// Tracks which style load is current and whether a run is owed.
#[derive(Debug, Default)]
pub struct Reconciler {
    requested: Option<String>,
    deferred: bool,
    runs: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the style most recently asked of the surface.
    pub fn request_style(&mut self, style_url: &str) {
        self.requested = Some(style_url.to_string());
    }

    pub fn requested_style(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    /// A run was attempted before the surface was ready.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Completed runs so far
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Whether a load notification should trigger a run.
    ///
    /// Loads of anything but the latest requested style are stale and ignored.
    pub fn on_style_loaded(&mut self, style_url: &str) -> bool {
        match &self.requested {
            Some(requested) if requested != style_url => {
                log::debug!("Ignoring stale style load {style_url}, waiting for {requested}");
                false
            }
            _ => true,
        }
    }

    /// Ensure every source, layer and binding exists on the surface.
    pub fn run(
        &mut self,
        adapter: &mut SurfaceAdapter,
        store: &AnnotationStore,
        layers: &LayerRegistry,
    ) -> Result<Reconcile, SurfaceError> {
        if !adapter.is_ready() {
            log::debug!("Surface not ready, deferring reconcile");
            self.deferred = true;
            return Ok(Reconcile::Deferred);
        }

        let mut report = ReconcileReport::default();

        report.record(adapter.ensure_source(ANNOTATION_SOURCE, store.feature_collection())?);
        for spec in annotation_layers() {
            report.record(adapter.ensure_layer(&spec)?);
        }

        for layer in layers.iter() {
            report.record(adapter.ensure_source(&layer.id, layer.features.clone())?);
            report.record(adapter.ensure_layer(&category_layer_spec(layer))?);
        }

        for binding in bindings(layers) {
            report.record(adapter.ensure_binding(&binding)?);
        }

        self.deferred = false;
        self.runs += 1;
        log::debug!(
            "Reconciled surface: {} created, {} already present",
            report.created,
            report.existing
        );
        Ok(Reconcile::Applied(report))
    }
}
