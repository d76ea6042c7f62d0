/*!
 * # Rendering surface
 *
 * The map engine is consumed through two capability traits:
 *
 * - [`SurfaceFactory`] builds a surface bound to a display container.
 * - [`MapSurface`] is the live instance: style switching, source/layer CRUD,
 *   declarative event bindings, cursor and popups, and an event queue the host
 *   drains (style loaded, draw tool, pointer hits).
 *
 * Nothing outside [`SurfaceAdapter`] holds a surface. Engines are expected to drop
 * every custom source, layer and binding when a style load completes; the adapter's
 * `ensure_*` calls are idempotent so the reconciler can simply run again.
 *
 * [`HeadlessEngine`] is an in-memory engine with that exact behavior, used by the
 * terminal frontend and the tests.
 */

pub mod adapter;
pub mod headless;

pub use adapter::{Ensured, SurfaceAdapter};
pub use headless::{HeadlessEngine, HeadlessProbe};

use std::fmt;

use crate::models::{Feature, FeatureCollection, Geometry, Position};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("no map surface is attached")]
    NotAttached,
    #[error("map style has not finished loading")]
    NotReady,
    #[error("source {0:?} does not exist")]
    MissingSource(String),
    #[error("layer {0:?} does not exist")]
    MissingLayer(String),
    #[error("display container {0:?} is not available")]
    ContainerUnavailable(String),
    #[error("map engine error: {0}")]
    Engine(String),
}

/// Handle to the display element a surface renders into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container(String);

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A paint value: a constant, or read from each feature's properties.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintValue {
    Constant(String),
    Property(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerPaint {
    Fill {
        color: PaintValue,
        opacity: f64,
    },
    Line {
        color: PaintValue,
        width: f64,
        opacity: f64,
    },
    Circle {
        radius: f64,
        color: PaintValue,
        stroke_width: f64,
        stroke_color: PaintValue,
    },
}

/// Declarative description of a render layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: LayerPaint,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerEvent {
    Click,
    Enter,
    Leave,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// What the host does when a bound pointer event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAction {
    SetCursor(Cursor),
    AnnotationPopup,
    CategoryPopup,
}

/// One event binding, keyed by `(layer, event)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub layer: String,
    pub event: PointerEvent,
    pub action: BindingAction,
}

impl Binding {
    pub fn new(layer: impl Into<String>, event: PointerEvent, action: BindingAction) -> Self {
        Self {
            layer: layer.into(),
            event,
            action,
        }
    }
}

/// An informational popup anchored on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub anchor: Position,
    pub html: String,
}

/// Notifications a surface queues for its host.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// A style finished loading; custom state has been discarded.
    StyleLoaded { style_url: String },
    /// The user picked the polygon drawing tool.
    DrawStarted,
    /// The drawing tool finished a shape.
    DrawCreated { geometry: Geometry },
    /// A pointer event hit a feature of a bound layer.
    Pointer {
        event: PointerEvent,
        layer: String,
        feature: Option<Feature>,
        at: Position,
    },
}

/// A live map engine instance.
pub trait MapSurface {
    /// Start loading a style; completion is reported as [`SurfaceEvent::StyleLoaded`].
    fn set_style(&mut self, style_url: &str);
    fn is_style_loaded(&self) -> bool;

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError>;
    fn set_layer_visibility(&mut self, id: &str, visible: bool) -> Result<(), SurfaceError>;

    /// The action currently bound to `(layer, event)`, if any.
    fn binding(&self, layer: &str, event: PointerEvent) -> Option<BindingAction>;
    /// Bind, replacing whatever was bound to the same `(layer, event)`.
    fn bind(&mut self, binding: &Binding) -> Result<(), SurfaceError>;

    fn set_cursor(&mut self, cursor: Cursor);
    fn open_popup(&mut self, popup: Popup);

    fn poll_events(&mut self) -> Vec<SurfaceEvent>;

    /// Tear the instance down and clear its container.
    fn remove(&mut self);
}

pub trait SurfaceFactory {
    fn create(
        &mut self,
        container: &Container,
        style_url: &str,
    ) -> Result<Box<dyn MapSurface>, SurfaceError>;
}
