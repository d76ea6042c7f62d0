//! In-memory map engine.
//!
//! Behaves like a browser map engine as far as the synchronization core can observe:
//! style loads complete later (when the probe says so), a completed load wipes every
//! custom source, layer and binding, pointer events only fire for layers that exist,
//! are visible and have a handler bound. The [`HeadlessProbe`] drives those events
//! and exposes the surface state for inspection.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::geometry::point_in_ring;
use crate::models::{Feature, FeatureCollection, Geometry, Position};
use crate::surface::{
    Binding, BindingAction, Container, Cursor, LayerSpec, MapSurface, PointerEvent, Popup,
    SurfaceError, SurfaceEvent, SurfaceFactory,
};

/// Degrees within which a pointer counts as hitting a point feature.
const POINT_HIT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Default)]
struct HeadlessState {
    attached: bool,
    refuse_containers: bool,
    surfaces_created: usize,
    container: Option<Container>,
    loading_style: Option<String>,
    style_url: Option<String>,
    style_loaded: bool,
    sources: BTreeMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    bindings: Vec<Binding>,
    cursor: Cursor,
    popups: Vec<Popup>,
    events: VecDeque<SurfaceEvent>,
}

impl HeadlessState {
    fn clear_custom_state(&mut self) {
        self.sources.clear();
        self.layers.clear();
        self.bindings.clear();
    }

    fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    fn is_bound(&self, layer: &str, event: PointerEvent) -> bool {
        self.bindings
            .iter()
            .any(|b| b.layer == layer && b.event == event)
    }

    /// First feature of a visible layer under `at`
    fn hit(&self, layer_id: &str, at: Position) -> Option<Feature> {
        let layer = self.layer(layer_id).filter(|layer| layer.visible)?;
        let source = self.sources.get(&layer.source)?;
        source
            .features
            .iter()
            .find(|feature| feature_contains(feature, at))
            .cloned()
    }
}

fn feature_contains(feature: &Feature, at: Position) -> bool {
    match &feature.geometry {
        Geometry::Point(p) => {
            (p[0] - at[0]).abs() <= POINT_HIT_TOLERANCE && (p[1] - at[1]).abs() <= POINT_HIT_TOLERANCE
        }
        Geometry::Polygon(rings) => rings.first().is_some_and(|ring| point_in_ring(at, ring)),
        Geometry::LineString(_) => false,
    }
}

/// Factory half of the headless engine.
pub struct HeadlessEngine {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessEngine {
    pub fn new() -> (HeadlessEngine, HeadlessProbe) {
        let state = Rc::new(RefCell::new(HeadlessState::default()));
        (
            HeadlessEngine {
                state: Rc::clone(&state),
            },
            HeadlessProbe { state },
        )
    }
}

impl SurfaceFactory for HeadlessEngine {
    fn create(
        &mut self,
        container: &Container,
        style_url: &str,
    ) -> Result<Box<dyn MapSurface>, SurfaceError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_containers {
            return Err(SurfaceError::ContainerUnavailable(container.id().to_string()));
        }

        state.attached = true;
        state.surfaces_created += 1;
        state.container = Some(container.clone());
        state.loading_style = Some(style_url.to_string());
        state.style_url = None;
        state.style_loaded = false;
        state.clear_custom_state();
        state.events.clear();

        Ok(Box::new(HeadlessSurface {
            state: Rc::clone(&self.state),
        }))
    }
}

struct HeadlessSurface {
    state: Rc<RefCell<HeadlessState>>,
}

impl MapSurface for HeadlessSurface {
    fn set_style(&mut self, style_url: &str) {
        let mut state = self.state.borrow_mut();
        state.loading_style = Some(style_url.to_string());
        state.style_loaded = false;
    }

    fn is_style_loaded(&self) -> bool {
        self.state.borrow().style_loaded
    }

    fn has_source(&self, id: &str) -> bool {
        self.state.borrow().sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if state.sources.contains_key(id) {
            return Err(SurfaceError::Engine(format!(
                "There is already a source with ID \"{id}\""
            )));
        }
        state.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        let source = state
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::MissingSource(id.to_string()))?;
        *source = data;
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.state.borrow().layer(id).is_some()
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if state.layer(&spec.id).is_some() {
            return Err(SurfaceError::Engine(format!(
                "Layer with id \"{}\" already exists on this map",
                spec.id
            )));
        }
        if !state.sources.contains_key(&spec.source) {
            return Err(SurfaceError::MissingSource(spec.source.clone()));
        }
        state.layers.push(spec.clone());
        Ok(())
    }

    fn set_layer_visibility(&mut self, id: &str, visible: bool) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        let layer = state
            .layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .ok_or_else(|| SurfaceError::MissingLayer(id.to_string()))?;
        layer.visible = visible;
        Ok(())
    }

    fn binding(&self, layer: &str, event: PointerEvent) -> Option<BindingAction> {
        self.state
            .borrow()
            .bindings
            .iter()
            .find(|b| b.layer == layer && b.event == event)
            .map(|b| b.action)
    }

    fn bind(&mut self, binding: &Binding) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        state
            .bindings
            .retain(|b| !(b.layer == binding.layer && b.event == binding.event));
        state.bindings.push(binding.clone());
        Ok(())
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.state.borrow_mut().cursor = cursor;
    }

    fn open_popup(&mut self, popup: Popup) {
        self.state.borrow_mut().popups.push(popup);
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        self.state.borrow_mut().events.drain(..).collect()
    }

    fn remove(&mut self) {
        let mut state = self.state.borrow_mut();
        state.attached = false;
        state.container = None;
        state.loading_style = None;
        state.style_url = None;
        state.style_loaded = false;
        state.clear_custom_state();
        state.events.clear();
    }
}

/// Test and frontend handle onto a [`HeadlessEngine`].
#[derive(Clone)]
pub struct HeadlessProbe {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessProbe {
    /// Complete the pending style load: custom state is wiped, the style becomes
    /// active and a `StyleLoaded` notification is queued. Returns the loaded URL.
    pub fn finish_style_load(&self) -> Option<String> {
        let mut state = self.state.borrow_mut();
        if !state.attached {
            return None;
        }
        let url = state.loading_style.take()?;
        state.clear_custom_state();
        state.style_url = Some(url.clone());
        state.style_loaded = true;
        state.events.push_back(SurfaceEvent::StyleLoaded {
            style_url: url.clone(),
        });
        Some(url)
    }

    /// Queue a load notification without changing the surface, as a superseded
    /// load finishing late would.
    pub fn emit_style_loaded(&self, style_url: &str) {
        self.state
            .borrow_mut()
            .events
            .push_back(SurfaceEvent::StyleLoaded {
                style_url: style_url.to_string(),
            });
    }

    pub fn start_draw(&self) {
        self.state
            .borrow_mut()
            .events
            .push_back(SurfaceEvent::DrawStarted);
    }

    /// Finish a shape with the draw tool.
    pub fn draw(&self, geometry: Geometry) {
        self.state
            .borrow_mut()
            .events
            .push_back(SurfaceEvent::DrawCreated { geometry });
    }

    /// Click at `at` on `layer`; returns whether the engine fired an event.
    pub fn click(&self, layer: &str, at: Position) -> bool {
        self.pointer(layer, PointerEvent::Click, at)
    }

    pub fn hover(&self, layer: &str, at: Position) -> bool {
        self.pointer(layer, PointerEvent::Enter, at)
    }

    pub fn leave(&self, layer: &str) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.is_bound(layer, PointerEvent::Leave) {
            return false;
        }
        state.events.push_back(SurfaceEvent::Pointer {
            event: PointerEvent::Leave,
            layer: layer.to_string(),
            feature: None,
            at: [0.0, 0.0],
        });
        true
    }

    fn pointer(&self, layer: &str, event: PointerEvent, at: Position) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.is_bound(layer, event) {
            return false;
        }
        let Some(feature) = state.hit(layer, at) else {
            return false;
        };
        state.events.push_back(SurfaceEvent::Pointer {
            event,
            layer: layer.to_string(),
            feature: Some(feature),
            at,
        });
        true
    }

    /// Make the factory refuse to create surfaces.
    pub fn refuse_containers(&self, refuse: bool) {
        self.state.borrow_mut().refuse_containers = refuse;
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().attached
    }

    pub fn surfaces_created(&self) -> usize {
        self.state.borrow().surfaces_created
    }

    pub fn container(&self) -> Option<Container> {
        self.state.borrow().container.clone()
    }

    pub fn is_style_loaded(&self) -> bool {
        self.state.borrow().style_loaded
    }

    /// Style requested but not loaded yet
    pub fn loading_style(&self) -> Option<String> {
        self.state.borrow().loading_style.clone()
    }

    /// Style currently active
    pub fn style_url(&self) -> Option<String> {
        self.state.borrow().style_url.clone()
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.state.borrow().sources.keys().cloned().collect()
    }

    pub fn source(&self, id: &str) -> Option<FeatureCollection> {
        self.state.borrow().sources.get(id).cloned()
    }

    pub fn layer_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .layers
            .iter()
            .map(|layer| layer.id.clone())
            .collect()
    }

    pub fn layer(&self, id: &str) -> Option<LayerSpec> {
        self.state.borrow().layer(id).cloned()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.state.borrow().bindings.clone()
    }

    pub fn cursor(&self) -> Cursor {
        self.state.borrow().cursor
    }

    pub fn popups(&self) -> Vec<Popup> {
        self.state.borrow().popups.clone()
    }

    pub fn last_popup(&self) -> Option<Popup> {
        self.state.borrow().popups.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{LayerPaint, PaintValue};

    fn surface() -> (Box<dyn MapSurface>, HeadlessProbe) {
        let (mut engine, probe) = HeadlessEngine::new();
        let surface = engine
            .create(&Container::new("map"), "style://streets")
            .unwrap();
        (surface, probe)
    }

    fn square_feature() -> Feature {
        Feature::new(
            Geometry::Polygon(vec![vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 1.0],
                [0.0, 1.0],
                [0.0, 0.0],
            ]]),
            Default::default(),
        )
    }

    fn populate(surface: &mut Box<dyn MapSurface>) {
        surface
            .add_source("src", FeatureCollection::new(vec![square_feature()]))
            .unwrap();
        surface
            .add_layer(&LayerSpec {
                id: "fill".to_string(),
                source: "src".to_string(),
                paint: LayerPaint::Fill {
                    color: PaintValue::Constant("#000".to_string()),
                    opacity: 1.0,
                },
                visible: true,
            })
            .unwrap();
        surface
            .bind(&Binding::new(
                "fill",
                PointerEvent::Click,
                BindingAction::AnnotationPopup,
            ))
            .unwrap();
    }

    #[test]
    fn test_style_load_is_asynchronous() {
        let (mut surface, probe) = surface();
        assert!(!surface.is_style_loaded());
        assert!(surface.poll_events().is_empty());

        assert_eq!(probe.finish_style_load().as_deref(), Some("style://streets"));
        assert!(surface.is_style_loaded());
        assert_eq!(
            surface.poll_events(),
            vec![SurfaceEvent::StyleLoaded {
                style_url: "style://streets".to_string()
            }]
        );
    }

    #[test]
    fn test_style_load_wipes_custom_state() {
        let (mut surface, probe) = surface();
        probe.finish_style_load();
        populate(&mut surface);

        surface.set_style("style://dark");
        assert!(!surface.is_style_loaded());
        probe.finish_style_load();

        assert!(probe.source_ids().is_empty());
        assert!(probe.layer_ids().is_empty());
        assert!(probe.bindings().is_empty());
        assert_eq!(probe.style_url().as_deref(), Some("style://dark"));
    }

    #[test]
    fn test_click_fires_only_on_bound_visible_hits() {
        let (mut surface, probe) = surface();
        probe.finish_style_load();
        surface.poll_events();
        populate(&mut surface);

        assert!(probe.click("fill", [0.5, 0.5]));
        assert!(!probe.click("fill", [5.0, 5.0]));
        assert!(!probe.hover("fill", [0.5, 0.5]));

        surface.set_layer_visibility("fill", false).unwrap();
        assert!(!probe.click("fill", [0.5, 0.5]));

        let events = surface.poll_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SurfaceEvent::Pointer { event: PointerEvent::Click, layer, feature: Some(_), .. } if layer == "fill"
        ));
    }

    #[test]
    fn test_duplicate_source_is_an_engine_error() {
        let (mut surface, probe) = surface();
        probe.finish_style_load();
        surface.add_source("src", FeatureCollection::empty()).unwrap();
        assert!(matches!(
            surface.add_source("src", FeatureCollection::empty()),
            Err(SurfaceError::Engine(_))
        ));
    }

    #[test]
    fn test_refused_container() {
        let (mut engine, probe) = HeadlessEngine::new();
        probe.refuse_containers(true);
        assert!(matches!(
            engine.create(&Container::new("map"), "style://streets"),
            Err(SurfaceError::ContainerUnavailable(_))
        ));
        assert_eq!(probe.surfaces_created(), 0);
    }
}
