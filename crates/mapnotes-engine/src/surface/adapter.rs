use crate::models::FeatureCollection;
use crate::surface::{
    Binding, BindingAction, Container, Cursor, LayerSpec, MapSurface, PointerEvent, Popup,
    SurfaceError, SurfaceEvent, SurfaceFactory,
};

/// Outcome of an idempotent `ensure_*` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Existing,
}

/// Exclusive owner of the map surface.
///
/// Every other component talks to the engine through these methods. The `ensure_*`
/// family can be called any number of times; they only create what is missing and
/// refresh what is there.
pub struct SurfaceAdapter {
    factory: Box<dyn SurfaceFactory>,
    surface: Option<Box<dyn MapSurface>>,
    container: Option<Container>,
}

impl SurfaceAdapter {
    pub fn new(factory: impl SurfaceFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            surface: None,
            container: None,
        }
    }

    /// Create the surface inside `container`.
    ///
    /// Returns `true` only when a new surface was created. A second call while
    /// attached does nothing; a missing or refused container is logged and ignored.
    pub fn attach(&mut self, container: Option<&Container>, style_url: &str) -> bool {
        if self.surface.is_some() {
            log::debug!("Map surface already attached, ignoring attach");
            return false;
        }
        let Some(container) = container else {
            log::warn!("Map container not available yet, surface not created");
            return false;
        };

        match self.factory.create(container, style_url) {
            Ok(surface) => {
                log::info!("Attached map surface to {container} with style {style_url}");
                self.surface = Some(surface);
                self.container = Some(container.clone());
                true
            }
            Err(e) => {
                log::warn!("Could not create map surface in {container}: {e}");
                false
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Attached and the current style has finished loading
    pub fn is_ready(&self) -> bool {
        self.surface.as_ref().is_some_and(|s| s.is_style_loaded())
    }

    pub fn set_style(&mut self, style_url: &str) -> Result<(), SurfaceError> {
        let surface = self.surface_mut()?;
        log::info!("Switching map style to {style_url}");
        surface.set_style(style_url);
        Ok(())
    }

    /// Add the source if missing, otherwise replace its data.
    pub fn ensure_source(
        &mut self,
        id: &str,
        data: FeatureCollection,
    ) -> Result<Ensured, SurfaceError> {
        let surface = self.ready_surface()?;
        if surface.has_source(id) {
            surface.set_source_data(id, data)?;
            Ok(Ensured::Existing)
        } else {
            surface.add_source(id, data)?;
            Ok(Ensured::Created)
        }
    }

    /// Add the layer if missing; an existing layer gets the spec's visibility.
    pub fn ensure_layer(&mut self, spec: &LayerSpec) -> Result<Ensured, SurfaceError> {
        let surface = self.ready_surface()?;
        if surface.has_layer(&spec.id) {
            surface.set_layer_visibility(&spec.id, spec.visible)?;
            Ok(Ensured::Existing)
        } else {
            if !surface.has_source(&spec.source) {
                return Err(SurfaceError::MissingSource(spec.source.clone()));
            }
            surface.add_layer(spec)?;
            Ok(Ensured::Created)
        }
    }

    /// Bind unless the same action is already bound to `(layer, event)`.
    pub fn ensure_binding(&mut self, binding: &Binding) -> Result<Ensured, SurfaceError> {
        let surface = self.ready_surface()?;
        if surface.binding(&binding.layer, binding.event) == Some(binding.action) {
            return Ok(Ensured::Existing);
        }
        surface.bind(binding)?;
        Ok(Ensured::Created)
    }

    /// Replace a source's features. Fails, without touching anything, when the
    /// source does not exist (for instance while a style is reloading).
    pub fn set_feature_data(
        &mut self,
        source_id: &str,
        data: FeatureCollection,
    ) -> Result<(), SurfaceError> {
        let surface = self.surface_mut()?;
        if !surface.has_source(source_id) {
            log::warn!("Source {source_id} not present, skipping data update");
            return Err(SurfaceError::MissingSource(source_id.to_string()));
        }
        surface.set_source_data(source_id, data)
    }

    pub fn set_layer_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), SurfaceError> {
        let surface = self.surface_mut()?;
        if !surface.has_layer(layer_id) {
            return Err(SurfaceError::MissingLayer(layer_id.to_string()));
        }
        surface.set_layer_visibility(layer_id, visible)
    }

    pub fn binding_action(&self, layer: &str, event: PointerEvent) -> Option<BindingAction> {
        self.surface.as_ref()?.binding(layer, event)
    }

    pub fn set_cursor(&mut self, cursor: Cursor) -> Result<(), SurfaceError> {
        self.surface_mut()?.set_cursor(cursor);
        Ok(())
    }

    pub fn open_popup(&mut self, popup: Popup) -> Result<(), SurfaceError> {
        self.surface_mut()?.open_popup(popup);
        Ok(())
    }

    /// Pending engine notifications; empty when detached.
    pub fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        match self.surface.as_mut() {
            Some(surface) => surface.poll_events(),
            None => Vec::new(),
        }
    }

    /// Release the surface. Safe to call when nothing is attached.
    pub fn detach(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.remove();
            log::info!("Detached map surface");
        }
        self.container = None;
    }

    fn surface_mut(&mut self) -> Result<&mut Box<dyn MapSurface>, SurfaceError> {
        self.surface.as_mut().ok_or(SurfaceError::NotAttached)
    }

    fn ready_surface(&mut self) -> Result<&mut Box<dyn MapSurface>, SurfaceError> {
        let surface = self.surface_mut()?;
        if !surface.is_style_loaded() {
            return Err(SurfaceError::NotReady);
        }
        Ok(surface)
    }
}

impl Drop for SurfaceAdapter {
    fn drop(&mut self) {
        self.detach();
    }
}
