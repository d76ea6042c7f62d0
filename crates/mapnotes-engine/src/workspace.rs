use chrono::{Local, Utc};

use crate::categories::builtin_registry;
use crate::draw::{AnnotationMetadata, DrawError, DrawSession, DrawState, PendingAnnotation};
use crate::geometry::GeometryError;
use crate::models::{
    AnnotationId, AnnotationPatch, BasemapStyle, Feature, Geometry, ImageRef, LayerError,
    LayerRegistry, MetadataError, Position, StyleCatalog,
};
use crate::popup::{AnnotationSummary, category_popup};
use crate::reconcile::{ANNOTATION_SOURCE, Reconcile, Reconciler};
use crate::service::{AnnotationService, ServiceError};
use crate::store::{AnnotationStore, StoreError};
use crate::surface::{
    BindingAction, Container, PointerEvent, Popup, SurfaceAdapter, SurfaceError, SurfaceEvent,
    SurfaceFactory,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl WorkspaceError {
    /// Whether the error should be shown to the user rather than just logged.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            WorkspaceError::Service(_) | WorkspaceError::Draw(DrawError::Geometry(_))
        )
    }

    pub fn geometry(&self) -> Option<&GeometryError> {
        match self {
            WorkspaceError::Draw(DrawError::Geometry(e)) => Some(e),
            _ => None,
        }
    }
}

/// The annotation map: surface, store, draw session and persistence wired together.
///
/// Every store mutation is followed by pushing the full annotation feature collection
/// to the surface, and every style load by a reconcile run, so the surface always
/// shows the store regardless of how often the basemap changed in between.
pub struct MapWorkspace<S: AnnotationService> {
    adapter: SurfaceAdapter,
    store: AnnotationStore,
    draw: DrawSession,
    reconciler: Reconciler,
    layers: LayerRegistry,
    styles: StyleCatalog,
    style: BasemapStyle,
    service: S,
}

impl<S: AnnotationService> MapWorkspace<S> {
    pub fn new(factory: impl SurfaceFactory + 'static, service: S) -> Self {
        Self {
            adapter: SurfaceAdapter::new(factory),
            store: AnnotationStore::new(),
            draw: DrawSession::new(),
            reconciler: Reconciler::new(),
            layers: builtin_registry(),
            styles: StyleCatalog::new(),
            style: BasemapStyle::default(),
            service,
        }
    }

    pub fn with_layers(mut self, layers: LayerRegistry) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_styles(mut self, styles: StyleCatalog) -> Self {
        self.styles = styles;
        self
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    pub fn style(&self) -> BasemapStyle {
        self.style
    }

    pub fn styles(&self) -> &StyleCatalog {
        &self.styles
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn draw_state(&self) -> &DrawState {
        self.draw.state()
    }

    pub fn pending(&self) -> Option<&PendingAnnotation> {
        self.draw.pending()
    }

    pub fn is_attached(&self) -> bool {
        self.adapter.is_attached()
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    /// Create the map in `container` with `style`. See [`SurfaceAdapter::attach`].
    pub fn attach(&mut self, container: Option<&Container>, style: BasemapStyle) -> bool {
        let url = self.styles.url(style).to_string();
        if !self.adapter.attach(container, &url) {
            return false;
        }
        self.style = style;
        self.reconciler.request_style(&url);
        self.reconcile();
        true
    }

    pub fn detach(&mut self) {
        self.adapter.detach();
    }

    /// Replace the store with everything the service holds. Returns the count loaded.
    pub fn load(&mut self) -> Result<usize, WorkspaceError> {
        let annotations = self.service.list()?;
        let count = annotations.len();
        self.store.replace_all(annotations);
        self.render();
        log::info!("Loaded {count} annotations");
        Ok(count)
    }

    /// Switch the basemap. Custom layers come back once the new style has loaded
    /// and [`pump`](Self::pump) sees the notification.
    pub fn set_style(&mut self, style: BasemapStyle) -> Result<(), WorkspaceError> {
        let url = self.styles.url(style).to_string();
        if style == self.style && self.reconciler.requested_style() == Some(url.as_str()) {
            log::debug!("Style {style} already active");
            return Ok(());
        }
        self.adapter.set_style(&url)?;
        self.reconciler.request_style(&url);
        self.style = style;
        Ok(())
    }

    pub fn begin_draw(&mut self) -> Result<(), WorkspaceError> {
        Ok(self.draw.begin()?)
    }

    pub fn complete_draw(&mut self, geometry: &Geometry) -> Result<PendingAnnotation, WorkspaceError> {
        let pending = self.draw.complete(geometry)?.clone();
        log::info!("Shape drawn, {:.2} sq. meters awaiting details", pending.area());
        Ok(pending)
    }

    /// Persist the pending annotation with `metadata` and add it to the map.
    ///
    /// An image is uploaded first. If the record cannot be created the image is
    /// removed again and the annotation stays pending.
    pub fn confirm_pending(
        &mut self,
        metadata: AnnotationMetadata,
    ) -> Result<AnnotationId, WorkspaceError> {
        // validate before touching the service
        self.draw.confirm(&metadata, None)?;

        let uploaded = match &metadata.image {
            Some(image) => {
                let name = format!("{}_{}", Utc::now().timestamp_millis(), image.file_name);
                let reference = self.service.upload_image(&image.bytes, &name)?;
                Some((name, reference))
            }
            None => None,
        };
        let image: Option<ImageRef> = uploaded.as_ref().map(|(_, r)| r.clone());
        let draft = self.draw.confirm(&metadata, image)?;

        let created = match self.service.create(&draft) {
            Ok(created) => created,
            Err(e) => {
                if let Some((name, _)) = &uploaded
                    && let Err(cleanup) = self.service.delete_image(name)
                {
                    log::warn!("Could not remove orphaned image {name}: {cleanup}");
                }
                return Err(e.into());
            }
        };

        self.draw.finish();
        let id = created.id().clone();
        self.store.add(created)?;
        self.render();
        log::info!("Created annotation {id}");
        Ok(id)
    }

    pub fn discard_pending(&mut self) -> bool {
        self.draw.discard()
    }

    pub fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<(), WorkspaceError> {
        patch.validate()?;
        if !self.store.contains(id) {
            return Err(StoreError::NotFound(id.clone()).into());
        }
        let persisted = self.service.update(id, patch)?;
        self.store.replace(id, persisted)?;
        self.render();
        Ok(())
    }

    pub fn delete(&mut self, id: &AnnotationId) -> Result<(), WorkspaceError> {
        if !self.store.contains(id) {
            return Err(StoreError::NotFound(id.clone()).into());
        }
        self.service.delete(id)?;
        self.store.remove(id)?;
        self.render();
        log::info!("Deleted annotation {id}");
        Ok(())
    }

    /// Flip a category layer and return its new visibility.
    pub fn toggle_layer(&mut self, id: &str) -> Result<bool, WorkspaceError> {
        let visible = self.layers.toggle(id)?;
        self.apply_visibility(id, visible);
        Ok(visible)
    }

    pub fn set_layer_visible(&mut self, id: &str, visible: bool) -> Result<(), WorkspaceError> {
        if self.layers.set_visible(id, visible)? {
            self.apply_visibility(id, visible);
        }
        Ok(())
    }

    /// Handle every queued engine event. Errors are logged and returned.
    pub fn pump(&mut self) -> Vec<WorkspaceError> {
        let mut errors = Vec::new();
        for event in self.adapter.drain_events() {
            if let Err(e) = self.handle_event(event) {
                log::warn!("Map event failed: {e}");
                errors.push(e);
            }
        }
        errors
    }

    pub fn handle_event(&mut self, event: SurfaceEvent) -> Result<(), WorkspaceError> {
        match event {
            SurfaceEvent::StyleLoaded { style_url } => {
                if self.reconciler.on_style_loaded(&style_url) {
                    self.reconcile();
                } else if self.reconciler.is_deferred() && self.adapter.is_ready() {
                    log::debug!("Surface ready with a reconcile owed, running it now");
                    self.reconcile();
                }
                Ok(())
            }
            SurfaceEvent::DrawStarted => self.begin_draw(),
            SurfaceEvent::DrawCreated { geometry } => self.complete_draw(&geometry).map(|_| ()),
            SurfaceEvent::Pointer {
                event,
                layer,
                feature,
                at,
            } => self.handle_pointer(event, &layer, feature.as_ref(), at),
        }
    }

    fn handle_pointer(
        &mut self,
        event: PointerEvent,
        layer: &str,
        feature: Option<&Feature>,
        at: Position,
    ) -> Result<(), WorkspaceError> {
        let Some(action) = self.adapter.binding_action(layer, event) else {
            log::debug!("No binding for {event:?} on {layer}");
            return Ok(());
        };
        match action {
            BindingAction::SetCursor(cursor) => self.adapter.set_cursor(cursor)?,
            BindingAction::AnnotationPopup => {
                if let Some(feature) = feature {
                    let html = AnnotationSummary::from_feature(feature).to_html(&Local);
                    self.adapter.open_popup(Popup { anchor: at, html })?;
                }
            }
            BindingAction::CategoryPopup => {
                if let Some(feature) = feature {
                    let label = self
                        .layers
                        .get(layer)
                        .map(|l| l.label.as_str())
                        .unwrap_or(layer);
                    let html = category_popup(feature, label);
                    self.adapter.open_popup(Popup { anchor: at, html })?;
                }
            }
        }
        Ok(())
    }

    fn reconcile(&mut self) {
        match self
            .reconciler
            .run(&mut self.adapter, &self.store, &self.layers)
        {
            Ok(Reconcile::Applied(_)) => {}
            Ok(Reconcile::Deferred) => log::debug!("Reconcile deferred until the style loads"),
            Err(e) => log::warn!("Reconcile failed: {e}"),
        }
    }

    /// Push the store to the annotation source. A missing source means a style load
    /// is in flight; the reconciler seeds it from the store when it lands.
    fn render(&mut self) {
        if !self.adapter.is_attached() {
            return;
        }
        if let Err(e) = self
            .adapter
            .set_feature_data(ANNOTATION_SOURCE, self.store.feature_collection())
        {
            log::debug!("Annotation render skipped: {e}");
        }
    }

    fn apply_visibility(&mut self, id: &str, visible: bool) {
        if !self.adapter.is_ready() {
            return;
        }
        if let Err(e) = self.adapter.set_layer_visibility(id, visible) {
            log::debug!("Visibility of {id} applied at next reconcile: {e}");
        }
    }
}
