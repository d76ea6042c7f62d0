//! The rendered map stays equal to the store across mutations and style reloads.

use chrono::{Duration, TimeZone, Utc};
use mapnotes_engine::surface::Cursor;
use mapnotes_engine::{
    ANNOTATION_SOURCE, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch,
    AnnotationService, BasemapStyle, Color, Container, FILL_LAYER, HeadlessEngine, HeadlessProbe,
    ImageRef, MapWorkspace, MemoryService, OUTLINE_LAYER, Ring, ServiceError, StoreError,
    SurfaceEvent, WorkspaceError,
};
use pretty_assertions::assert_eq;

fn annotation(id: &str, minutes: i64, offset: f64) -> Annotation {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes);
    Annotation::new(
        AnnotationId::new(id),
        format!("Zone {id}"),
        Ring::new(vec![
            [offset, 0.0],
            [offset + 0.01, 0.0],
            [offset + 0.01, 0.01],
            [offset, 0.01],
        ])
        .unwrap(),
        Color::default(),
        created,
        None,
    )
}

fn seeded_service() -> MemoryService {
    MemoryService::with_records(vec![
        annotation("a", 0, 0.0),
        annotation("b", 10, 1.0),
        annotation("c", 5, 2.0),
    ])
}

fn ready_workspace(service: MemoryService) -> (MapWorkspace<MemoryService>, HeadlessProbe) {
    let (engine, probe) = HeadlessEngine::new();
    let mut workspace = MapWorkspace::new(engine, service);
    assert!(workspace.attach(Some(&Container::new("map")), BasemapStyle::Streets));
    probe.finish_style_load();
    assert!(workspace.pump().is_empty());
    workspace.load().unwrap();
    (workspace, probe)
}

fn assert_in_sync<S: AnnotationService>(workspace: &MapWorkspace<S>, probe: &HeadlessProbe) {
    assert_eq!(
        probe.source(ANNOTATION_SOURCE),
        Some(workspace.store().feature_collection())
    );
}

/// Sources, layers and bindings currently on the surface
fn surface_shape(probe: &HeadlessProbe) -> (Vec<String>, Vec<String>, usize) {
    (probe.source_ids(), probe.layer_ids(), probe.bindings().len())
}

#[test]
fn test_load_renders_newest_first() {
    let (workspace, probe) = ready_workspace(seeded_service());

    let ids: Vec<_> = workspace
        .store()
        .list()
        .iter()
        .map(|a| a.id().as_str())
        .collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_no_drift_after_mutations() {
    let (mut workspace, probe) = ready_workspace(seeded_service());

    workspace
        .update(&AnnotationId::new("a"), &AnnotationPatch::default().name("Renamed"))
        .unwrap();
    assert_in_sync(&workspace, &probe);

    workspace.delete(&AnnotationId::new("c")).unwrap();
    assert_in_sync(&workspace, &probe);

    workspace
        .update(
            &AnnotationId::new("b"),
            &AnnotationPatch::default().color(Color::parse("#9333ea").unwrap()),
        )
        .unwrap();
    assert_in_sync(&workspace, &probe);
    assert_eq!(workspace.store().len(), 2);
}

#[test]
fn test_update_unknown_id_is_not_found_and_changes_nothing() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    let before = workspace.store().list().to_vec();
    let missing = AnnotationId::new("missing");

    let result = workspace.update(&missing, &AnnotationPatch::default().name("Zone B"));

    assert_eq!(
        result,
        Err(WorkspaceError::Store(StoreError::NotFound(missing)))
    );
    assert!(!result.unwrap_err().is_user_visible());
    assert_eq!(workspace.store().list(), before.as_slice());
    assert_in_sync(&workspace, &probe);
}

/// Stores names in upper case, whatever the patch said.
struct UppercaseNames(MemoryService);

impl AnnotationService for UppercaseNames {
    fn list(&mut self) -> Result<Vec<Annotation>, ServiceError> {
        self.0.list()
    }

    fn create(&mut self, draft: &AnnotationDraft) -> Result<Annotation, ServiceError> {
        self.0.create(draft)
    }

    fn update(
        &mut self,
        id: &AnnotationId,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, ServiceError> {
        let mut normalized = patch.clone();
        normalized.name = patch.name.as_ref().map(|name| name.to_uppercase());
        self.0.update(id, &normalized)
    }

    fn delete(&mut self, id: &AnnotationId) -> Result<(), ServiceError> {
        self.0.delete(id)
    }

    fn upload_image(&mut self, bytes: &[u8], name: &str) -> Result<ImageRef, ServiceError> {
        self.0.upload_image(bytes, name)
    }

    fn delete_image(&mut self, name: &str) -> Result<(), ServiceError> {
        self.0.delete_image(name)
    }
}

#[test]
fn test_update_keeps_what_the_service_persisted() {
    let (engine, probe) = HeadlessEngine::new();
    let mut workspace = MapWorkspace::new(engine, UppercaseNames(seeded_service()));
    assert!(workspace.attach(Some(&Container::new("map")), BasemapStyle::Streets));
    probe.finish_style_load();
    workspace.pump();
    workspace.load().unwrap();

    let id = AnnotationId::new("a");
    workspace
        .update(&id, &AnnotationPatch::default().name("Zone Alpha"))
        .unwrap();

    assert_eq!(workspace.store().get(&id).unwrap().name(), "ZONE ALPHA");
    assert_eq!(
        workspace.service_mut().list().unwrap(),
        workspace.store().list().to_vec()
    );
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_owed_reconcile_runs_once_the_surface_is_ready() {
    let (engine, probe) = HeadlessEngine::new();
    let mut workspace = MapWorkspace::new(engine, seeded_service());
    assert!(workspace.attach(Some(&Container::new("map")), BasemapStyle::Streets));
    workspace.load().unwrap();
    assert!(probe.source_ids().is_empty());

    probe.finish_style_load();
    // the engine names a style other than the one requested
    workspace
        .handle_event(SurfaceEvent::StyleLoaded {
            style_url: "mapbox://styles/mapbox/dark-v10".to_string(),
        })
        .unwrap();

    assert_eq!(
        probe.source_ids(),
        vec!["annotations", "hospitals", "police", "shelters"]
    );
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_stale_load_without_owed_reconcile_changes_nothing() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    let before = surface_shape(&probe);

    workspace.set_style(BasemapStyle::Dark).unwrap();
    workspace
        .handle_event(SurfaceEvent::StyleLoaded {
            style_url: "mapbox://styles/mapbox/streets-v11".to_string(),
        })
        .unwrap();

    assert_eq!(surface_shape(&probe), before);
}

#[test]
fn test_style_change_restores_everything() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    let before = surface_shape(&probe);

    workspace.set_style(BasemapStyle::Satellite).unwrap();
    assert!(!workspace.is_ready());
    probe.finish_style_load();

    // wiped by the engine until the notification is handled
    assert!(probe.source_ids().is_empty());
    assert!(workspace.pump().is_empty());

    assert_eq!(surface_shape(&probe), before);
    assert_in_sync(&workspace, &probe);
    assert_eq!(
        probe.style_url().as_deref(),
        Some(BasemapStyle::Satellite.default_url())
    );
}

#[test]
fn test_reconcile_twice_matches_once() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    let once = surface_shape(&probe);
    let bindings = probe.bindings();

    let url = BasemapStyle::Streets.default_url();
    probe.emit_style_loaded(url);
    probe.emit_style_loaded(url);
    assert!(workspace.pump().is_empty());

    assert_eq!(surface_shape(&probe), once);
    assert_eq!(probe.bindings(), bindings);
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_latest_requested_style_wins() {
    let (mut workspace, probe) = ready_workspace(seeded_service());

    workspace.set_style(BasemapStyle::Dark).unwrap();
    workspace.set_style(BasemapStyle::Light).unwrap();

    // the superseded load reports in late
    probe.emit_style_loaded(BasemapStyle::Dark.default_url());
    assert!(workspace.pump().is_empty());
    assert!(!workspace.is_ready());

    probe.finish_style_load();
    assert!(workspace.pump().is_empty());

    assert_eq!(workspace.style(), BasemapStyle::Light);
    assert_eq!(
        probe.style_url().as_deref(),
        Some(BasemapStyle::Light.default_url())
    );
    assert_eq!(probe.layer_ids().len(), 5);
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_mutations_during_reload_are_not_lost() {
    let (mut workspace, probe) = ready_workspace(seeded_service());

    workspace.set_style(BasemapStyle::Dark).unwrap();
    workspace.delete(&AnnotationId::new("a")).unwrap();
    probe.finish_style_load();

    // source is gone until the reconcile runs; the render is skipped
    workspace
        .update(&AnnotationId::new("b"), &AnnotationPatch::default().name("Late"))
        .unwrap();
    assert_eq!(probe.source(ANNOTATION_SOURCE), None);

    workspace.pump();
    assert_in_sync(&workspace, &probe);
    assert_eq!(workspace.store().len(), 2);
}

#[test]
fn test_attach_is_deferred_until_style_loads() {
    let (engine, probe) = HeadlessEngine::new();
    let mut workspace = MapWorkspace::new(engine, MemoryService::new());

    assert!(!workspace.attach(None, BasemapStyle::Streets));
    assert!(workspace.attach(Some(&Container::new("map")), BasemapStyle::Dark));
    assert!(!workspace.attach(Some(&Container::new("map")), BasemapStyle::Light));
    assert_eq!(probe.surfaces_created(), 1);
    assert!(probe.source_ids().is_empty());

    probe.finish_style_load();
    workspace.pump();
    assert_eq!(
        probe.layer_ids()[..2],
        [FILL_LAYER.to_string(), OUTLINE_LAYER.to_string()]
    );
}

#[test]
fn test_detach_then_reattach() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    workspace.detach();
    workspace.detach();
    assert!(!probe.is_attached());

    assert!(workspace.attach(Some(&Container::new("map")), BasemapStyle::Streets));
    probe.finish_style_load();
    workspace.pump();
    assert_eq!(probe.surfaces_created(), 2);
    assert_in_sync(&workspace, &probe);
}

#[test]
fn test_hover_sets_cursor() {
    let (mut workspace, probe) = ready_workspace(seeded_service());

    assert!(probe.hover(FILL_LAYER, [0.005, 0.005]));
    workspace.pump();
    assert_eq!(probe.cursor(), Cursor::Pointer);

    assert!(probe.leave(FILL_LAYER));
    workspace.pump();
    assert_eq!(probe.cursor(), Cursor::Default);
}

#[test]
fn test_category_click_opens_popup() {
    let (mut workspace, probe) = ready_workspace(MemoryService::new());

    assert!(probe.click("hospitals", [77.2107, 28.5672]));
    workspace.pump();

    let popup = probe.last_popup().unwrap();
    assert_eq!(popup.html, "<h3>AIIMS Hospital</h3><p>Hospitals</p>");
    assert_eq!(popup.anchor, [77.2107, 28.5672]);
}

#[test]
fn test_hidden_layer_survives_reload_and_leaves_store_alone() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    let revision = workspace.store().revision();

    assert_eq!(workspace.toggle_layer("hospitals"), Ok(false));
    assert!(!probe.layer("hospitals").unwrap().visible);
    assert!(!probe.click("hospitals", [77.2107, 28.5672]));

    workspace.set_layer_visible("hospitals", false).unwrap();
    workspace.set_style(BasemapStyle::Dark).unwrap();
    probe.finish_style_load();
    workspace.pump();

    assert!(!probe.layer("hospitals").unwrap().visible);
    assert_eq!(workspace.store().revision(), revision);

    assert!(workspace.toggle_layer("traffic").is_err());
}

#[test]
fn test_service_failure_leaves_store_unchanged() {
    let (mut workspace, probe) = ready_workspace(seeded_service());
    workspace
        .service_mut()
        .fail(mapnotes_engine::Operation::Delete);

    let result = workspace.delete(&AnnotationId::new("a"));

    assert!(matches!(result, Err(WorkspaceError::Service(_))));
    assert!(result.unwrap_err().is_user_visible());
    assert_eq!(workspace.store().len(), 3);
    assert_in_sync(&workspace, &probe);
}
