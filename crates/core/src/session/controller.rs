//! The session controller.
//!
//! Owns the editing mode, the pending draft, the selected record and the one
//! active map interaction, and keeps the surface's panels and markers in line
//! with them. Store requests run on spawned tasks and report back through a
//! channel; [`SessionController::process_events`] applies the completions on
//! the caller's thread, checking each one against current state first.

use super::gesture::{DrawGesture, is_drag};
use super::notification::{Notification, Notifications};
use super::placement::{Pixel, place_panel};
use super::state::{
    Completion, DraftId, EditingMode, Panel, PanelState, PendingDraft, RecordRef, Selection,
};
use super::surface::{
    Cursor, Interaction, InteractionHandle, Layer, MapSurface, Marker, MarkerHandle, MarkerRole,
};
use crate::error::{AppError, Result};
use crate::geometry::{
    GeometryKind, GeometryRecord, LonLat, RecordPatch, normalize_ring, validate_coordinates,
};
use crate::projection::{MapPoint, from_lon_lat, project_all, to_lon_lat, unproject_all};
use crate::store::RemoteStore;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Drives one editing session against a store and a map surface.
///
/// Methods that talk to the store spawn onto the ambient tokio runtime, so
/// they must be called from within one.
pub struct SessionController<S: MapSurface> {
    store: Arc<dyn RemoteStore>,
    surface: S,
    notification_duration: Duration,

    // Editing state
    mode: EditingMode,
    draft: Option<PendingDraft>,
    selection: Option<Selection>,
    interaction: Option<(InteractionHandle, Interaction)>,
    gesture: DrawGesture,
    sketch: Option<MarkerHandle>,
    panel: Option<PanelState>,
    pending_delete: Option<RecordRef>,
    last_anchor: Option<Pixel>,

    // Last server view
    records: HashMap<GeometryKind, Vec<GeometryRecord>>,
    markers: HashMap<MarkerHandle, RecordRef>,
    reload_generation: HashMap<GeometryKind, u64>,

    // Request bookkeeping
    next_draft: u64,
    next_selection: u64,
    next_fetch: u64,
    in_flight: usize,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,

    notifications: Notifications,
}

impl<S: MapSurface> SessionController<S> {
    pub fn new(store: Arc<dyn RemoteStore>, surface: S, notification_duration: Duration) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            store,
            surface,
            notification_duration,
            mode: EditingMode::None,
            draft: None,
            selection: None,
            interaction: None,
            gesture: DrawGesture::default(),
            sketch: None,
            panel: None,
            pending_delete: None,
            last_anchor: None,
            records: HashMap::new(),
            markers: HashMap::new(),
            reload_generation: HashMap::new(),
            next_draft: 0,
            next_selection: 0,
            next_fetch: 0,
            in_flight: 0,
            tx,
            rx,
            notifications: Notifications::default(),
        }
    }

    pub fn mode(&self) -> EditingMode {
        self.mode
    }

    pub fn draft(&self) -> Option<&PendingDraft> {
        self.draft.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn panel(&self) -> Option<&PanelState> {
        self.panel.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&RecordRef> {
        self.pending_delete.as_ref()
    }

    pub fn active_interaction(&self) -> Option<Interaction> {
        self.interaction.map(|(_, interaction)| interaction)
    }

    /// Vertices of the line or polygon currently being drawn.
    pub fn sketch(&self) -> &[MapPoint] {
        self.gesture.vertices()
    }

    /// Records of `kind` as of the last reload.
    pub fn records(&self, kind: GeometryKind) -> &[GeometryRecord] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn find_record(&self, target: &RecordRef) -> Option<&GeometryRecord> {
        self.records
            .get(&target.kind)?
            .iter()
            .find(|r| r.id.as_ref() == Some(&target.id))
    }

    /// Handle of the persisted marker that represents `target`.
    pub fn marker_of(&self, target: &RecordRef) -> Option<MarkerHandle> {
        self.markers
            .iter()
            .find(|(_, r)| *r == target)
            .map(|(handle, _)| *handle)
    }

    pub fn notifications(&self) -> &[Notification] {
        self.notifications.active()
    }

    /// Number of store requests whose completion has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Centers the map and loads every layer from the store.
    pub fn start(&mut self, center: LonLat, zoom: f64) {
        self.surface.set_view(from_lon_lat(center), zoom);
        self.reload_all();
    }

    // ------------------------------------------------------------------
    // Mode transitions
    // ------------------------------------------------------------------

    /// Arms placement of a new geometry of `kind`.
    ///
    /// A no-op if the same add mode is already active; any other mode is
    /// cancelled first.
    pub fn begin_add(&mut self, kind: GeometryKind) {
        let target = EditingMode::adding(kind);
        if self.mode == target {
            debug!("{target:?} already active");
            return;
        }

        self.reset();
        if kind.has_vertices() {
            self.gesture.begin(kind);
            self.attach(Interaction::Draw(kind));
        } else {
            self.attach(Interaction::Place(kind));
        }
        self.surface.set_cursor(Cursor::Crosshair);
        self.set_mode(target);
    }

    /// Discards the draft and any edit in progress and returns to
    /// [`EditingMode::None`]. Never touches the store.
    pub fn cancel_draft(&mut self) {
        self.reset();
    }

    /// Attaches a drag handle to a stored point.
    pub fn begin_drag_update(&mut self, target: &RecordRef) -> Result<()> {
        if target.kind != GeometryKind::Point {
            return self.fail(AppError::validation("only points can be dragged"));
        }
        let marker = self.begin_edit_selection(target)?;
        self.attach(Interaction::Translate(marker));
        self.surface.set_cursor(Cursor::Move);
        self.set_mode(EditingMode::MapDragUpdate);
        Ok(())
    }

    /// Attaches a vertex editor to a stored line or polygon.
    ///
    /// Any previously attached editor is detached first.
    pub fn begin_vertex_edit(&mut self, target: &RecordRef) -> Result<()> {
        if !target.kind.has_vertices() {
            return self.fail(AppError::validation("only lines and polygons have vertices to edit"));
        }
        let marker = self.begin_edit_selection(target)?;
        self.attach(Interaction::ModifyVertices(marker));
        self.surface.set_cursor(Cursor::Move);
        self.set_mode(EditingMode::VertexEdit);
        Ok(())
    }

    /// Opens the detail panel of a displayed record, centered in the
    /// viewport.
    pub fn select(&mut self, target: &RecordRef) -> Result<()> {
        let center = self.surface.viewport().center();
        self.select_from(target, center)
    }

    /// Fetches `target` from the store and opens its detail panel with what
    /// the store returned.
    ///
    /// The panel only opens if this is still the latest fetch and no edit
    /// has started meanwhile. A record that no longer exists is reported and
    /// its layer reloaded.
    pub fn show(&mut self, target: &RecordRef) {
        self.next_fetch += 1;
        let ticket = self.next_fetch;
        let target = target.clone();
        let store = Arc::clone(&self.store);
        debug!("fetching {target}");
        self.spawn(async move {
            let result = store.get(target.kind, target.id.clone()).await;
            Completion::Fetched {
                record: target,
                ticket,
                result,
            }
        });
    }

    /// Closes whatever panel is open, with the meaning that panel has.
    pub fn dismiss_panel(&mut self) {
        match self.panel.as_ref().map(|p| p.panel.clone()) {
            Some(Panel::NameEntry { .. }) => self.cancel_draft(),
            Some(Panel::RecordDetail { .. }) => {
                self.selection = None;
                self.hide_panel();
            }
            Some(Panel::ConfirmDelete { .. }) => self.dismiss_delete(),
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Map input
    // ------------------------------------------------------------------

    /// Primary click on the map at display `coordinate` / viewport `pixel`.
    pub fn on_map_click(&mut self, coordinate: MapPoint, pixel: Pixel) {
        if self.pending_delete.is_some() {
            debug!("map input ignored while a delete awaits confirmation");
            return;
        }
        if self.draft.as_ref().is_some_and(|d| d.committing) {
            debug!("map input ignored while the draft is being saved");
            return;
        }

        self.last_anchor = Some(pixel);
        match self.mode {
            EditingMode::AddPoint => {
                let position = to_lon_lat(coordinate);
                if let Err(error) = position.validate() {
                    self.report(&error);
                    return;
                }
                self.place_draft(GeometryKind::Point, vec![position], pixel);
            }
            EditingMode::AddLine | EditingMode::AddPolygon => self.extend_sketch(coordinate),
            EditingMode::MapDragUpdate | EditingMode::VertexEdit => {}
            EditingMode::None => self.select_at(pixel),
        }
    }

    /// Removes the last vertex of the line or polygon being drawn.
    pub fn undo_vertex(&mut self) {
        if self.gesture.undo().is_none() {
            return;
        }
        if let Some(handle) = self.sketch {
            if self.gesture.is_empty() {
                self.surface.remove_marker(handle);
                self.sketch = None;
            } else {
                self.surface.update_marker(handle, self.gesture.vertices().to_vec());
            }
        }
    }

    /// Explicit finish of the draw gesture, using the vertices clicked so far.
    pub fn finish_drawing(&mut self, pixel: Pixel) -> Result<()> {
        let vertices = self.gesture.vertices().to_vec();
        self.on_draw_complete(vertices, pixel)
    }

    /// A finished draw gesture, for surfaces that collect vertices themselves.
    pub fn on_draw_complete(&mut self, vertices: Vec<MapPoint>, pixel: Pixel) -> Result<()> {
        let Some(kind) = self.mode.adding_kind().filter(|k| k.has_vertices()) else {
            return Err(AppError::invalid_state("no line or polygon is being drawn"));
        };

        let coordinates = normalize_ring(kind, unproject_all(&vertices));
        if let Err(error) = validate_coordinates(kind, &coordinates) {
            return self.fail(error);
        }

        self.discard_sketch();
        self.last_anchor = Some(pixel);
        self.place_draft(kind, coordinates, pixel);
        Ok(())
    }

    /// End of a marker drag. Only a real drag of the selected point counts.
    pub fn on_drag_end(&mut self, handle: MarkerHandle, from: Pixel, to: Pixel, coordinate: MapPoint) {
        if self.mode != EditingMode::MapDragUpdate {
            return;
        }
        let Some(target) = self.selected_target(handle) else {
            debug!("drag of an unselected marker ignored");
            return;
        };
        if !is_drag(from, to) {
            return;
        }

        self.last_anchor = Some(to);
        let patch = RecordPatch::reshape(vec![to_lon_lat(coordinate)]);
        if self.update_record(target, patch).is_err() {
            self.restore_selected_marker();
        }
    }

    /// End of a vertex drag in the vertex editor.
    pub fn on_vertex_drag_end(&mut self, handle: MarkerHandle, vertices: Vec<MapPoint>) {
        if self.mode != EditingMode::VertexEdit {
            return;
        }
        let Some(target) = self.selected_target(handle) else {
            debug!("vertex drag of an unselected marker ignored");
            return;
        };

        let patch = RecordPatch::reshape(unproject_all(&vertices));
        if self.update_record(target, patch).is_err() {
            self.restore_selected_marker();
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Saves the draft under `name`.
    ///
    /// The draft and mode stay in place until the store confirms; a failure
    /// leaves them for a retry.
    pub fn commit_draft(&mut self, name: &str) -> Result<()> {
        let Some(draft) = self.draft.as_ref() else {
            return Err(AppError::invalid_state("there is no draft to save"));
        };
        if draft.committing {
            return Err(AppError::invalid_state("the draft is already being saved"));
        }

        let id = draft.id;
        let mut record = draft.record.clone();
        record.name = name.trim().to_string();
        if let Err(error) = record.validate() {
            return self.fail(error);
        }

        if let Some(draft) = self.draft.as_mut() {
            draft.committing = true;
        }

        let kind = record.kind;
        let store = Arc::clone(&self.store);
        debug!("creating {kind} {:?}", record.name);
        self.spawn(async move {
            let result = store.create(record).await;
            Completion::Created {
                draft: id,
                kind,
                result,
            }
        });
        Ok(())
    }

    /// Re-fetches `target`, applies `patch` and stores the result.
    pub fn update_record(&mut self, target: RecordRef, patch: RecordPatch) -> Result<()> {
        if let Err(error) = patch.validate(target.kind) {
            return self.fail(error);
        }

        let selection = self
            .selection
            .as_ref()
            .filter(|s| s.is(&target))
            .map(|s| s.generation);
        let store = Arc::clone(&self.store);
        debug!("updating {target}");
        self.spawn(async move {
            let result: Result<()> = async {
                let current = store.get(target.kind, target.id.clone()).await?;
                store.update(patch.apply(current)).await
            }
            .await;
            Completion::Updated {
                record: target,
                selection,
                result,
            }
        });
        Ok(())
    }

    pub fn rename_record(&mut self, target: RecordRef, name: &str) -> Result<()> {
        self.update_record(target, RecordPatch::rename(name))
    }

    /// First phase of a delete: asks for confirmation. Nothing is sent yet.
    pub fn delete_record(&mut self, target: RecordRef) -> Result<()> {
        if self.find_record(&target).is_none() {
            return self.fail(AppError::NotFound {
                kind: target.kind,
                id: target.id,
            });
        }

        let anchor = self.anchor();
        self.reset();
        self.pending_delete = Some(target.clone());
        self.show_panel(Panel::ConfirmDelete { record: target }, anchor);
        Ok(())
    }

    /// Second phase of a delete: the user confirmed, issue the request.
    pub fn confirm_delete(&mut self) -> Result<()> {
        let Some(target) = self.pending_delete.take() else {
            return Err(AppError::invalid_state("no delete is awaiting confirmation"));
        };
        self.hide_panel();

        let store = Arc::clone(&self.store);
        debug!("deleting {target}");
        self.spawn(async move {
            let result = store.delete(target.kind, target.id.clone()).await;
            Completion::Deleted {
                record: target,
                result,
            }
        });
        Ok(())
    }

    pub fn dismiss_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.hide_panel();
        }
    }

    /// Reloads one layer from the store.
    pub fn reload(&mut self, kind: GeometryKind) {
        self.request_reload(kind, false);
    }

    /// Reloads one layer for the table view; an empty result is reported.
    pub fn query(&mut self, kind: GeometryKind) {
        self.request_reload(kind, true);
    }

    pub fn reload_all(&mut self) {
        for kind in GeometryKind::ALL {
            self.reload(kind);
        }
    }

    // ------------------------------------------------------------------
    // Completion handling
    // ------------------------------------------------------------------

    /// Applies every completion that has already arrived. Never blocks.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            handled += 1;
        }
        handled
    }

    /// Waits for the next completion and applies it.
    ///
    /// Returns `false` when nothing is outstanding.
    pub async fn next_event(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Applies completions until no request is outstanding, including the
    /// reloads that completions themselves trigger.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    /// Drops notifications whose display time has passed.
    pub fn tick(&mut self, now: Instant) {
        self.notifications.prune(now);
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Created {
                draft,
                kind,
                result,
            } => self.apply_created(draft, kind, result),
            Completion::Updated {
                record,
                selection,
                result,
            } => self.apply_updated(record, selection, result),
            Completion::Deleted { record, result } => self.apply_deleted(record, result),
            Completion::Fetched {
                record,
                ticket,
                result,
            } => self.apply_fetched(record, ticket, result),
            Completion::Loaded {
                kind,
                generation,
                user_query,
                result,
            } => self.apply_loaded(kind, generation, user_query, result),
        }
    }

    fn apply_created(&mut self, draft: DraftId, kind: GeometryKind, result: Result<GeometryRecord>) {
        let current = self.draft.as_ref().is_some_and(|d| d.id == draft);
        match result {
            Ok(record) => {
                info!("saved {kind} {:?}", record.name);
                if current {
                    self.reset();
                } else {
                    debug!("create finished for a draft that is no longer shown");
                }
                self.reload(kind);
            }
            Err(error) if current => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.committing = false;
                }
                self.report(&error);
            }
            Err(error) => warn!("dropping failed create of a discarded draft: {error}"),
        }
    }

    fn apply_updated(&mut self, target: RecordRef, selection: Option<u64>, result: Result<()>) {
        let tied = selection.is_some();
        let stale = tied && self.selection.as_ref().map(|s| s.generation) != selection;

        if stale {
            match result {
                Ok(()) => self.reload(target.kind),
                Err(error) => warn!("ignoring failed update of {target}, no longer selected: {error}"),
            }
            return;
        }

        match result {
            Ok(()) => {
                info!("updated {target}");
                if tied && self.mode == EditingMode::MapDragUpdate {
                    self.reset();
                }
                self.reload(target.kind);
            }
            Err(error @ AppError::NotFound { .. }) => {
                if tied {
                    self.reset();
                }
                self.report(&error);
                self.reload(target.kind);
            }
            Err(error) => {
                if tied {
                    self.restore_selected_marker();
                }
                self.report(&error);
            }
        }
    }

    fn apply_deleted(&mut self, target: RecordRef, result: Result<()>) {
        match result {
            Ok(()) => {
                info!("deleted {target}");
                if self.selection.as_ref().is_some_and(|s| s.is(&target)) {
                    self.reset();
                }
                self.reload(target.kind);
            }
            Err(error @ AppError::NotFound { .. }) => {
                self.report(&error);
                self.reload(target.kind);
            }
            Err(error) => self.report(&error),
        }
    }

    fn apply_fetched(&mut self, target: RecordRef, ticket: u64, result: Result<GeometryRecord>) {
        if ticket != self.next_fetch {
            debug!("superseded fetch of {target} ignored");
            return;
        }
        match result {
            Ok(record) => {
                if self.mode != EditingMode::None || self.pending_delete.is_some() {
                    debug!("fetched {target} after another action started");
                    return;
                }
                self.refresh_cached(&target, &record);
                self.reset();
                self.next_selection += 1;
                self.selection = Some(Selection {
                    generation: self.next_selection,
                    record,
                    marker: self.marker_of(&target),
                });
                let center = self.surface.viewport().center();
                self.show_panel(Panel::RecordDetail { record: target }, center);
            }
            Err(error @ AppError::NotFound { .. }) => {
                if self.selection.as_ref().is_some_and(|s| s.is(&target)) {
                    self.reset();
                }
                self.report(&error);
                self.reload(target.kind);
            }
            Err(error) => self.report(&error),
        }
    }

    fn apply_loaded(
        &mut self,
        kind: GeometryKind,
        generation: u64,
        user_query: bool,
        result: Result<Vec<GeometryRecord>>,
    ) {
        if self.reload_generation.get(&kind) != Some(&generation) {
            debug!("superseded {kind} reload ignored");
            return;
        }
        match result {
            Ok(records) => {
                if user_query && records.is_empty() {
                    self.notify_info("No data available");
                }
                self.replace_layer(kind, records);
            }
            Err(error) => self.report(&error),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn set_mode(&mut self, mode: EditingMode) {
        if self.mode != mode {
            debug!("mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// Returns to `None` with no draft, selection, interaction or panel.
    fn reset(&mut self) {
        self.discard_draft();
        self.discard_sketch();
        self.detach();
        self.selection = None;
        self.pending_delete = None;
        self.hide_panel();
        self.surface.set_cursor(Cursor::Default);
        self.set_mode(EditingMode::None);
    }

    fn attach(&mut self, interaction: Interaction) {
        self.detach();
        let handle = self.surface.attach_interaction(interaction);
        self.interaction = Some((handle, interaction));
    }

    fn detach(&mut self) {
        if let Some((handle, _)) = self.interaction.take() {
            self.surface.detach_interaction(handle);
        }
    }

    fn discard_draft(&mut self) {
        if let Some(draft) = self.draft.take() {
            self.surface.remove_marker(draft.marker);
            self.surface.remove_marker(draft.highlight);
        }
    }

    fn discard_sketch(&mut self) {
        self.gesture.clear();
        if let Some(handle) = self.sketch.take() {
            self.surface.remove_marker(handle);
        }
    }

    fn anchor(&self) -> Pixel {
        self.last_anchor
            .unwrap_or_else(|| self.surface.viewport().center())
    }

    fn show_panel(&mut self, panel: Panel, anchor: Pixel) {
        let size = self.surface.panel_size(&panel);
        let position = place_panel(anchor, size, self.surface.viewport());
        self.surface.show_panel(&panel, position);
        self.panel = Some(PanelState { panel, position });
    }

    fn hide_panel(&mut self) {
        if self.panel.take().is_some() {
            self.surface.hide_panel();
        }
    }

    fn place_draft(&mut self, kind: GeometryKind, coordinates: Vec<LonLat>, anchor: Pixel) {
        self.discard_draft();

        let geometry = project_all(&coordinates);
        let focus: Vec<MapPoint> = geometry.last().copied().into_iter().collect();
        let marker = self.surface.add_marker(
            Layer::Overlay,
            Marker {
                role: MarkerRole::Draft,
                kind,
                geometry,
            },
        );
        let highlight = self.surface.add_marker(
            Layer::Overlay,
            Marker {
                role: MarkerRole::Highlight,
                kind: GeometryKind::Point,
                geometry: focus,
            },
        );

        self.next_draft += 1;
        self.draft = Some(PendingDraft {
            id: DraftId(self.next_draft),
            record: GeometryRecord::new(kind, String::new(), coordinates),
            marker,
            highlight,
            committing: false,
        });
        self.show_panel(Panel::NameEntry { kind }, anchor);
    }

    fn extend_sketch(&mut self, coordinate: MapPoint) {
        let Some(kind) = self.mode.adding_kind() else {
            return;
        };
        if self.draft.is_some() {
            // Clicking after the gesture finished starts a new one.
            self.discard_draft();
            self.hide_panel();
        }
        if self.gesture.kind().is_none() {
            self.gesture.begin(kind);
        }

        self.gesture.push(coordinate);
        let geometry = self.gesture.vertices().to_vec();
        match self.sketch {
            Some(handle) => self.surface.update_marker(handle, geometry),
            None => {
                let handle = self.surface.add_marker(
                    Layer::Overlay,
                    Marker {
                        role: MarkerRole::Draft,
                        kind,
                        geometry,
                    },
                );
                self.sketch = Some(handle);
            }
        }
    }

    fn select_at(&mut self, pixel: Pixel) {
        let hit = self
            .surface
            .hit_test(pixel)
            .and_then(|handle| self.markers.get(&handle).cloned());
        match hit {
            Some(target) => {
                if let Err(error) = self.select_from(&target, pixel) {
                    debug!("click on {target} did not select it: {error}");
                }
            }
            None => {
                if self.selection.take().is_some() {
                    self.hide_panel();
                }
            }
        }
    }

    fn select_from(&mut self, target: &RecordRef, anchor: Pixel) -> Result<()> {
        self.begin_selection(target)?;
        self.show_panel(
            Panel::RecordDetail {
                record: target.clone(),
            },
            anchor,
        );
        Ok(())
    }

    /// Selects `target` after ending whatever else was going on.
    fn begin_selection(&mut self, target: &RecordRef) -> Result<()> {
        let Some(record) = self.find_record(target).cloned() else {
            return self.fail(AppError::NotFound {
                kind: target.kind,
                id: target.id.clone(),
            });
        };

        self.reset();
        self.next_selection += 1;
        self.selection = Some(Selection {
            generation: self.next_selection,
            record,
            marker: self.marker_of(target),
        });
        Ok(())
    }

    /// Selection for an on-map edit; the record must be displayed.
    fn begin_edit_selection(&mut self, target: &RecordRef) -> Result<MarkerHandle> {
        self.begin_selection(target)?;
        match self.selection.as_ref().and_then(|s| s.marker) {
            Some(marker) => Ok(marker),
            None => {
                self.reset();
                self.fail(AppError::invalid_state(format!("{target} is not displayed")))
            }
        }
    }

    fn selected_target(&self, handle: MarkerHandle) -> Option<RecordRef> {
        self.selection
            .as_ref()
            .filter(|s| s.marker == Some(handle))
            .and_then(Selection::record_ref)
    }

    /// Puts the selected marker back where the store last had it.
    fn restore_selected_marker(&mut self) {
        if let Some(selection) = self.selection.as_ref() {
            if let Some(marker) = selection.marker {
                let geometry = project_all(&selection.record.coordinates);
                self.surface.update_marker(marker, geometry);
            }
        }
    }

    /// Replaces the cached copy of `target`, and its marker geometry, with a
    /// freshly fetched record.
    fn refresh_cached(&mut self, target: &RecordRef, record: &GeometryRecord) {
        let cached = self
            .records
            .get_mut(&target.kind)
            .and_then(|records| records.iter_mut().find(|r| r.id.as_ref() == Some(&target.id)));
        if let Some(cached) = cached {
            *cached = record.clone();
        }
        if let Some(marker) = self.marker_of(target) {
            self.surface.update_marker(marker, project_all(&record.coordinates));
        }
    }

    fn replace_layer(&mut self, kind: GeometryKind, records: Vec<GeometryRecord>) {
        let layer = Layer::for_kind(kind);
        self.surface.clear_layer(layer);
        self.markers.retain(|_, target| target.kind != kind);

        for record in &records {
            let Some(target) = RecordRef::of(record) else {
                warn!("skipping {kind} without an id");
                continue;
            };
            let handle = self.surface.add_marker(
                layer,
                Marker {
                    role: MarkerRole::Persisted(target.clone()),
                    kind,
                    geometry: project_all(&record.coordinates),
                },
            );
            self.markers.insert(handle, target);
        }
        self.records.insert(kind, records);

        self.rebind_selection(kind);
        if self
            .pending_delete
            .as_ref()
            .is_some_and(|t| t.kind == kind && self.find_record(t).is_none())
        {
            self.dismiss_delete();
        }
    }

    /// Points the selection (and its edit interaction) at the reloaded record.
    fn rebind_selection(&mut self, kind: GeometryKind) {
        let Some(target) = self
            .selection
            .as_ref()
            .filter(|s| s.record.kind == kind)
            .and_then(Selection::record_ref)
        else {
            return;
        };

        let Some(record) = self.find_record(&target).cloned() else {
            self.reset();
            self.report(&AppError::NotFound {
                kind,
                id: target.id,
            });
            return;
        };

        let marker = self.marker_of(&target);
        if let Some(selection) = self.selection.as_mut() {
            selection.record = record;
            selection.marker = marker;
        }
        match (self.active_interaction(), marker) {
            (Some(Interaction::Translate(_)), Some(marker)) => {
                self.attach(Interaction::Translate(marker))
            }
            (Some(Interaction::ModifyVertices(_)), Some(marker)) => {
                self.attach(Interaction::ModifyVertices(marker))
            }
            _ => {}
        }
    }

    fn request_reload(&mut self, kind: GeometryKind, user_query: bool) {
        let generation = {
            let counter = self.reload_generation.entry(kind).or_default();
            *counter += 1;
            *counter
        };
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.list(kind).await;
            Completion::Loaded {
                kind,
                generation,
                user_query,
                result,
            }
        });
    }

    fn spawn<F>(&mut self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The receiver lives as long as the controller.
            let _ = tx.send(request.await);
        });
    }

    fn report(&mut self, error: &AppError) {
        warn!("{error}");
        let notification = Notification::error(error, self.notification_duration);
        self.surface.notify(&notification);
        self.notifications.push(notification);
    }

    fn notify_info(&mut self, message: impl Into<String>) {
        let notification = Notification::info(message, self.notification_duration);
        self.surface.notify(&notification);
        self.notifications.push(notification);
    }

    fn fail<T>(&mut self, error: AppError) -> Result<T> {
        self.report(&error);
        Err(error)
    }

    /// Whether mode, draft, selection, interaction and panel agree.
    pub fn is_consistent(&self) -> bool {
        let mode_ok = match self.mode {
            EditingMode::None => {
                self.draft.is_none() && self.sketch.is_none() && self.interaction.is_none()
            }
            EditingMode::AddPoint | EditingMode::AddLine | EditingMode::AddPolygon => {
                let kind = self.mode.adding_kind();
                self.selection.is_none()
                    && self.interaction.is_some()
                    && self
                        .draft
                        .as_ref()
                        .is_none_or(|d| Some(d.record.kind) == kind)
            }
            EditingMode::MapDragUpdate | EditingMode::VertexEdit => {
                self.draft.is_none() && self.interaction.is_some() && self.selection.is_some()
            }
        };

        let panel_ok = match self.panel.as_ref().map(|p| &p.panel) {
            None => self.draft.is_none() && self.pending_delete.is_none(),
            Some(Panel::NameEntry { kind }) => {
                self.draft.as_ref().is_some_and(|d| d.record.kind == *kind)
            }
            Some(Panel::RecordDetail { record }) => {
                self.mode == EditingMode::None
                    && self.selection.as_ref().is_some_and(|s| s.is(record))
            }
            Some(Panel::ConfirmDelete { record }) => self.pending_delete.as_ref() == Some(record),
        };

        mode_ok && panel_ok
    }
}
