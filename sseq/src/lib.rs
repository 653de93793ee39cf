//! Bookkeeping core for spectral sequence charts.
//!
//! [`Sseq`] owns the real model (classes, typed edges, degree index, page
//! list) and keeps a [`DisplaySseq`] projection in lockstep with it. The
//! projection is what gets serialized and rendered.

pub mod config;
pub mod degree;
pub mod display;
pub mod error;
pub mod fields;
pub mod keyed;
pub mod limits;
pub mod model;
pub mod page_list;
pub mod store;
pub mod templates;
mod json;

pub use config::SseqSettings;
pub use display::{ClassKey, DisplayClass, DisplayEdge, DisplaySseq, EdgeKey};
pub use error::SseqError;
pub use model::{
    ClassId, ClassRef, Edge, EdgeId, EdgeKind, EdgeRef, EdgeType, Node, Page, Shape, SseqClass, INFINITY,
};
pub use page_list::{PageEntry, PageList};
pub use store::{
    load_from_store_or_source, load_from_store_or_source_with_settings, DocumentSource, DocumentStore, FsStore,
    MemoryStore,
};

use degree::DegreeIndex;
use display::{class_key_string, edge_key_string};
use keyed::KeyedMap;
use limits::Limits;
use model::{next_unique_id, truthy};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

type ClassHook = Box<dyn FnMut(&SseqClass)>;
type EdgeHook = Box<dyn FnMut(&Edge)>;
type PageHook = Box<dyn FnMut(PageEntry)>;

#[derive(Default)]
struct Hooks {
    class_added: Option<ClassHook>,
    edge_added: Option<EdgeHook>,
    structline_added: Option<EdgeHook>,
    differential_added: Option<EdgeHook>,
    extension_added: Option<EdgeHook>,
    page_change: Option<PageHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("class_added", &self.class_added.is_some())
            .field("edge_added", &self.edge_added.is_some())
            .field("structline_added", &self.structline_added.is_some())
            .field("differential_added", &self.differential_added.is_some())
            .field("extension_added", &self.extension_added.is_some())
            .field("page_change", &self.page_change.is_some())
            .finish()
    }
}

/// A spectral sequence: the real model plus its paired display projection.
///
/// Classes are append-only, so `ClassId` doubles as the class list position.
/// Edges can be deleted; they are addressed by `EdgeId`, and slot `i` of the
/// projection's edge list always mirrors `edges()[i]`.
#[derive(Debug)]
pub struct Sseq {
    pub(crate) classes: Vec<SseqClass>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) degrees: DegreeIndex,
    pub(crate) page_list: PageList,
    pub(crate) display: DisplaySseq,
    display_class_to_real_class: KeyedMap<DisplayClass, ClassId>,
    display_edge_to_real_edge: KeyedMap<EdgeKey, EdgeId>,
    x_shift: i32,
    y_shift: i32,
    pub min_page_idx: usize,
    pub x_range: Option<[i32; 2]>,
    pub y_range: Option<[i32; 2]>,
    pub initial_x_range: [i32; 2],
    pub initial_y_range: [i32; 2],
    pub default_node: Node,
    pub class_scale: f64,
    pub offset_size: f64,
    /// Caps for documents loaded into this graph.
    pub limits: Limits,
    pub(crate) serialize_sseq_fields: Vec<String>,
    pub(crate) serialize_class_fields: Vec<String>,
    pub(crate) serialize_edge_fields: Vec<String>,
    pub(crate) attributes: BTreeMap<String, Value>,
    hooks: Hooks,
}

impl Default for Sseq {
    fn default() -> Self {
        Self::new()
    }
}

impl Sseq {
    pub fn new() -> Self {
        Self::with_settings(&SseqSettings::default())
    }

    pub fn with_settings(settings: &SseqSettings) -> Self {
        let mut sseq = Sseq {
            classes: Vec::new(),
            edges: Vec::new(),
            degrees: DegreeIndex::new(),
            page_list: PageList::new(),
            display: DisplaySseq::new(),
            display_class_to_real_class: KeyedMap::new(class_key_string),
            display_edge_to_real_edge: KeyedMap::new(edge_key_string),
            x_shift: 0,
            y_shift: 0,
            min_page_idx: 0,
            x_range: None,
            y_range: None,
            initial_x_range: settings.initial_x_range,
            initial_y_range: settings.initial_y_range,
            default_node: settings.default_node.clone(),
            class_scale: settings.class_scale,
            offset_size: settings.offset_size,
            limits: settings.limits,
            serialize_sseq_fields: fields::names(fields::DEFAULT_SSEQ_FIELDS),
            serialize_class_fields: fields::names(fields::DEFAULT_CLASS_FIELDS),
            serialize_edge_fields: fields::names(fields::DEFAULT_EDGE_FIELDS),
            attributes: BTreeMap::new(),
            hooks: Hooks::default(),
        };
        sseq.sync_display_settings();
        sseq
    }

    // Shift

    /// Offset added to the coordinates of every subsequent `add_class`.
    pub fn set_shift(&mut self, x: i32, y: i32) -> &mut Self {
        self.x_shift = x;
        self.y_shift = y;
        self
    }
    pub fn add_to_shift(&mut self, dx: i32, dy: i32) -> &mut Self {
        self.x_shift = self.x_shift.saturating_add(dx);
        self.y_shift = self.y_shift.saturating_add(dy);
        self
    }
    pub fn shift(&self) -> (i32, i32) {
        (self.x_shift, self.y_shift)
    }

    // Hooks

    pub fn on_class_added(&mut self, f: impl FnMut(&SseqClass) + 'static) -> &mut Self {
        self.hooks.class_added = Some(Box::new(f));
        self
    }
    pub fn on_edge_added(&mut self, f: impl FnMut(&Edge) + 'static) -> &mut Self {
        self.hooks.edge_added = Some(Box::new(f));
        self
    }
    pub fn on_structline_added(&mut self, f: impl FnMut(&Edge) + 'static) -> &mut Self {
        self.hooks.structline_added = Some(Box::new(f));
        self
    }
    pub fn on_differential_added(&mut self, f: impl FnMut(&Edge) + 'static) -> &mut Self {
        self.hooks.differential_added = Some(Box::new(f));
        self
    }
    pub fn on_extension_added(&mut self, f: impl FnMut(&Edge) + 'static) -> &mut Self {
        self.hooks.extension_added = Some(Box::new(f));
        self
    }
    pub fn on_page_change(&mut self, f: impl FnMut(PageEntry) + 'static) -> &mut Self {
        self.hooks.page_change = Some(Box::new(f));
        self
    }

    // Classes

    pub fn add_class(&mut self, x: i32, y: i32) -> ClassId {
        let x = x.saturating_add(self.x_shift);
        let y = y.saturating_add(self.y_shift);
        let idx = self.degrees.next_index_for(x, y);
        let id = ClassId(self.classes.len() as u32);
        self.degrees.insert(x, y, id);
        self.classes
            .push(SseqClass::new(x, y, idx, id.index(), self.default_node.clone()));
        let class = &self.classes[id.index()];
        if let Some(f) = self.hooks.class_added.as_mut() {
            f(class);
        }

        let mut d = DisplayClass::default();
        fields::sync_class(&mut d, class);
        self.display_class_to_real_class.insert(&d, id);
        self.display.classes.push(Some(d));
        self.display.note_class_at(x, y);
        id
    }

    pub fn class(&self, id: ClassId) -> Option<&SseqClass> {
        self.classes.get(id.index())
    }

    /// Edits land in the projection on the next `update_class` or `update`.
    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut SseqClass> {
        self.classes.get_mut(id.index())
    }

    pub fn classes(&self) -> &[SseqClass] {
        &self.classes
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Classes in `(x, y)`, ordered by `idx`.
    pub fn classes_in_degree(&self, x: i32, y: i32) -> Vec<ClassId> {
        let mut ids = self.degrees.classes_at(x, y).to_vec();
        ids.sort_by_key(|id| self.classes[id.index()].idx);
        ids
    }

    /// Classes with first coordinate `x`, creation order.
    pub fn stem(&self, x: i32) -> &[ClassId] {
        self.degrees.stem(x)
    }

    pub fn occupied_degrees(&self) -> Vec<(i32, i32)> {
        self.degrees.degrees()
    }

    pub fn num_classes_in_degree(&self, x: i32, y: i32) -> usize {
        self.degrees.count(x, y)
    }

    /// Classes still alive on `page`, which defaults to the page before infinity.
    pub fn surviving_classes(&self, page: Option<Page>) -> impl Iterator<Item = &SseqClass> + '_ {
        let page = page.unwrap_or(INFINITY - 1);
        self.classes.iter().filter(move |c| c.last_page() >= page)
    }

    /// Give `id` a smaller `idx` by trading places with its predecessor.
    pub fn swap_index_up(&mut self, id: ClassId) -> bool {
        let Some(c) = self.class(id) else { return false };
        if c.idx == 0 {
            return false;
        }
        let target = c.idx - 1;
        self.swap_idx_with(id, target)
    }

    /// Give `id` a larger `idx` by trading places with its successor.
    pub fn swap_index_down(&mut self, id: ClassId) -> bool {
        let Some(c) = self.class(id) else { return false };
        let target = c.idx + 1;
        if target >= self.degrees.count(c.x, c.y) {
            return false;
        }
        self.swap_idx_with(id, target)
    }

    fn swap_idx_with(&mut self, id: ClassId, target_idx: usize) -> bool {
        let (x, y, idx) = {
            let c = &self.classes[id.index()];
            (c.x, c.y, c.idx)
        };
        let Some(other) = self
            .degrees
            .classes_at(x, y)
            .iter()
            .copied()
            .find(|o| self.classes[o.index()].idx == target_idx)
        else {
            warn!(x, y, idx = target_idx, "no sibling holds the neighbouring index");
            return false;
        };
        self.classes[id.index()].idx = target_idx;
        self.classes[other.index()].idx = idx;
        self.update_class(id);
        self.update_class(other);
        self.display.update();
        true
    }

    /// Stop drawing the class after `page`.
    pub fn set_page(&mut self, id: ClassId, page: Page) -> bool {
        if page <= 0 {
            warn!(class = id.raw(), page, "class page must be positive");
            return false;
        }
        let Some(c) = self.classes.get_mut(id.index()) else {
            warn!(class = id.raw(), "class does not belong to this graph");
            return false;
        };
        let n = c.page_list.len();
        if n > 1 && c.page_list[n - 2] > page {
            warn!(class = id.raw(), page, "page precedes an earlier schedule segment");
            return false;
        }
        c.page_list[n - 1] = page;
        self.update_class(id)
    }

    /// Draw the class with `node` from the page after its current last page
    /// on. A class that never died just changes marker.
    pub fn replace_class(&mut self, id: ClassId, node: Node) -> bool {
        let Some(c) = self.classes.get_mut(id.index()) else {
            warn!(class = id.raw(), "class does not belong to this graph");
            return false;
        };
        if c.last_page() >= INFINITY {
            if let Some(last) = c.node_list.last_mut() {
                *last = node;
            }
        } else {
            c.page_list.push(INFINITY);
            c.node_list.push(node);
        }
        self.update_class(id)
    }

    // Edges

    pub fn add_structline(&mut self, source: impl Into<ClassRef>, target: impl Into<ClassRef>) -> EdgeRef {
        self.add_edge(EdgeKind::Structline, source.into(), target.into())
    }

    pub fn add_differential(
        &mut self,
        source: impl Into<ClassRef>,
        target: impl Into<ClassRef>,
        page: Page,
    ) -> EdgeRef {
        self.add_edge(EdgeKind::Differential { page }, source.into(), target.into())
    }

    pub fn add_extension(&mut self, source: impl Into<ClassRef>, target: impl Into<ClassRef>) -> EdgeRef {
        self.add_edge(EdgeKind::Extension, source.into(), target.into())
    }

    fn resolve(&self, r: ClassRef, role: &'static str) -> Option<ClassId> {
        match r {
            ClassRef::Dummy => None,
            ClassRef::Class(id) if id.index() < self.classes.len() => Some(id),
            ClassRef::Class(id) => {
                warn!(role, class = id.raw(), "class does not belong to this graph");
                None
            }
        }
    }

    fn add_edge(&mut self, kind: EdgeKind, source: ClassRef, target: ClassRef) -> EdgeRef {
        let edge_type = kind.edge_type();
        let (Some(s), Some(t)) = (self.resolve(source, "source"), self.resolve(target, "target")) else {
            warn!(%edge_type, source = ?source, target = ?target, "missing endpoint");
            return EdgeRef::dummy(edge_type);
        };
        if let EdgeKind::Differential { page } = kind {
            if page <= 0 {
                warn!(source = s.raw(), target = t.raw(), page, "differential page must be positive");
                return EdgeRef::dummy(edge_type);
            }
            if page > INFINITY {
                warn!(source = s.raw(), target = t.raw(), page, "differential page is past infinity");
                return EdgeRef::dummy(edge_type);
            }
            self.page_list.add_page(page);
            self.display.page_list.clone_from(&self.page_list);
        }

        let id = EdgeId(next_unique_id());
        let pos = self.edges.len();
        self.edges.push(Edge::new(id, pos, kind, s, t));
        if edge_type != EdgeType::Extension {
            self.classes[s.index()].edges.push(id);
            if s != t {
                self.classes[t.index()].edges.push(id);
            }
        }

        let edge = &self.edges[pos];
        if let Some(f) = self.hooks.edge_added.as_mut() {
            f(edge);
        }
        let kind_hook = match edge_type {
            EdgeType::Structline => self.hooks.structline_added.as_mut(),
            EdgeType::Differential => self.hooks.differential_added.as_mut(),
            EdgeType::Extension => self.hooks.extension_added.as_mut(),
        };
        if let Some(f) = kind_hook {
            f(edge);
        }

        let mut d = DisplayEdge::new(edge_type, s.index(), t.index());
        fields::sync_edge(&mut d, edge, self.page_list.last_page());
        if let Some(key) = self.display.edge_key(&d) {
            self.display_edge_to_real_edge.insert(&key, id);
        }
        self.display.edges.push(Some(d));
        EdgeRef::created(edge_type, id)
    }

    fn edge_position(&self, id: EdgeId) -> Option<usize> {
        // ids are handed out in increasing order and edges keep creation order
        self.edges.binary_search_by_key(&id, |e| e.unique_id).ok()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_position(id).map(|i| &self.edges[i])
    }

    /// Edits land in the projection on the next `update_edge` or `update`.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        let i = self.edge_position(id)?;
        self.edges.get_mut(i)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edges_of(&self, t: EdgeType) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.edge_type() == t)
    }
    pub fn structlines(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges_of(EdgeType::Structline)
    }
    pub fn differentials(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges_of(EdgeType::Differential)
    }
    pub fn extensions(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges_of(EdgeType::Extension)
    }

    /// Structlines and differentials touching `id`, creation order.
    pub fn incident_edges(&self, id: ClassId) -> impl Iterator<Item = &Edge> + '_ {
        self.class(id)
            .map(|c| c.edges.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|e| self.edge(*e))
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> bool {
        let Some(pos) = self.edge_position(id) else {
            return false;
        };
        let edge = self.edges.remove(pos);
        if let Some(d) = self.display.edges.remove(pos) {
            if let Some(key) = self.display.edge_key(&d) {
                if self.display_edge_to_real_edge.get(&key) == Some(&id) {
                    self.display_edge_to_real_edge.remove(&key);
                    // parallel edges share a key; hand it to the newest survivor
                    let survivor = self
                        .display
                        .edges
                        .iter()
                        .zip(&self.edges)
                        .rev()
                        .find(|(d, _)| d.as_ref().and_then(|d| self.display.edge_key(d)) == Some(key))
                        .map(|(_, e)| e.unique_id);
                    if let Some(s) = survivor {
                        self.display_edge_to_real_edge.insert(&key, s);
                    }
                }
            }
        }
        for c in [edge.source, edge.target] {
            self.classes[c.index()].edges.retain(|e| *e != id);
        }
        for (i, e) in self.edges.iter_mut().enumerate().skip(pos) {
            e.edge_list_index = i;
        }
        self.display.update();
        true
    }

    /// Keep the earliest edge between each pair of neighbours; returns how
    /// many were deleted.
    pub fn delete_duplicate_edges(&mut self) -> usize {
        let mut doomed: Vec<EdgeId> = Vec::new();
        let mut doomed_set: HashSet<EdgeId> = HashSet::new();
        for c in &self.classes {
            let mut seen: HashSet<ClassId> = HashSet::new();
            for &eid in &c.edges {
                if doomed_set.contains(&eid) {
                    continue;
                }
                let Some(e) = self.edge(eid) else { continue };
                if !seen.insert(e.other_class(c.id())) {
                    doomed.push(eid);
                    doomed_set.insert(eid);
                }
            }
        }
        for &eid in &doomed {
            self.delete_edge(eid);
        }
        debug!(deleted = doomed.len(), "deleted duplicate edges");
        doomed.len()
    }

    // Synchronization

    /// Copy the class allowlist into its display entry.
    pub fn update_class(&mut self, id: ClassId) -> bool {
        let Some(c) = self.classes.get(id.index()) else {
            return false;
        };
        match self.display.class_mut(id.index()) {
            Some(d) => {
                fields::sync_class(d, c);
                true
            }
            None => false,
        }
    }

    /// Copy the edge allowlist into its display entry.
    pub fn update_edge(&mut self, id: EdgeId) -> bool {
        let Some(pos) = self.edge_position(id) else {
            return false;
        };
        let last = self.page_list.last_page();
        match self.display.edges.get_mut(pos).and_then(Option::as_mut) {
            Some(d) => {
                fields::sync_edge(d, &self.edges[pos], last);
                true
            }
            None => false,
        }
    }

    /// Resync every class and edge, then request a re-render.
    pub fn update(&mut self) {
        let last = self.page_list.last_page();
        for (c, d) in self.classes.iter().zip(self.display.classes.iter_mut()) {
            if let Some(d) = d {
                fields::sync_class(d, c);
            }
        }
        for (e, d) in self.edges.iter().zip(self.display.edges.iter_mut()) {
            if let Some(d) = d {
                fields::sync_edge(d, e, last);
            }
        }
        self.sync_display_settings();
        self.display.update();
        debug!(
            classes = self.classes.len(),
            edges = self.edges.len(),
            version = self.display.version(),
            "updated display"
        );
    }

    fn sync_display_settings(&mut self) {
        let d = &mut self.display;
        d.page_list.clone_from(&self.page_list);
        let max_idx = self.page_list.len().saturating_sub(1);
        d.min_page_idx = self.min_page_idx.min(max_idx);
        d.page_idx = d.page_idx.clamp(d.min_page_idx, max_idx);
        d.x_range = self.x_range;
        d.y_range = self.y_range;
        d.initial_x_range = self.initial_x_range;
        d.initial_y_range = self.initial_y_range;
        d.default_node.clone_from(&self.default_node);
        d.class_scale = self.class_scale;
        d.offset_size = self.offset_size;
        d.serialize_sseq_fields.clone_from(&self.serialize_sseq_fields);
        d.serialize_class_fields.clone_from(&self.serialize_class_fields);
        d.serialize_edge_fields.clone_from(&self.serialize_edge_fields);
    }

    pub fn display(&self) -> &DisplaySseq {
        &self.display
    }

    /// Direct access to the projection. Synced fields are overwritten by the
    /// next update.
    pub fn display_mut(&mut self) -> &mut DisplaySseq {
        &mut self.display
    }

    pub fn real_class_of(&self, d: &DisplayClass) -> Option<ClassId> {
        self.display_class_to_real_class.get(d).copied()
    }

    pub fn real_edge_of(&self, d: &DisplayEdge) -> Option<EdgeId> {
        let key = self.display.edge_key(d)?;
        self.display_edge_to_real_edge.get(&key).copied()
    }

    // Page list

    pub fn page_list(&self) -> &PageList {
        &self.page_list
    }

    pub fn add_page_to_page_list(&mut self, page: Page) -> &mut Self {
        self.page_list.add_page(page);
        self.display.page_list.clone_from(&self.page_list);
        self
    }

    pub fn add_page_range_to_page_list(&mut self, start: Page, end: Page) -> &mut Self {
        self.page_list.add_page_range(start, end);
        self.display.page_list.clone_from(&self.page_list);
        self
    }

    // Page navigation

    pub fn page_idx(&self) -> usize {
        self.display.page_idx
    }

    pub fn current_page(&self) -> Option<PageEntry> {
        self.display.current_page()
    }

    /// Select a page list entry, clamped to `[min_page_idx, len - 1]`.
    pub fn select_page_idx(&mut self, idx: usize) -> Option<PageEntry> {
        let max_idx = self.page_list.len().checked_sub(1)?;
        let min_idx = self.min_page_idx.min(max_idx);
        let idx = idx.clamp(min_idx, max_idx);
        let entry = self.page_list.get(idx)?;
        self.display.page_list.clone_from(&self.page_list);
        self.display.min_page_idx = min_idx;
        self.display.page_idx = idx;
        if let Some(f) = self.hooks.page_change.as_mut() {
            f(entry);
        }
        self.display.update();
        Some(entry)
    }

    pub fn next_page(&mut self) -> Option<PageEntry> {
        self.select_page_idx(self.display.page_idx.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> Option<PageEntry> {
        self.select_page_idx(self.display.page_idx.saturating_sub(1))
    }

    /// Classes drawn on the selected page.
    pub fn visible_classes(&self) -> Vec<ClassId> {
        self.current_page()
            .map(|p| self.display.classes_on_page(p))
            .unwrap_or_default()
            .into_iter()
            .map(|slot| ClassId(slot as u32))
            .collect()
    }

    /// Edges drawn on the selected page.
    pub fn visible_edges(&self) -> Vec<EdgeId> {
        self.current_page()
            .map(|p| self.display.edges_on_page(p))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|slot| self.edges.get(slot).map(Edge::id))
            .collect()
    }

    // Serialization

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn add_sseq_field_to_serialize<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        fields::extend_unique(&mut self.serialize_sseq_fields, names);
        self
    }
    pub fn add_class_field_to_serialize<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        fields::extend_unique(&mut self.serialize_class_fields, names);
        self
    }
    pub fn add_edge_field_to_serialize<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        fields::extend_unique(&mut self.serialize_edge_fields, names);
        self
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let v = match name {
            "min_page_idx" => Value::from(self.min_page_idx),
            "page_list" => serde_json::to_value(&self.page_list).ok()?,
            "x_range" => self.x_range.map_or(Value::Null, |r| Value::from(r.to_vec())),
            "y_range" => self.y_range.map_or(Value::Null, |r| Value::from(r.to_vec())),
            "initial_x_range" => Value::from(self.initial_x_range.to_vec()),
            "initial_y_range" => Value::from(self.initial_y_range.to_vec()),
            "default_node" => serde_json::to_value(&self.default_node).ok()?,
            "class_scale" => Value::from(self.class_scale),
            "offset_size" => Value::from(self.offset_size),
            "serialize_sseq_fields" => Value::from(self.serialize_sseq_fields.clone()),
            "serialize_class_fields" => Value::from(self.serialize_class_fields.clone()),
            "serialize_edge_fields" => Value::from(self.serialize_edge_fields.clone()),
            other => self.attributes.get(other)?.clone(),
        };
        truthy(&v).then_some(v)
    }

    /// Push every truthy allowlisted field into the projection.
    fn copy_serialized_fields(&mut self) {
        self.sync_display_settings();
        for name in &self.serialize_sseq_fields {
            if let Some(v) = self.field_value(name) {
                if let Err(err) = self.display.set_field(name, v) {
                    warn!(field = %name, %err, "skipping graph field");
                }
            }
        }
        for (c, d) in self.classes.iter().zip(self.display.classes.iter_mut()) {
            let Some(d) = d else { continue };
            for name in &self.serialize_class_fields {
                if let Some(v) = c.field_value(name) {
                    if let Err(err) = d.set_field(name, v) {
                        warn!(class = c.class_list_index, field = %name, %err, "skipping class field");
                    }
                }
            }
        }
        for (e, d) in self.edges.iter().zip(self.display.edges.iter_mut()) {
            let Some(d) = d else { continue };
            for name in &self.serialize_edge_fields {
                if let Some(v) = e.field_value(name) {
                    if let Err(err) = d.set_field(name, v) {
                        warn!(edge = e.edge_list_index, field = %name, %err, "skipping edge field");
                    }
                }
            }
        }
    }

    pub fn to_json_value(&mut self) -> Value {
        self.copy_serialized_fields();
        json::to_json_impl(&self.display)
    }

    pub fn to_json_string(&mut self) -> Result<String, SseqError> {
        Ok(serde_json::to_string(&self.to_json_value())?)
    }

    pub fn from_json_value(v: Value) -> Result<Self, SseqError> {
        Self::from_json_value_with_settings(v, &SseqSettings::default())
    }

    pub fn from_json_value_with_limits(v: Value, limits: &Limits) -> Result<Self, SseqError> {
        let settings = SseqSettings { limits: *limits, ..SseqSettings::default() };
        Self::from_json_value_with_settings(v, &settings)
    }

    /// Load under `settings.limits`; the rebuilt graph keeps those limits.
    pub fn from_json_value_with_settings(v: Value, settings: &SseqSettings) -> Result<Self, SseqError> {
        let display = DisplaySseq::from_json_value_with_limits(v, &settings.limits)?;
        Ok(Self::from_display_with_settings(display, settings))
    }

    pub fn from_json_str(s: &str) -> Result<Self, SseqError> {
        Self::from_json_value(serde_json::from_str(s)?)
    }

    /// Rebuild a real model from a projection.
    ///
    /// Holes are compacted away, so the new projection's slots match the real
    /// list positions. Edges whose endpoints are holes are dropped. Edges are
    /// oriented so the source has the smaller `y`.
    pub fn from_display(display: DisplaySseq) -> Self {
        Self::from_display_with_settings(display, &SseqSettings::default())
    }

    /// As [`Sseq::from_display`], with `settings` supplying what the
    /// projection does not record.
    pub fn from_display_with_settings(display: DisplaySseq, settings: &SseqSettings) -> Self {
        let mut sseq = Sseq::with_settings(settings);
        sseq.page_list = display.page_list.clone();
        sseq.min_page_idx = display.min_page_idx;
        sseq.x_range = display.x_range;
        sseq.y_range = display.y_range;
        sseq.initial_x_range = display.initial_x_range;
        sseq.initial_y_range = display.initial_y_range;
        sseq.default_node = display.default_node.clone();
        sseq.class_scale = display.class_scale;
        sseq.offset_size = display.offset_size;
        sseq.serialize_sseq_fields.clone_from(&display.serialize_sseq_fields);
        sseq.serialize_class_fields.clone_from(&display.serialize_class_fields);
        sseq.serialize_edge_fields.clone_from(&display.serialize_edge_fields);
        sseq.attributes = display.extra.clone();
        sseq.display.page_idx = display.page_idx;

        let mut slot_to_id: Vec<Option<ClassId>> = vec![None; display.classes.len()];
        let mut recorded_idx: Vec<usize> = Vec::with_capacity(display.classes.len());
        for (slot, d) in display.classes.iter().enumerate() {
            let Some(d) = d else { continue };
            let id = sseq.add_class(d.x, d.y);
            slot_to_id[slot] = Some(id);
            recorded_idx.push(d.idx);
            let c = &mut sseq.classes[id.index()];
            c.x_offset = d.x_offset;
            c.y_offset = d.y_offset;
            c.name.clone_from(&d.name);
            c.extra_info.clone_from(&d.extra_info);
            c.visible = d.visible;
            c.attributes = d.extra.clone();
            if !d.page_list.is_empty() && d.page_list.len() == d.node_list.len() {
                c.page_list.clone_from(&d.page_list);
                c.node_list.clone_from(&d.node_list);
            } else {
                warn!(slot, "class schedule lengths disagree; using the default schedule");
            }
        }

        // Recorded idx values order each bidegree; ties keep slot order.
        for (x, y) in sseq.degrees.degrees() {
            let mut ids = sseq.degrees.classes_at(x, y).to_vec();
            ids.sort_by_key(|id| recorded_idx[id.index()]);
            for (rank, id) in ids.into_iter().enumerate() {
                sseq.classes[id.index()].idx = rank;
            }
        }

        let mut skipped = 0usize;
        for (slot, d) in display.edges.iter().enumerate() {
            let Some(d) = d else { continue };
            let endpoints = (
                slot_to_id.get(d.source).copied().flatten(),
                slot_to_id.get(d.target).copied().flatten(),
            );
            let (Some(mut s), Some(mut t)) = endpoints else {
                warn!(slot, source = d.source, target = d.target, "edge endpoint is not a class");
                skipped += 1;
                continue;
            };
            if sseq.classes[s.index()].y > sseq.classes[t.index()].y {
                std::mem::swap(&mut s, &mut t);
            }
            let r = match (d.edge_type, d.page) {
                (EdgeType::Differential, Some(page)) => sseq.add_differential(s, t, page),
                (EdgeType::Differential, None) => {
                    warn!(slot, "differential has no page");
                    skipped += 1;
                    continue;
                }
                (EdgeType::Extension, _) => sseq.add_extension(s, t),
                (EdgeType::Structline, _) => sseq.add_structline(s, t),
            };
            let Some(e) = r.id().and_then(|id| sseq.edge_mut(id)) else {
                skipped += 1;
                continue;
            };
            e.color.clone_from(&d.color);
            e.dash.clone_from(&d.dash);
            e.bend = d.bend;
            e.opacity = d.opacity;
            e.line_width = d.line_width;
            e.page_min = d.page_min;
            e.visible = d.visible;
            e.attributes = d.extra.clone();
        }

        sseq.update();
        debug!(
            classes = sseq.classes.len(),
            edges = sseq.edges.len(),
            skipped,
            "rebuilt sseq from display"
        );
        sseq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn nonpositive_differential_is_dummy() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(1, 0);
        let b = sseq.add_class(0, 2);
        let r = sseq.add_differential(a, b, 0);
        assert!(r.is_dummy());
        assert_eq!(r.edge_type(), EdgeType::Differential);
        assert!(sseq.add_differential(a, b, -1).is_dummy());
        assert_eq!(sseq.edge_count(), 0);
        assert_eq!(sseq.page_list().len(), 2);
        assert!(logs_contain("differential page must be positive"));
    }

    #[traced_test]
    #[test]
    fn foreign_class_is_treated_as_missing() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(0, 0);
        let r = sseq.add_structline(a, ClassId::new(42));
        assert!(r.is_dummy());
        assert!(sseq.add_extension(ClassRef::Dummy, a).is_dummy());
        assert!(logs_contain("class does not belong to this graph"));
        assert!(logs_contain("missing endpoint"));
    }

    #[test]
    fn hooks_fire_in_order() {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut sseq = Sseq::new();
        let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
        sseq.on_class_added(move |c| l1.borrow_mut().push(format!("class {:?}", c.degree())))
            .on_edge_added(move |e| l2.borrow_mut().push(format!("edge {}", e.edge_type())))
            .on_differential_added(move |e| l3.borrow_mut().push(format!("d{:?}", e.page())))
            .on_structline_added(move |_| l4.borrow_mut().push("structline".into()));
        let a = sseq.add_class(1, 0);
        let b = sseq.add_class(0, 2);
        sseq.add_differential(a, b, 2);
        sseq.add_structline(a, b);
        assert_eq!(
            *log.borrow(),
            vec![
                "class (1, 0)",
                "class (0, 2)",
                "edge Differential",
                "dSome(2)",
                "edge Structline",
                "structline"
            ]
        );
    }

    #[test]
    fn shift_translates_new_classes() {
        let mut sseq = Sseq::new();
        sseq.set_shift(2, 1).add_to_shift(1, 0);
        let c = sseq.add_class(0, 0);
        assert_eq!(sseq.class(c).map(SseqClass::degree), Some((3, 1)));
        assert_eq!(sseq.display().class(c.index()).map(|d| (d.x, d.y)), Some((3, 1)));
    }

    #[test]
    fn shift_saturates() {
        let mut sseq = Sseq::new();
        sseq.set_shift(i32::MAX - 1, i32::MIN + 1).add_to_shift(5, -5);
        assert_eq!(sseq.shift(), (i32::MAX, i32::MIN));
    }

    #[traced_test]
    #[test]
    fn differential_past_infinity_is_dummy() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(1, 0);
        let b = sseq.add_class(0, 2);
        assert!(sseq.add_differential(a, b, INFINITY + 5).is_dummy());
        assert!(logs_contain("differential page is past infinity"));
        assert_eq!(sseq.page_list().entries().last(), Some(&PageEntry::Page(INFINITY)));

        // extensions keep a span that ends at infinity and stay drawable
        let ext = sseq.add_extension(a, b).id().unwrap();
        sseq.update();
        let d = sseq.display().edge(0).cloned().unwrap();
        assert_eq!(d.draw_span(sseq.page_list().last_page()), (INFINITY, INFINITY));
        sseq.select_page_idx(1);
        assert_eq!(sseq.visible_edges(), vec![ext]);
    }

    #[test]
    fn settings_limits_follow_the_graph() {
        let caps = Limits { max_classes: 1, ..Limits::default() };
        let settings = SseqSettings { limits: caps, ..SseqSettings::default() };
        assert_eq!(Sseq::with_settings(&settings).limits, caps);

        let mut chart = Sseq::new();
        chart.add_class(0, 0);
        chart.add_class(1, 0);
        let doc = chart.to_json_value();
        let err = Sseq::from_json_value_with_settings(doc.clone(), &settings).unwrap_err();
        assert_eq!(err.code(), "caps_exceeded");

        let loose = Sseq::from_json_value_with_settings(doc, &SseqSettings::default()).unwrap();
        assert_eq!(loose.class_count(), 2);
        assert_eq!(loose.limits, Limits::default());
    }

    #[test]
    fn extensions_are_not_incident() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(0, 0);
        let b = sseq.add_class(0, 1);
        sseq.add_extension(a, b);
        let s = sseq.add_structline(a, b).id().unwrap();
        let incident: Vec<EdgeId> = sseq.incident_edges(a).map(Edge::id).collect();
        assert_eq!(incident, vec![s]);
        assert_eq!(sseq.extensions().count(), 1);
    }

    #[test]
    fn delete_edge_reindexes_and_unpairs() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(0, 0);
        let b = sseq.add_class(1, 0);
        let c = sseq.add_class(2, 0);
        let e0 = sseq.add_structline(a, b).id().unwrap();
        let e1 = sseq.add_structline(b, c).id().unwrap();
        let e2 = sseq.add_structline(a, c).id().unwrap();
        let d1 = sseq.display().edge(1).cloned().unwrap();
        assert_eq!(sseq.real_edge_of(&d1), Some(e1));

        assert!(sseq.delete_edge(e1));
        assert!(!sseq.delete_edge(e1));
        assert_eq!(sseq.edge(e2).map(Edge::edge_list_index), Some(1));
        assert_eq!(sseq.display().edges.len(), 2);
        assert_eq!(sseq.display().edge(1).map(|d| (d.source, d.target)), Some((0, 2)));
        assert_eq!(sseq.real_edge_of(&d1), None);
        assert_eq!(sseq.class(b).unwrap().incident_edges(), &[e0]);
    }

    #[test]
    fn update_pushes_edits_and_clears_tooltip() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(3, 1);
        assert_eq!(sseq.display_mut().class_mut(0).unwrap().tooltip(), "(3, 1)");
        sseq.class_mut(a).unwrap().name = "h_1".into();
        let before = sseq.display().version();
        sseq.update();
        assert!(sseq.display().version() > before);
        assert_eq!(sseq.display_mut().class_mut(0).unwrap().tooltip(), "h_1 (3, 1)");
    }

    #[test]
    fn page_navigation_clamps_and_notifies() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sseq = Sseq::new();
        let s = seen.clone();
        sseq.on_page_change(move |p| s.borrow_mut().push(p));
        sseq.add_page_to_page_list(2).add_page_range_to_page_list(3, 5);
        sseq.min_page_idx = 1;
        assert_eq!(sseq.select_page_idx(0), Some(PageEntry::Page(2)));
        assert_eq!(sseq.next_page(), Some(PageEntry::Range([3, 5])));
        assert_eq!(sseq.next_page(), Some(PageEntry::Page(INFINITY)));
        assert_eq!(sseq.next_page(), Some(PageEntry::Page(INFINITY)));
        assert_eq!(sseq.previous_page(), Some(PageEntry::Range([3, 5])));
        assert_eq!(seen.borrow().len(), 5);
        assert_eq!(sseq.page_idx(), 2);
    }

    #[test]
    fn set_page_and_replace_drive_survival() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(0, 0);
        let b = sseq.add_class(1, 0);
        assert!(sseq.set_page(a, 3));
        assert_eq!(sseq.surviving_classes(None).map(SseqClass::id).collect::<Vec<_>>(), vec![b]);
        assert_eq!(sseq.surviving_classes(Some(3)).count(), 2);

        let square = Node { shape: Shape::Square, ..Node::default() };
        assert!(sseq.replace_class(a, square));
        let c = sseq.class(a).unwrap();
        assert_eq!(c.page_list(), &[3, INFINITY]);
        assert_eq!(c.node_on_page(5).map(|n| n.shape), Some(Shape::Square));
        assert_eq!(sseq.display().class(0).map(|d| d.page_list.clone()), Some(vec![3, INFINITY]));
        assert!(!sseq.set_page(a, 0));
    }

    #[traced_test]
    #[test]
    fn from_display_compacts_holes() {
        let mut d = DisplaySseq::new();
        let class = |x, y, idx| {
            Some(DisplayClass {
                x,
                y,
                idx,
                page_list: vec![INFINITY],
                node_list: vec![Node::default()],
                ..DisplayClass::default()
            })
        };
        d.classes = vec![class(0, 2, 0), None, class(0, 0, 1), class(0, 0, 0)];
        d.edges = vec![
            Some(DisplayEdge::new(EdgeType::Structline, 0, 2)),
            Some(DisplayEdge::new(EdgeType::Structline, 1, 2)),
        ];
        let mut unpaged = DisplayEdge::new(EdgeType::Differential, 3, 0);
        unpaged.page = None;
        d.edges.push(Some(unpaged));
        let sseq = Sseq::from_display(d);
        assert!(logs_contain("differential has no page"));
        assert!(!logs_contain("differential page must be positive"));
        assert_eq!(sseq.class_count(), 3);
        assert_eq!(sseq.display().classes.len(), 3);
        assert_eq!(sseq.edge_count(), 1);
        assert!(logs_contain("edge endpoint is not a class"));

        // oriented with the smaller y as source
        let e = &sseq.edges()[0];
        assert_eq!(sseq.class(e.source()).map(SseqClass::degree), Some((0, 0)));
        assert_eq!(sseq.class(e.target()).map(SseqClass::degree), Some((0, 2)));

        let order: Vec<usize> = sseq
            .classes_in_degree(0, 0)
            .into_iter()
            .map(|id| id.index())
            .collect();
        assert_eq!(order, vec![2, 1]);
        let dc = sseq.display().class(1).cloned().unwrap();
        assert_eq!(sseq.real_class_of(&dc), Some(ClassId::new(1)));
    }

    #[test]
    fn attributes_travel_only_when_allowlisted() {
        let mut sseq = Sseq::new();
        let a = sseq.add_class(0, 0);
        sseq.class_mut(a).unwrap().set_attribute("weight", Value::from(3));
        sseq.set_attribute("title", Value::from("ASS"));
        let v = sseq.to_json_value();
        assert!(v["classes"][0].get("weight").is_none());
        assert!(v.get("title").is_none());

        sseq.add_class_field_to_serialize(&["weight"])
            .add_sseq_field_to_serialize(&["title", "title"]);
        let v = sseq.to_json_value();
        assert_eq!(v["classes"][0]["weight"], Value::from(3));
        assert_eq!(v["title"], Value::from("ASS"));
        assert_eq!(
            sseq.serialize_sseq_fields.iter().filter(|f| *f == "title").count(),
            1
        );
    }
}
