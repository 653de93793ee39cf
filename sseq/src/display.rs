use crate::error::SseqError;
use crate::fields;
use crate::model::{draw_span, scheduled_node, EdgeType, Node, Page, INFINITY};
use crate::page_list::{PageEntry, PageList};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Composite identity of a display class: bidegree plus unique id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub x: i32,
    pub y: i32,
    pub unique_id: u64,
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.unique_id)
    }
}

/// Composite identity of a display edge: kind, page and both endpoint keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub edge_type: EdgeType,
    pub page: Option<Page>,
    pub source: ClassKey,
    pub target: ClassKey,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(p) => write!(f, "{}({})", self.edge_type, p)?,
            None => write!(f, "{}(-)", self.edge_type)?,
        }
        write!(f, " : ({}) => ({})", self.source, self.target)
    }
}

pub(crate) fn class_key_string(c: &DisplayClass) -> String {
    c.key().to_string()
}

pub(crate) fn edge_key_string(k: &EdgeKey) -> String {
    k.to_string()
}

/// Render-only mirror of a class.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayClass {
    pub x: i32,
    pub y: i32,
    pub idx: usize,
    pub unique_id: u64,
    pub x_offset: Option<f64>,
    pub y_offset: Option<f64>,
    pub name: String,
    pub extra_info: String,
    pub page_list: Vec<Page>,
    pub node_list: Vec<Node>,
    pub visible: bool,
    pub(crate) tooltip: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl Default for DisplayClass {
    fn default() -> Self {
        DisplayClass {
            x: 0,
            y: 0,
            idx: 0,
            unique_id: 0,
            x_offset: None,
            y_offset: None,
            name: String::new(),
            extra_info: String::new(),
            page_list: Vec::new(),
            node_list: Vec::new(),
            visible: true,
            tooltip: None,
            extra: BTreeMap::new(),
        }
    }
}

impl DisplayClass {
    pub fn key(&self) -> ClassKey {
        ClassKey {
            x: self.x,
            y: self.y,
            unique_id: self.unique_id,
        }
    }

    pub fn draw_on_page(&self, page: Page) -> bool {
        self.visible && scheduled_node(&self.page_list, &self.node_list, page).is_some()
    }

    pub fn node_on_page(&self, page: Page) -> Option<&Node> {
        scheduled_node(&self.page_list, &self.node_list, page)
    }

    /// Hover text, built on first request after each sync.
    pub fn tooltip(&mut self) -> &str {
        if self.tooltip.is_none() {
            let mut text = format!("({}, {})", self.x, self.y);
            if !self.name.is_empty() {
                text = format!("{} {}", self.name, text);
            }
            if !self.extra_info.is_empty() {
                text.push('\n');
                text.push_str(&self.extra_info);
            }
            self.tooltip = Some(text);
        }
        self.tooltip.as_deref().unwrap_or_default()
    }

    pub(crate) fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::from(self.x)),
            "y" => Some(Value::from(self.y)),
            "idx" => Some(Value::from(self.idx)),
            "unique_id" => Some(Value::from(self.unique_id)),
            "x_offset" => self.x_offset.map(Value::from),
            "y_offset" => self.y_offset.map(Value::from),
            "name" => (!self.name.is_empty()).then(|| Value::from(self.name.as_str())),
            "extra_info" => (!self.extra_info.is_empty()).then(|| Value::from(self.extra_info.as_str())),
            "page_list" => Some(Value::from(self.page_list.clone())),
            "visible" => Some(Value::from(self.visible)),
            // node_list goes through the template arena
            "node_list" => None,
            other => self.extra.get(other).cloned(),
        }
    }

    pub(crate) fn set_field(&mut self, name: &str, v: Value) -> Result<(), SseqError> {
        match name {
            "x" => self.x = serde_json::from_value(v)?,
            "y" => self.y = serde_json::from_value(v)?,
            "idx" => self.idx = serde_json::from_value(v)?,
            "unique_id" => self.unique_id = serde_json::from_value(v)?,
            "x_offset" => self.x_offset = serde_json::from_value(v)?,
            "y_offset" => self.y_offset = serde_json::from_value(v)?,
            "name" => self.name = serde_json::from_value(v)?,
            "extra_info" => self.extra_info = serde_json::from_value(v)?,
            "page_list" => self.page_list = serde_json::from_value(v)?,
            "node_list" => self.node_list = serde_json::from_value(v)?,
            "visible" => self.visible = serde_json::from_value(v)?,
            other => {
                self.extra.insert(other.to_string(), v);
            }
        }
        self.tooltip = None;
        Ok(())
    }
}

/// Render-only mirror of an edge. `source` and `target` are slots in the
/// projection's class list.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayEdge {
    pub edge_type: EdgeType,
    pub source: usize,
    pub target: usize,
    pub page: Option<Page>,
    pub page_min: Page,
    pub color: Option<String>,
    pub dash: Option<Vec<f64>>,
    pub bend: Option<f64>,
    pub opacity: Option<f64>,
    pub line_width: Option<f64>,
    pub visible: bool,
    /// Cached drawn-page span; recomputed from the page list when absent.
    pub draw_pages: Option<(Page, Page)>,
    pub extra: BTreeMap<String, Value>,
}

impl DisplayEdge {
    pub fn new(edge_type: EdgeType, source: usize, target: usize) -> Self {
        DisplayEdge {
            edge_type,
            source,
            target,
            page: None,
            page_min: 0,
            color: None,
            dash: None,
            bend: None,
            opacity: None,
            line_width: None,
            visible: true,
            draw_pages: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn draw_span(&self, last_page: Page) -> (Page, Page) {
        self.draw_pages
            .unwrap_or_else(|| draw_span(self.edge_type, self.page, self.page_min, last_page))
    }

    pub(crate) fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "type" => Some(Value::from(self.edge_type.as_str())),
            "page" => self.page.map(Value::from),
            "page_min" => Some(Value::from(self.page_min)),
            "color" => self.color.as_deref().map(Value::from),
            "dash" => self.dash.clone().map(Value::from),
            "bend" => self.bend.map(Value::from),
            "opacity" => self.opacity.map(Value::from),
            "line_width" => self.line_width.map(Value::from),
            "visible" => Some(Value::from(self.visible)),
            other => self.extra.get(other).cloned(),
        }
    }

    pub(crate) fn set_field(&mut self, name: &str, v: Value) -> Result<(), SseqError> {
        match name {
            "type" => {
                let tag: String = serde_json::from_value(v)?;
                self.edge_type = EdgeType::from_tag(&tag);
            }
            "page" => self.page = serde_json::from_value(v)?,
            "page_min" => self.page_min = serde_json::from_value(v)?,
            "color" => self.color = serde_json::from_value(v)?,
            "dash" => self.dash = serde_json::from_value(v)?,
            "bend" => self.bend = serde_json::from_value(v)?,
            "opacity" => self.opacity = serde_json::from_value(v)?,
            "line_width" => self.line_width = serde_json::from_value(v)?,
            "visible" => self.visible = serde_json::from_value(v)?,
            "draw_pages" => self.draw_pages = serde_json::from_value(v)?,
            other => {
                self.extra.insert(other.to_string(), v);
            }
        }
        Ok(())
    }
}

/// Minimal, serializable mirror of a spectral sequence.
///
/// Slot `i` of `classes` and `edges` mirrors position `i` of the owning
/// graph's class and edge lists. A projection read from a document may have
/// holes.
#[derive(Clone, Debug)]
pub struct DisplaySseq {
    pub classes: Vec<Option<DisplayClass>>,
    pub edges: Vec<Option<DisplayEdge>>,
    pub page_list: PageList,
    pub min_page_idx: usize,
    pub page_idx: usize,
    pub x_range: Option<[i32; 2]>,
    pub y_range: Option<[i32; 2]>,
    pub initial_x_range: [i32; 2],
    pub initial_y_range: [i32; 2],
    pub default_node: Node,
    pub class_scale: f64,
    pub offset_size: f64,
    pub serialize_sseq_fields: Vec<String>,
    pub serialize_class_fields: Vec<String>,
    pub serialize_edge_fields: Vec<String>,
    pub extra: BTreeMap<String, Value>,
    // derived from the class list, never persisted
    pub(crate) num_classes_by_degree: HashMap<(i32, i32), usize>,
    pub(crate) version: u64,
}

impl Default for DisplaySseq {
    fn default() -> Self {
        DisplaySseq {
            classes: Vec::new(),
            edges: Vec::new(),
            page_list: PageList::default(),
            min_page_idx: 0,
            page_idx: 0,
            x_range: None,
            y_range: None,
            initial_x_range: [0, 10],
            initial_y_range: [0, 10],
            default_node: Node::default(),
            class_scale: 1.0,
            offset_size: 0.3,
            serialize_sseq_fields: fields::names(fields::DEFAULT_SSEQ_FIELDS),
            serialize_class_fields: fields::names(fields::DEFAULT_CLASS_FIELDS),
            serialize_edge_fields: fields::names(fields::DEFAULT_EDGE_FIELDS),
            extra: BTreeMap::new(),
            num_classes_by_degree: HashMap::new(),
            version: 1,
        }
    }
}

impl DisplaySseq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a persisted document with the default ingestion limits.
    pub fn from_json_value(v: Value) -> Result<Self, SseqError> {
        crate::json::from_json_impl(v, &crate::limits::Limits::default())
    }

    pub fn from_json_value_with_limits(v: Value, limits: &crate::limits::Limits) -> Result<Self, SseqError> {
        crate::json::from_json_impl(v, limits)
    }

    pub fn to_json_value(&self) -> Value {
        crate::json::to_json_impl(self)
    }

    pub fn class(&self, slot: usize) -> Option<&DisplayClass> {
        self.classes.get(slot).and_then(Option::as_ref)
    }

    pub fn class_mut(&mut self, slot: usize) -> Option<&mut DisplayClass> {
        self.classes.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn edge(&self, slot: usize) -> Option<&DisplayEdge> {
        self.edges.get(slot).and_then(Option::as_ref)
    }

    pub fn class_count(&self) -> usize {
        self.classes.iter().flatten().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    pub fn num_classes_in_degree(&self, x: i32, y: i32) -> usize {
        self.num_classes_by_degree.get(&(x, y)).copied().unwrap_or(0)
    }

    pub(crate) fn note_class_at(&mut self, x: i32, y: i32) {
        *self.num_classes_by_degree.entry((x, y)).or_insert(0) += 1;
    }

    /// Recount occupancy from the class list.
    pub(crate) fn rebuild_degree_counts(&mut self) {
        self.num_classes_by_degree.clear();
        for c in self.classes.iter().flatten() {
            *self.num_classes_by_degree.entry((c.x, c.y)).or_insert(0) += 1;
        }
    }

    /// Render revision; bumped by every `update`.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Request a re-render.
    pub fn update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn edge_key(&self, e: &DisplayEdge) -> Option<EdgeKey> {
        let source = self.class(e.source)?.key();
        let target = self.class(e.target)?.key();
        Some(EdgeKey {
            edge_type: e.edge_type,
            page: e.page,
            source,
            target,
        })
    }

    pub fn current_page(&self) -> Option<PageEntry> {
        self.page_list.get(self.page_idx)
    }

    /// Slots of the classes drawn on `entry`, evaluated at its start page.
    pub fn classes_on_page(&self, entry: PageEntry) -> Vec<usize> {
        let page = entry.start();
        self.classes
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().filter(|c| c.draw_on_page(page)).map(|_| i))
            .collect()
    }

    /// Slots of the edges drawn on `entry`: visible, with a drawn-page span
    /// meeting the entry and both endpoints drawn at its start page.
    pub fn edges_on_page(&self, entry: PageEntry) -> Vec<usize> {
        let last = self.page_list.last_page();
        let (lo, hi) = (entry.start(), entry.end());
        let mut out = Vec::new();
        for (i, e) in self.edges.iter().enumerate() {
            let Some(e) = e else { continue };
            if !e.visible {
                continue;
            }
            let (from, to) = e.draw_span(last);
            if from > hi || to < lo {
                continue;
            }
            let drawn = |slot: usize| self.class(slot).is_some_and(|c| c.draw_on_page(lo));
            if drawn(e.source) && drawn(e.target) {
                out.push(i);
            }
        }
        out
    }

    pub(crate) fn field_value(&self, name: &str) -> Option<Value> {
        let v = match name {
            "min_page_idx" => Value::from(self.min_page_idx),
            "page_list" => serde_json::to_value(&self.page_list).ok()?,
            "x_range" => Value::from(self.x_range?.to_vec()),
            "y_range" => Value::from(self.y_range?.to_vec()),
            "initial_x_range" => Value::from(self.initial_x_range.to_vec()),
            "initial_y_range" => Value::from(self.initial_y_range.to_vec()),
            "default_node" => serde_json::to_value(&self.default_node).ok()?,
            "class_scale" => Value::from(self.class_scale),
            "offset_size" => Value::from(self.offset_size),
            "serialize_sseq_fields" => Value::from(self.serialize_sseq_fields.clone()),
            "serialize_class_fields" => Value::from(self.serialize_class_fields.clone()),
            "serialize_edge_fields" => Value::from(self.serialize_edge_fields.clone()),
            other => self.extra.get(other)?.clone(),
        };
        Some(v)
    }

    pub(crate) fn set_field(&mut self, name: &str, v: Value) -> Result<(), SseqError> {
        match name {
            "min_page_idx" => self.min_page_idx = serde_json::from_value(v)?,
            "page_list" => self.page_list = PageList::from_entries(serde_json::from_value(v)?)?,
            "x_range" => self.x_range = serde_json::from_value(v)?,
            "y_range" => self.y_range = serde_json::from_value(v)?,
            "initial_x_range" => self.initial_x_range = serde_json::from_value(v)?,
            "initial_y_range" => self.initial_y_range = serde_json::from_value(v)?,
            "default_node" => self.default_node = serde_json::from_value(v)?,
            "class_scale" => self.class_scale = serde_json::from_value(v)?,
            "offset_size" => self.offset_size = serde_json::from_value(v)?,
            "serialize_sseq_fields" => self.serialize_sseq_fields = serde_json::from_value(v)?,
            "serialize_class_fields" => self.serialize_class_fields = serde_json::from_value(v)?,
            "serialize_edge_fields" => self.serialize_edge_fields = serde_json::from_value(v)?,
            other => {
                self.extra.insert(other.to_string(), v);
            }
        }
        Ok(())
    }
}
