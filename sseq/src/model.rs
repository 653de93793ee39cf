use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page numbers are signed so that non-positive requests can be rejected
/// rather than wrapped.
pub type Page = i32;

/// Symbolic last page. Classes that never die live until here.
pub const INFINITY: Page = 10_000;

static NEXT_UNIQUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity shared by classes and edges.
pub(crate) fn next_unique_id() -> u64 {
    NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Position of a class in its graph's flat class list. Classes are never
/// removed, so an id stays valid for the graph's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub const fn new(raw: u32) -> Self {
        ClassId(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable edge identity. Unlike the edge's list position it survives the
/// removal of earlier edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub(crate) u64);

impl EdgeId {
    pub const fn new(raw: u64) -> Self {
        EdgeId(raw)
    }
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Endpoint argument for the add-edge operations. `Dummy` is what generator
/// code hands over when it could not produce a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClassRef {
    #[default]
    Dummy,
    Class(ClassId),
}

impl ClassRef {
    pub fn is_dummy(self) -> bool {
        matches!(self, ClassRef::Dummy)
    }
    pub fn id(self) -> Option<ClassId> {
        match self {
            ClassRef::Dummy => None,
            ClassRef::Class(id) => Some(id),
        }
    }
}

impl From<ClassId> for ClassRef {
    fn from(id: ClassId) -> Self {
        ClassRef::Class(id)
    }
}

impl From<Option<ClassId>> for ClassRef {
    fn from(id: Option<ClassId>) -> Self {
        id.map_or(ClassRef::Dummy, ClassRef::Class)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Structline,
    Differential,
    Extension,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Structline => "Structline",
            EdgeType::Differential => "Differential",
            EdgeType::Extension => "Extension",
        }
    }

    /// Unknown tags read as structlines.
    pub fn from_tag(tag: &str) -> EdgeType {
        match tag {
            "Differential" => EdgeType::Differential,
            "Extension" => EdgeType::Extension,
            _ => EdgeType::Structline,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an add-edge request: either a created edge or the dummy
/// sentinel of the requested kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeRef {
    edge_type: EdgeType,
    id: Option<EdgeId>,
}

impl EdgeRef {
    pub const fn dummy(edge_type: EdgeType) -> Self {
        EdgeRef { edge_type, id: None }
    }
    pub(crate) const fn created(edge_type: EdgeType, id: EdgeId) -> Self {
        EdgeRef { edge_type, id: Some(id) }
    }
    pub fn is_dummy(&self) -> bool {
        self.id.is_none()
    }
    pub fn id(&self) -> Option<EdgeId> {
        self.id
    }
    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Diamond,
    Empty,
}

/// Marker drawn for a class on some range of pages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub shape: Shape,
    #[serde(default = "default_node_size")]
    pub size: f64,
    #[serde(default)]
    pub fill: bool,
    #[serde(default)]
    pub stroke: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

fn default_node_size() -> f64 {
    6.0
}

impl Default for Node {
    fn default() -> Self {
        Node {
            shape: Shape::Circle,
            size: default_node_size(),
            fill: true,
            stroke: true,
            color: None,
            opacity: None,
        }
    }
}

/// Node in effect on `page`: the first schedule segment ending at or after
/// `page`. `None` once the class has died.
pub(crate) fn scheduled_node<'a>(page_list: &[Page], node_list: &'a [Node], page: Page) -> Option<&'a Node> {
    let seg = page_list.iter().position(|&p| p >= page)?;
    node_list.get(seg)
}

/// JavaScript-style truthiness, used by the serialization write path.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A positioned node of the spectral sequence.
#[derive(Clone, Debug)]
pub struct SseqClass {
    pub(crate) unique_id: u64,
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) idx: usize,
    pub(crate) class_list_index: usize,
    pub x_offset: Option<f64>,
    pub y_offset: Option<f64>,
    pub name: String,
    pub extra_info: String,
    pub(crate) page_list: Vec<Page>,
    pub(crate) node_list: Vec<Node>,
    pub visible: bool,
    // structlines and differentials, creation order
    pub(crate) edges: Vec<EdgeId>,
    pub(crate) attributes: BTreeMap<String, Value>,
}

impl SseqClass {
    pub(crate) fn new(x: i32, y: i32, idx: usize, class_list_index: usize, node: Node) -> Self {
        SseqClass {
            unique_id: next_unique_id(),
            x,
            y,
            idx,
            class_list_index,
            x_offset: None,
            y_offset: None,
            name: String::new(),
            extra_info: String::new(),
            page_list: vec![INFINITY],
            node_list: vec![node],
            visible: true,
            edges: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ClassId {
        ClassId(self.class_list_index as u32)
    }
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }
    pub fn x(&self) -> i32 {
        self.x
    }
    pub fn y(&self) -> i32 {
        self.y
    }
    pub fn degree(&self) -> (i32, i32) {
        (self.x, self.y)
    }
    pub fn idx(&self) -> usize {
        self.idx
    }
    pub fn class_list_index(&self) -> usize {
        self.class_list_index
    }
    pub fn page_list(&self) -> &[Page] {
        &self.page_list
    }
    pub fn node_list(&self) -> &[Node] {
        &self.node_list
    }
    /// Nodes may be restyled in place; the schedule length is fixed.
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.node_list
    }
    /// Last page on which the class is still alive.
    pub fn last_page(&self) -> Page {
        self.page_list.last().copied().unwrap_or(INFINITY)
    }
    pub fn node_on_page(&self, page: Page) -> Option<&Node> {
        scheduled_node(&self.page_list, &self.node_list, page)
    }
    pub fn draw_on_page(&self, page: Page) -> bool {
        self.visible && self.node_on_page(page).is_some()
    }
    /// Incident structlines and differentials.
    pub fn incident_edges(&self) -> &[EdgeId] {
        &self.edges
    }
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Value of a named field for the serialization write path, `None` when
    /// it is falsy.
    pub(crate) fn field_value(&self, name: &str) -> Option<Value> {
        let v = match name {
            "x" => Value::from(self.x),
            "y" => Value::from(self.y),
            "idx" => Value::from(self.idx),
            "unique_id" => Value::from(self.unique_id),
            "x_offset" => self.x_offset.map_or(Value::Null, Value::from),
            "y_offset" => self.y_offset.map_or(Value::Null, Value::from),
            "name" => Value::from(self.name.as_str()),
            "extra_info" => Value::from(self.extra_info.as_str()),
            "page_list" => Value::from(self.page_list.clone()),
            "node_list" => serde_json::to_value(&self.node_list).ok()?,
            "visible" => Value::from(self.visible),
            other => self.attributes.get(other)?.clone(),
        };
        truthy(&v).then_some(v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Structline,
    Differential { page: Page },
    Extension,
}

impl EdgeKind {
    pub fn edge_type(self) -> EdgeType {
        match self {
            EdgeKind::Structline => EdgeType::Structline,
            EdgeKind::Differential { .. } => EdgeType::Differential,
            EdgeKind::Extension => EdgeType::Extension,
        }
    }
    pub fn page(self) -> Option<Page> {
        match self {
            EdgeKind::Differential { page } => Some(page),
            _ => None,
        }
    }
}

/// Inclusive span of pages an edge is drawn on, before endpoint survival is
/// taken into account. Extensions live from the last page breakpoint on.
pub(crate) fn draw_span(edge_type: EdgeType, page: Option<Page>, page_min: Page, last_page: Page) -> (Page, Page) {
    match edge_type {
        EdgeType::Structline => (page_min, INFINITY),
        EdgeType::Differential => {
            let p = page.unwrap_or(page_min);
            (p, p)
        }
        EdgeType::Extension => (last_page, INFINITY),
    }
}

/// A typed relation between two classes of the same graph.
#[derive(Clone, Debug)]
pub struct Edge {
    pub(crate) unique_id: EdgeId,
    pub(crate) edge_list_index: usize,
    pub(crate) kind: EdgeKind,
    pub(crate) source: ClassId,
    pub(crate) target: ClassId,
    pub color: Option<String>,
    pub dash: Option<Vec<f64>>,
    pub bend: Option<f64>,
    pub opacity: Option<f64>,
    pub line_width: Option<f64>,
    pub page_min: Page,
    pub visible: bool,
    pub(crate) attributes: BTreeMap<String, Value>,
}

impl Edge {
    pub(crate) fn new(unique_id: EdgeId, edge_list_index: usize, kind: EdgeKind, source: ClassId, target: ClassId) -> Self {
        Edge {
            unique_id,
            edge_list_index,
            kind,
            source,
            target,
            color: None,
            dash: None,
            bend: None,
            opacity: None,
            line_width: None,
            page_min: 0,
            visible: true,
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.unique_id
    }
    pub fn edge_list_index(&self) -> usize {
        self.edge_list_index
    }
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }
    pub fn edge_type(&self) -> EdgeType {
        self.kind.edge_type()
    }
    /// Differential page; `None` for the other kinds.
    pub fn page(&self) -> Option<Page> {
        self.kind.page()
    }
    pub fn source(&self) -> ClassId {
        self.source
    }
    pub fn target(&self) -> ClassId {
        self.target
    }
    pub fn other_class(&self, c: ClassId) -> ClassId {
        if self.source == c {
            self.target
        } else {
            self.source
        }
    }
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub(crate) fn field_value(&self, name: &str) -> Option<Value> {
        let v = match name {
            "type" => Value::from(self.edge_type().as_str()),
            "page" => self.page().map_or(Value::Null, Value::from),
            "page_min" => Value::from(self.page_min),
            "color" => self.color.as_deref().map_or(Value::Null, Value::from),
            "dash" => self.dash.clone().map_or(Value::Null, Value::from),
            "bend" => self.bend.map_or(Value::Null, Value::from),
            "opacity" => self.opacity.map_or(Value::Null, Value::from),
            "line_width" => self.line_width.map_or(Value::Null, Value::from),
            "visible" => Value::from(self.visible),
            other => self.attributes.get(other)?.clone(),
        };
        truthy(&v).then_some(v)
    }
}
