use crate::display::{DisplayClass, DisplayEdge, DisplaySseq};
use crate::error::SseqError;
use crate::limits::{self, Limits};
use crate::model::{EdgeType, Node, INFINITY};
use crate::templates::{NodeArena, NodeHandle};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const DOC_VERSION: u32 = 1;

pub fn to_json_impl(d: &DisplaySseq) -> Value {
    let mut doc = Map::new();
    doc.insert("version".into(), Value::from(DOC_VERSION));
    for name in &d.serialize_sseq_fields {
        if let Some(v) = d.field_value(name) {
            doc.insert(name.clone(), v);
        }
    }

    let mut arena = NodeArena::new();
    let classes: Vec<Value> = d
        .classes
        .iter()
        .map(|slot| match slot {
            None => Value::Null,
            Some(c) => {
                let mut obj = Map::new();
                for name in &d.serialize_class_fields {
                    if let Some(v) = c.field_value(name) {
                        obj.insert(name.clone(), v);
                    }
                }
                let handles: Vec<Value> = c.node_list.iter().map(|n| Value::from(arena.intern(n).0)).collect();
                obj.insert("node_list".into(), Value::Array(handles));
                Value::Object(obj)
            }
        })
        .collect();

    let edges: Vec<Value> = d
        .edges
        .iter()
        .map(|slot| match slot {
            None => Value::Null,
            Some(e) => {
                let mut obj = Map::new();
                for name in &d.serialize_edge_fields {
                    if let Some(v) = e.field_value(name) {
                        obj.insert(name.clone(), v);
                    }
                }
                obj.insert("type".into(), Value::from(e.edge_type.as_str()));
                obj.insert("source".into(), Value::from(e.source));
                obj.insert("target".into(), Value::from(e.target));
                if e.edge_type != EdgeType::Extension {
                    if let Some((from, to)) = e.draw_pages {
                        obj.insert("draw_pages".into(), Value::from(vec![from, to]));
                    }
                }
                Value::Object(obj)
            }
        })
        .collect();

    let templates: Vec<Value> = arena
        .templates()
        .iter()
        .filter_map(|n| serde_json::to_value(n).ok())
        .collect();
    debug!(
        classes = classes.len(),
        edges = edges.len(),
        templates = templates.len(),
        "serialized display sseq"
    );
    doc.insert("classes".into(), Value::Array(classes));
    doc.insert("edges".into(), Value::Array(edges));
    doc.insert("master_node_list".into(), Value::Array(templates));
    Value::Object(doc)
}

pub fn from_json_impl(v: Value, caps: &Limits) -> Result<DisplaySseq, SseqError> {
    #[derive(Deserialize)]
    struct DocDe {
        version: Option<u32>,
        #[serde(default)]
        classes: Vec<Option<Map<String, Value>>>,
        #[serde(default)]
        edges: Vec<Option<Map<String, Value>>>,
        #[serde(default)]
        master_node_list: Vec<Node>,
        #[serde(flatten)]
        settings: Map<String, Value>,
    }
    let doc: DocDe = serde_json::from_value(v)?;
    if let Some(ver) = doc.version {
        if ver > DOC_VERSION {
            return Err(SseqError::InvalidDocument(format!("unsupported version {ver}")));
        }
    }
    if doc.classes.len() > caps.max_classes {
        return Err(SseqError::LimitExceeded { what: "classes", max: caps.max_classes });
    }
    if doc.edges.len() > caps.max_edges {
        return Err(SseqError::LimitExceeded { what: "edges", max: caps.max_edges });
    }
    if doc.master_node_list.len() > caps.max_node_templates {
        return Err(SseqError::LimitExceeded { what: "master_node_list", max: caps.max_node_templates });
    }

    let mut d = DisplaySseq::new();
    for (name, value) in doc.settings {
        d.set_field(&name, value)
            .map_err(|e| SseqError::InvalidDocument(format!("field '{name}': {e}")))?;
    }
    if d.page_list.len() > caps.max_page_list_entries {
        return Err(SseqError::LimitExceeded { what: "page_list", max: caps.max_page_list_entries });
    }

    // Node schedules hold template indices; give every class its own copies.
    let arena = NodeArena::from_templates(doc.master_node_list);
    d.classes.reserve(doc.classes.len());
    for (i, slot) in doc.classes.into_iter().enumerate() {
        let class = match slot {
            None => None,
            Some(obj) => Some(class_from_object(i, obj, &arena, &d.default_node, caps)?),
        };
        d.classes.push(class);
    }
    // Occupancy counters are derived, not stored.
    d.rebuild_degree_counts();

    // Edge endpoints are class positions; they must land on a live slot.
    d.edges.reserve(doc.edges.len());
    for (i, slot) in doc.edges.into_iter().enumerate() {
        let edge = match slot {
            None => None,
            Some(obj) => {
                let e = edge_from_object(i, obj)?;
                if d.class(e.source).is_none() || d.class(e.target).is_none() {
                    warn!(edge = i, source = e.source, target = e.target, "dropping edge with missing endpoint");
                    None
                } else {
                    Some(e)
                }
            }
        };
        d.edges.push(edge);
    }
    debug!(classes = d.class_count(), edges = d.edge_count(), "loaded display sseq");
    Ok(d)
}

fn class_from_object(
    i: usize,
    mut obj: Map<String, Value>,
    arena: &NodeArena,
    default_node: &Node,
    caps: &Limits,
) -> Result<DisplayClass, SseqError> {
    let invalid = |msg: String| SseqError::InvalidDocument(format!("class {i}: {msg}"));
    if !obj.contains_key("x") || !obj.contains_key("y") {
        return Err(invalid("missing bidegree".into()));
    }
    let handles: Option<Vec<NodeHandle>> = match obj.remove("node_list") {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value(v).map_err(|e| invalid(e.to_string()))?),
    };
    let mut c = DisplayClass::default();
    let mut has_page_list = false;
    for (name, value) in obj {
        has_page_list |= name == "page_list";
        c.set_field(&name, value).map_err(|e| invalid(format!("field '{name}': {e}")))?;
    }
    if !limits::in_coord_bounds(c.x) || !limits::in_coord_bounds(c.y) {
        return Err(SseqError::OutOfBounds(format!("class {i} at ({}, {})", c.x, c.y)));
    }
    if let Some(handles) = handles {
        if handles.len() > caps.max_nodes_per_class {
            return Err(SseqError::LimitExceeded { what: "node_list", max: caps.max_nodes_per_class });
        }
        c.node_list = handles
            .into_iter()
            .map(|h| arena.materialize(h).ok_or_else(|| invalid(format!("unknown node template {}", h.0))))
            .collect::<Result<_, _>>()?;
    }
    match (has_page_list, c.node_list.is_empty()) {
        (false, true) => {
            c.page_list = vec![INFINITY];
            c.node_list = vec![default_node.clone()];
        }
        (false, false) => {
            c.page_list = vec![INFINITY; c.node_list.len()];
        }
        (true, true) => {
            c.node_list = vec![default_node.clone(); c.page_list.len()];
        }
        (true, false) => {}
    }
    if c.page_list.len() != c.node_list.len() {
        return Err(invalid(format!(
            "page_list has {} entries but node_list has {}",
            c.page_list.len(),
            c.node_list.len()
        )));
    }
    Ok(c)
}

fn edge_from_object(i: usize, mut obj: Map<String, Value>) -> Result<DisplayEdge, SseqError> {
    let invalid = |msg: String| SseqError::InvalidDocument(format!("edge {i}: {msg}"));
    let mut endpoint = |key: &str| -> Result<usize, SseqError> {
        obj.remove(key)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .ok_or_else(|| invalid(format!("'{key}' must be a class position")))
    };
    let source = endpoint("source")?;
    let target = endpoint("target")?;
    let mut e = DisplayEdge::new(EdgeType::Structline, source, target);
    for (name, value) in obj {
        e.set_field(&name, value).map_err(|err| invalid(format!("field '{name}': {err}")))?;
    }
    if e.edge_type == EdgeType::Extension {
        // depends on the page list of the session that wrote it
        e.draw_pages = None;
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with_classes(classes: Value) -> Value {
        json!({ "version": 1, "classes": classes, "edges": [], "master_node_list": [{ "shape": "circle", "size": 6.0, "fill": true, "stroke": true }] })
    }

    #[test]
    fn holes_are_preserved_and_counters_rebuilt() {
        let v = doc_with_classes(json!([
            { "x": 0, "y": 0, "idx": 0, "page_list": [INFINITY], "node_list": [0] },
            null,
            { "x": 0, "y": 0, "idx": 1, "page_list": [INFINITY], "node_list": [0] }
        ]));
        let d = from_json_impl(v, &Limits::default()).unwrap();
        assert_eq!(d.classes.len(), 3);
        assert!(d.classes[1].is_none());
        assert_eq!(d.num_classes_in_degree(0, 0), 2);
    }

    #[test]
    fn unknown_template_is_rejected() {
        let v = doc_with_classes(json!([{ "x": 0, "y": 0, "page_list": [INFINITY], "node_list": [4] }]));
        let err = from_json_impl(v, &Limits::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_structure");
    }

    #[test]
    fn missing_schedule_defaults_to_one_segment() {
        let v = doc_with_classes(json!([{ "x": 2, "y": 1 }]));
        let d = from_json_impl(v, &Limits::default()).unwrap();
        let c = d.class(0).unwrap();
        assert_eq!(c.page_list, vec![INFINITY]);
        assert_eq!(c.node_list.len(), 1);
    }

    #[test]
    fn dangling_edges_become_holes() {
        let v = json!({
            "classes": [{ "x": 0, "y": 0 }],
            "edges": [{ "type": "Structline", "source": 0, "target": 3 }]
        });
        let d = from_json_impl(v, &Limits::default()).unwrap();
        assert_eq!(d.edges.len(), 1);
        assert!(d.edges[0].is_none());
    }

    #[test]
    fn extension_span_is_not_read_back() {
        let v = json!({
            "classes": [{ "x": 0, "y": 0 }, { "x": 0, "y": 1 }],
            "edges": [
                { "type": "Extension", "source": 0, "target": 1, "draw_pages": [5, 5] },
                { "type": "Differential", "page": 2, "source": 0, "target": 1, "draw_pages": [2, 2] }
            ]
        });
        let d = from_json_impl(v, &Limits::default()).unwrap();
        assert_eq!(d.edge(0).unwrap().draw_pages, None);
        assert_eq!(d.edge(1).unwrap().draw_pages, Some((2, 2)));
    }

    #[test]
    fn caps_are_enforced() {
        let caps = Limits { max_classes: 1, ..Limits::default() };
        let v = doc_with_classes(json!([{ "x": 0, "y": 0 }, { "x": 1, "y": 0 }]));
        let err = from_json_impl(v, &caps).unwrap_err();
        assert!(matches!(err, SseqError::LimitExceeded { what: "classes", .. }));
    }

    #[test]
    fn out_of_bounds_degree_is_rejected() {
        let v = doc_with_classes(json!([{ "x": 5_000_000, "y": 0 }]));
        assert_eq!(from_json_impl(v, &Limits::default()).unwrap_err().code(), "out_of_bounds");
    }
}
