//! Field allowlists shared by the live sync path and the serializer.
//!
//! Live sync copies a fixed set of typed fields from the real model into the
//! projection. Serialization works on field names, so that documents can
//! carry the allowlists themselves and callers can extend them.

use crate::display::{DisplayClass, DisplayEdge};
use crate::model::{draw_span, Edge, Page, SseqClass};

pub const DEFAULT_SSEQ_FIELDS: &[&str] = &[
    "min_page_idx",
    "page_list",
    "x_range",
    "y_range",
    "initial_x_range",
    "initial_y_range",
    "default_node",
    "class_scale",
    "offset_size",
    "serialize_sseq_fields",
    "serialize_class_fields",
    "serialize_edge_fields",
];

// node_list is written separately, through the template arena
pub const DEFAULT_CLASS_FIELDS: &[&str] = &[
    "x",
    "y",
    "name",
    "extra_info",
    "unique_id",
    "idx",
    "x_offset",
    "y_offset",
    "page_list",
    "visible",
];

// source and target are written separately, as class positions
pub const DEFAULT_EDGE_FIELDS: &[&str] = &["color", "bend", "dash", "line_width", "opacity", "page_min", "page", "type"];

pub(crate) fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Append names not yet present.
pub(crate) fn extend_unique<S: AsRef<str>>(list: &mut Vec<String>, extra: &[S]) {
    for f in extra {
        let f = f.as_ref();
        if !list.iter().any(|x| x == f) {
            list.push(f.to_string());
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClassField {
    X,
    Y,
    Idx,
    UniqueId,
    XOffset,
    YOffset,
    Name,
    ExtraInfo,
    PageList,
    NodeList,
    Visible,
}

pub(crate) const CLASS_UPDATE_FIELDS: &[ClassField] = &[
    ClassField::X,
    ClassField::Y,
    ClassField::Idx,
    ClassField::UniqueId,
    ClassField::XOffset,
    ClassField::YOffset,
    ClassField::Name,
    ClassField::ExtraInfo,
    ClassField::PageList,
    ClassField::NodeList,
    ClassField::Visible,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EdgeField {
    Page,
    PageMin,
    Color,
    DrawPages,
    Visible,
    Bend,
    Opacity,
    Dash,
    LineWidth,
}

pub(crate) const EDGE_UPDATE_FIELDS: &[EdgeField] = &[
    EdgeField::Page,
    EdgeField::PageMin,
    EdgeField::Color,
    EdgeField::DrawPages,
    EdgeField::Visible,
    EdgeField::Bend,
    EdgeField::Opacity,
    EdgeField::Dash,
    EdgeField::LineWidth,
];

/// Copy the class allowlist into `d` and drop its cached tooltip.
pub(crate) fn sync_class(d: &mut DisplayClass, c: &SseqClass) {
    for field in CLASS_UPDATE_FIELDS {
        match field {
            ClassField::X => d.x = c.x,
            ClassField::Y => d.y = c.y,
            ClassField::Idx => d.idx = c.idx,
            ClassField::UniqueId => d.unique_id = c.unique_id,
            ClassField::XOffset => d.x_offset = c.x_offset,
            ClassField::YOffset => d.y_offset = c.y_offset,
            ClassField::Name => d.name.clone_from(&c.name),
            ClassField::ExtraInfo => d.extra_info.clone_from(&c.extra_info),
            ClassField::PageList => d.page_list.clone_from(&c.page_list),
            ClassField::NodeList => d.node_list.clone_from(&c.node_list),
            ClassField::Visible => d.visible = c.visible,
        }
    }
    d.tooltip = None;
}

/// Copy the edge allowlist into `d`. `last_page` feeds the drawn-page span.
pub(crate) fn sync_edge(d: &mut DisplayEdge, e: &Edge, last_page: Page) {
    for field in EDGE_UPDATE_FIELDS {
        match field {
            EdgeField::Page => d.page = e.page(),
            EdgeField::PageMin => d.page_min = e.page_min,
            EdgeField::Color => d.color.clone_from(&e.color),
            EdgeField::DrawPages => {
                d.draw_pages = Some(draw_span(e.edge_type(), e.page(), e.page_min, last_page));
            }
            EdgeField::Visible => d.visible = e.visible,
            EdgeField::Bend => d.bend = e.bend,
            EdgeField::Opacity => d.opacity = e.opacity,
            EdgeField::Dash => d.dash.clone_from(&e.dash),
            EdgeField::LineWidth => d.line_width = e.line_width,
        }
    }
}
