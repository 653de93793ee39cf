use crate::error;
use crate::interop::{arr_f64, arr_i32, arr_u32, arr_u8, new_obj, set_kv, to_js};
use crate::Sseq;
use serde::Serialize;
use sseq::{ClassId, EdgeId, EdgeRef, EdgeType, PageEntry, Page};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct ClassView<'a> {
    x: i32,
    y: i32,
    idx: usize,
    name: &'a str,
    extra_info: &'a str,
    x_offset: Option<f64>,
    y_offset: Option<f64>,
    page_list: &'a [Page],
    visible: bool,
    tooltip: &'a str,
}

#[derive(Serialize)]
struct EdgeView<'a> {
    #[serde(rename = "type")]
    edge_type: &'static str,
    source: u32,
    target: u32,
    page: Option<Page>,
    color: Option<&'a str>,
    draw_pages: Option<(Page, Page)>,
}

// Edge ids are process counters; they stay well inside f64's exact range.
fn edge_id_js(id: EdgeId) -> f64 {
    id.raw() as f64
}

fn edge_id_rs(id: f64) -> EdgeId {
    EdgeId::new(id as u64)
}

fn entry_js(entry: Option<PageEntry>) -> JsValue {
    entry.and_then(|e| to_js(&e).ok()).unwrap_or(JsValue::NULL)
}

impl Sseq {
    fn edge_result(r: EdgeRef) -> Option<f64> {
        r.id().map(edge_id_js)
    }

    fn check_endpoints(&self, source: u32, target: u32) -> Option<JsValue> {
        for id in [source, target] {
            if self.inner.class(ClassId::new(id)).is_none() {
                return Some(error::invalid_id("class", id as f64));
            }
        }
        None
    }
}

#[wasm_bindgen]
impl Sseq {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Sseq {
        crate::Sseq::rs_new()
    }
    pub fn version(&self) -> u64 {
        self.rs_version()
    }

    // Classes
    pub fn add_class(&mut self, x: i32, y: i32) -> u32 {
        self.inner.add_class(x, y).raw()
    }
    pub fn class_count(&self) -> u32 {
        self.inner.class_count() as u32
    }
    pub fn set_shift(&mut self, x: i32, y: i32) {
        self.inner.set_shift(x, y);
    }
    pub fn add_to_shift(&mut self, dx: i32, dy: i32) {
        self.inner.add_to_shift(dx, dy);
    }
    pub fn swap_index_up(&mut self, id: u32) -> bool {
        self.inner.swap_index_up(ClassId::new(id))
    }
    pub fn swap_index_down(&mut self, id: u32) -> bool {
        self.inner.swap_index_down(ClassId::new(id))
    }
    pub fn set_class_name(&mut self, id: u32, name: &str) -> bool {
        let id = ClassId::new(id);
        match self.inner.class_mut(id) {
            Some(c) => c.name = name.to_string(),
            None => return false,
        }
        self.inner.update_class(id)
    }
    pub fn set_class_offset(&mut self, id: u32, x_offset: f64, y_offset: f64) -> bool {
        if !x_offset.is_finite() || !y_offset.is_finite() {
            return false;
        }
        let id = ClassId::new(id);
        match self.inner.class_mut(id) {
            Some(c) => {
                c.x_offset = Some(x_offset);
                c.y_offset = Some(y_offset);
            }
            None => return false,
        }
        self.inner.update_class(id)
    }
    pub fn set_class_offset_res(&mut self, id: u32, x_offset: f64, y_offset: f64) -> JsValue {
        if !x_offset.is_finite() {
            return error::non_finite("x_offset");
        }
        if !y_offset.is_finite() {
            return error::non_finite("y_offset");
        }
        if self.inner.class(ClassId::new(id)).is_none() {
            return error::invalid_id("class", id as f64);
        }
        error::ok(JsValue::from_bool(self.set_class_offset(id, x_offset, y_offset)))
    }
    pub fn set_class_page(&mut self, id: u32, page: i32) -> bool {
        self.inner.set_page(ClassId::new(id), page)
    }
    pub fn get_class(&mut self, id: u32) -> JsValue {
        let slot = id as usize;
        let Some(c) = self.inner.class(ClassId::new(id)).cloned() else {
            return JsValue::NULL;
        };
        let Some(d) = self.inner.display_mut().class_mut(slot) else {
            return JsValue::NULL;
        };
        let view = ClassView {
            x: c.x(),
            y: c.y(),
            idx: c.idx(),
            name: &c.name,
            extra_info: &c.extra_info,
            x_offset: c.x_offset,
            y_offset: c.y_offset,
            page_list: c.page_list(),
            visible: c.visible,
            tooltip: d.tooltip(),
        };
        to_js(&view).unwrap_or(JsValue::NULL)
    }
    pub fn get_class_res(&mut self, id: u32) -> JsValue {
        if self.inner.class(ClassId::new(id)).is_none() {
            return error::invalid_id("class", id as f64);
        }
        error::ok(self.get_class(id))
    }

    // Edges
    pub fn add_structline(&mut self, source: u32, target: u32) -> Option<f64> {
        Self::edge_result(self.inner.add_structline(ClassId::new(source), ClassId::new(target)))
    }
    pub fn add_differential(&mut self, source: u32, target: u32, page: i32) -> Option<f64> {
        Self::edge_result(self.inner.add_differential(ClassId::new(source), ClassId::new(target), page))
    }
    pub fn add_extension(&mut self, source: u32, target: u32) -> Option<f64> {
        Self::edge_result(self.inner.add_extension(ClassId::new(source), ClassId::new(target)))
    }
    pub fn add_structline_res(&mut self, source: u32, target: u32) -> JsValue {
        if let Some(e) = self.check_endpoints(source, target) {
            return e;
        }
        match self.add_structline(source, target) {
            Some(id) => error::ok(JsValue::from_f64(id)),
            None => error::err("dummy_edge", "structline was not created", None),
        }
    }
    pub fn add_differential_res(&mut self, source: u32, target: u32, page: i32) -> JsValue {
        if let Some(e) = self.check_endpoints(source, target) {
            return e;
        }
        if page <= 0 {
            return error::invalid_page(page);
        }
        match self.add_differential(source, target, page) {
            Some(id) => error::ok(JsValue::from_f64(id)),
            None => error::err("dummy_edge", "differential was not created", None),
        }
    }
    pub fn add_extension_res(&mut self, source: u32, target: u32) -> JsValue {
        if let Some(e) = self.check_endpoints(source, target) {
            return e;
        }
        match self.add_extension(source, target) {
            Some(id) => error::ok(JsValue::from_f64(id)),
            None => error::err("dummy_edge", "extension was not created", None),
        }
    }
    pub fn delete_edge(&mut self, id: f64) -> bool {
        self.inner.delete_edge(edge_id_rs(id))
    }
    pub fn delete_edge_res(&mut self, id: f64) -> JsValue {
        if self.inner.edge(edge_id_rs(id)).is_none() {
            return error::invalid_id("edge", id);
        }
        error::ok(JsValue::from_bool(self.delete_edge(id)))
    }
    pub fn delete_duplicate_edges(&mut self) -> u32 {
        self.inner.delete_duplicate_edges() as u32
    }
    pub fn edge_count(&self) -> u32 {
        self.inner.edge_count() as u32
    }
    pub fn get_edge(&self, id: f64) -> JsValue {
        let id = edge_id_rs(id);
        let Some(e) = self.inner.edge(id) else {
            return JsValue::NULL;
        };
        let draw_pages = self
            .inner
            .display()
            .edge(e.edge_list_index())
            .map(|d| d.draw_span(self.inner.page_list().last_page()));
        let view = EdgeView {
            edge_type: e.edge_type().as_str(),
            source: e.source().raw(),
            target: e.target().raw(),
            page: e.page(),
            color: e.color.as_deref(),
            draw_pages,
        };
        to_js(&view).unwrap_or(JsValue::NULL)
    }

    pub fn update(&mut self) {
        self.inner.update();
    }

    // Typed arrays getters
    pub fn get_class_data(&self) -> JsValue {
        let classes = self.inner.classes();
        let ids: Vec<u32> = classes.iter().map(|c| c.id().raw()).collect();
        let pos: Vec<i32> = classes.iter().flat_map(|c| [c.x(), c.y()]).collect();
        let idx: Vec<u32> = classes.iter().map(|c| c.idx() as u32).collect();
        let obj = new_obj();
        set_kv(&obj, "ids", &arr_u32(&ids).into());
        set_kv(&obj, "positions", &arr_i32(&pos).into());
        set_kv(&obj, "idx", &arr_u32(&idx).into());
        obj.into()
    }
    pub fn get_edge_data(&self) -> JsValue {
        let edges = self.inner.edges();
        let ids: Vec<f64> = edges.iter().map(|e| edge_id_js(e.id())).collect();
        let ends: Vec<u32> = edges
            .iter()
            .flat_map(|e| [e.source().raw(), e.target().raw()])
            .collect();
        let kinds: Vec<u8> = edges
            .iter()
            .map(|e| match e.edge_type() {
                EdgeType::Structline => 0,
                EdgeType::Differential => 1,
                EdgeType::Extension => 2,
            })
            .collect();
        // 0 for edges without a page
        let pages: Vec<i32> = edges.iter().map(|e| e.page().unwrap_or(0)).collect();
        let obj = new_obj();
        set_kv(&obj, "ids", &arr_f64(&ids).into());
        set_kv(&obj, "endpoints", &arr_u32(&ends).into());
        set_kv(&obj, "kinds", &arr_u8(&kinds).into());
        set_kv(&obj, "pages", &arr_i32(&pages).into());
        obj.into()
    }

    // Pages
    pub fn page_list(&self) -> JsValue {
        to_js(self.inner.page_list()).unwrap_or(JsValue::NULL)
    }
    pub fn add_page(&mut self, page: i32) {
        self.inner.add_page_to_page_list(page);
    }
    pub fn add_page_range(&mut self, start: i32, end: i32) {
        self.inner.add_page_range_to_page_list(start, end);
    }
    pub fn page_idx(&self) -> u32 {
        self.inner.page_idx() as u32
    }
    pub fn select_page_idx(&mut self, idx: u32) -> JsValue {
        entry_js(self.inner.select_page_idx(idx as usize))
    }
    pub fn next_page(&mut self) -> JsValue {
        entry_js(self.inner.next_page())
    }
    pub fn previous_page(&mut self) -> JsValue {
        entry_js(self.inner.previous_page())
    }
    pub fn visible_classes(&self) -> js_sys::Uint32Array {
        let ids: Vec<u32> = self.inner.visible_classes().into_iter().map(ClassId::raw).collect();
        arr_u32(&ids)
    }
    pub fn visible_edges(&self) -> js_sys::Float64Array {
        let ids: Vec<f64> = self.inner.visible_edges().into_iter().map(edge_id_js).collect();
        arr_f64(&ids)
    }

    // JSON
    pub fn to_json(&mut self) -> JsValue {
        to_js(&self.inner.to_json_value()).unwrap_or(JsValue::NULL)
    }
    pub fn from_json(&mut self, v: JsValue) -> bool {
        let limits = self.inner.limits;
        let loaded = serde_wasm_bindgen::from_value::<serde_json::Value>(v)
            .map_err(|e| e.to_string())
            .and_then(|val| sseq::Sseq::from_json_value_with_limits(val, &limits).map_err(|e| e.to_string()));
        match loaded {
            Ok(inner) => {
                self.inner = inner;
                true
            }
            Err(msg) => {
                web_sys::console::warn_1(&JsValue::from_str(&format!("sseq: load failed: {msg}")));
                false
            }
        }
    }
    pub fn from_json_res(&mut self, v: JsValue) -> JsValue {
        match serde_wasm_bindgen::from_value::<serde_json::Value>(v) {
            Ok(val) => match sseq::Sseq::from_json_value_with_limits(val, &self.inner.limits) {
                Ok(inner) => {
                    self.inner = inner;
                    error::ok(JsValue::from_bool(true))
                }
                Err(e) => error::from_sseq(&e),
            },
            Err(e) => error::err("json_parse", format!("{}", e), None),
        }
    }
    /// Cap on classes accepted by later `from_json` calls.
    pub fn set_max_classes(&mut self, max: u32) {
        self.inner.limits.max_classes = max as usize;
    }
    pub fn to_json_string(&mut self) -> Result<String, JsValue> {
        self.inner.to_json_string().map_err(|e| error::from_sseq(&e))
    }
}

impl Default for Sseq {
    fn default() -> Self {
        Self::new()
    }
}
