use wasm_bindgen::prelude::*;
mod api;
mod error;
mod interop;

#[wasm_bindgen]
pub struct Sseq {
    pub(crate) inner: sseq::Sseq,
}

impl Sseq {
    pub fn rs_new() -> Sseq {
        Sseq { inner: sseq::Sseq::new() }
    }
    pub fn rs_version(&self) -> u64 {
        self.inner.display().version()
    }
    pub fn inner(&self) -> &sseq::Sseq {
        &self.inner
    }
}
