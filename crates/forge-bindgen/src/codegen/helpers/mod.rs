//! C++ support headers included by the native translation units
//!
//! Each native target writes its headers next to its `*_init.cpp`, so the
//! output directory compiles without anything from this crate.

pub const COMMON_HEADER: &str = "bindgen_helpers.h";
pub const NODE_HEADER: &str = "bindgen_node_helpers.h";
pub const WASM_HEADER: &str = "bindgen_wasm_helpers.h";

const COMMON: &str = include_str!("bindgen_helpers.h");
const NODE: &str = include_str!("bindgen_node_helpers.h");
const WASM: &str = include_str!("bindgen_wasm_helpers.h");

/// Headers needed by `node_init.cpp`, as `(file name, text)` pairs
pub fn node_headers() -> [(&'static str, String); 2] {
    [
        (COMMON_HEADER, COMMON.to_string()),
        (NODE_HEADER, NODE.to_string()),
    ]
}

/// Headers needed by `wasm_init.cpp`, as `(file name, text)` pairs
pub fn wasm_headers() -> [(&'static str, String); 2] {
    [
        (COMMON_HEADER, COMMON.to_string()),
        (WASM_HEADER, WASM.to_string()),
    ]
}
