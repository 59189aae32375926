/// PostList - Chrome Extension that captures social-media feed posts
/// Built with Rust + WASM + Yew

pub mod bridge;
pub mod collection;
pub mod config;
pub mod content;
pub mod dedup;
pub mod extract;
pub mod inject;
pub mod locate;
pub mod node;
pub mod normalize;
pub mod observer;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod ui;

#[cfg(test)]
mod test_support;

use wasm_bindgen::prelude::*;

use crate::config::PipelineConfig;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start capturing posts on the current page. `config` may be undefined.
#[wasm_bindgen]
pub fn start_content_script(config: JsValue) -> Result<(), JsValue> {
    content::start(PipelineConfig::from_js(config))
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
