/// Pipeline configuration, passed in from the extension's JS loader
use log::warn;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

use crate::collection::DEFAULT_CAPACITY;
use crate::locate::Locators;

/// Auto-capture every observed post, or attach a save button per post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub capacity: usize,
    pub mode: CaptureMode,
    pub locators: Locators,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            capacity: DEFAULT_CAPACITY,
            mode: CaptureMode::Auto,
            locators: Locators::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<PipelineConfig>(json).map(PipelineConfig::validated)
    }

    /// `undefined`/`null` select the defaults; an unreadable object is
    /// logged and also falls back to the defaults.
    pub fn from_js(value: JsValue) -> Self {
        if value.is_undefined() || value.is_null() {
            return PipelineConfig::default();
        }
        match serde_wasm_bindgen::from_value::<PipelineConfig>(value) {
            Ok(config) => config.validated(),
            Err(e) => {
                warn!("invalid config, using defaults: {}", e);
                PipelineConfig::default()
            }
        }
    }

    pub fn validated(mut self) -> Self {
        if self.capacity == 0 {
            warn!("capacity must be at least 1");
            self.capacity = 1;
        }
        self
    }
}
