//! Web storage backend (window.localStorage via web-sys)

use crate::storage::KeyValueStore;
use anyhow::{anyhow, Result};
use wasm_bindgen::JsValue;

pub struct LocalStorage {
    storage: web_sys::Storage,
}

fn js_err(op: &str, e: JsValue) -> anyhow::Error {
    anyhow!("localStorage {op} failed: {e:?}")
}

impl LocalStorage {
    pub fn from_window() -> Result<Self> {
        let win = web_sys::window().ok_or_else(|| anyhow!("no window object"))?;
        let storage = win
            .local_storage()
            .map_err(|e| js_err("access", e))?
            .ok_or_else(|| anyhow!("localStorage unavailable"))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(key).map_err(|e| js_err("get", e))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // Quota errors surface here; the caller logs and keeps its in-memory view
        self.storage.set_item(key, value).map_err(|e| js_err("set", e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(|e| js_err("remove", e))
    }
}
