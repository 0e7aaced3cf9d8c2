//! Minimal JS -> Rust surface for the dashboard page.
//!
//! History lives in `window.localStorage`; every call builds a fresh store
//! view so that other tabs' writes are picked up.

use crate::history::{HistoryRecord, HistoryStore, TxStatus, DEFAULT_RETENTION_CAP};
use crate::platform::LocalStorage;
use wasm_bindgen::prelude::*;

fn store() -> Result<HistoryStore<LocalStorage>, JsValue> {
    let storage = LocalStorage::from_window().map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(HistoryStore::new(storage, DEFAULT_RETENTION_CAP))
}

/// Install the panic hook and console logger. Call once on page load.
#[wasm_bindgen]
pub fn walletdash_init() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
    log::info!("[wasm] walletdash initialised");
}

/// History for one account on one chain, newest first, as a JSON array.
#[wasm_bindgen]
pub fn history_load_json(account: String, chain_id: u32) -> Result<String, JsValue> {
    let records = store()?.load(&account, chain_id as u64);
    serde_json::to_string(&records).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Add one record given as JSON. Returns `false` if the hash was already known.
#[wasm_bindgen]
pub fn history_append_json(account: String, chain_id: u32, record: String) -> Result<bool, JsValue> {
    let record: HistoryRecord =
        serde_json::from_str(&record).map_err(|e| JsValue::from_str(&format!("invalid record: {e}")))?;
    Ok(store()?.append(&account, chain_id as u64, record))
}

#[wasm_bindgen]
pub fn history_update_status(account: String, chain_id: u32, hash: String, status: String) -> Result<bool, JsValue> {
    let status: TxStatus = status.parse().map_err(|e: anyhow::Error| JsValue::from_str(&e.to_string()))?;
    Ok(store()?.update_status(&account, chain_id as u64, &hash, status))
}

#[wasm_bindgen]
pub fn history_clear(account: String) -> Result<(), JsValue> {
    store()?.clear(&account);
    Ok(())
}
