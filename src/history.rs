//! Per-account transaction history, persisted in a key-value store.
//!
//! All records of one account live in a single JSON array under
//! `wallet_transaction_history_<address>`; the active chain is filtered at
//! read time. Within a chain at most one record exists per transaction hash,
//! and when two observations of the same hash meet, the later timestamp
//! wins. Each chain keeps at most `cap` records, newest first.
//!
//! Nothing here fails hard: unreadable blobs are discarded with a warning and
//! storage write errors are logged while the in-memory view stays current.

use crate::chains;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const STORAGE_KEY_PREFIX: &str = "wallet_transaction_history";
pub const DEFAULT_RETENTION_CAP: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    EthTransfer,
    TokenTransfer,
    ContractInteraction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl FromStr for TxStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" | "success" => Ok(TxStatus::Confirmed),
            "failed" | "reverted" => Ok(TxStatus::Failed),
            _ => Err(anyhow::anyhow!(
                "Invalid status '{s}'. Valid options: pending, confirmed, failed"
            )),
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Confirmed => write!(f, "confirmed"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub status: TxStatus,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub chain_id: u64,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    /// Any other fields of the observed event, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryRecord {
    pub fn new(hash: impl Into<String>, kind: TxKind, from: impl Into<String>, timestamp: i64) -> Self {
        Self {
            hash: hash.into(),
            kind,
            status: TxStatus::Pending,
            timestamp,
            chain_id: 0,
            from: from.into(),
            to: None,
            value: None,
            token_symbol: None,
            description: None,
            explorer_url: None,
            extra: Map::new(),
        }
    }

    pub fn with_status(mut self, status: TxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_token_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.token_symbol = Some(symbol.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    fn dedup_key(&self) -> (u64, String) {
        (self.chain_id, self.hash.to_ascii_lowercase())
    }

    fn same_tx(&self, hash: &str) -> bool {
        self.hash.eq_ignore_ascii_case(hash)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("stored history is not a JSON array: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Counts before and after a duplicate cleanup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupReport {
    pub before: usize,
    pub after: usize,
}

pub fn storage_key(account: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}_{}", account.to_lowercase())
}

/// Keep one record per (chain, hash), the one with the greater timestamp.
///
/// First-seen order is preserved; a later, newer duplicate takes over the
/// slot of the first.
pub fn dedup_latest(records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let mut slots: HashMap<(u64, String), usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<HistoryRecord> = Vec::with_capacity(records.len());
    for r in records {
        match slots.get(&r.dedup_key()) {
            Some(&i) => {
                if r.timestamp > out[i].timestamp {
                    out[i] = r;
                }
            }
            None => {
                slots.insert(r.dedup_key(), out.len());
                out.push(r);
            }
        }
    }
    out
}

pub fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Parsed contents of an account's blob.
///
/// Entries that do not parse as records are kept verbatim and written back
/// unchanged.
#[derive(Debug, Default)]
struct StoredBlob {
    records: Vec<HistoryRecord>,
    unreadable: Vec<Value>,
}

/// History store over any [`KeyValueStore`].
///
/// Keeps an in-memory view per (account, chain) partition that mirrors what
/// was last loaded or written.
pub struct HistoryStore<S> {
    storage: S,
    cap: usize,
    views: HashMap<(String, u64), Vec<HistoryRecord>>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(storage: S, cap: usize) -> Self {
        Self {
            storage,
            cap: cap.max(1),
            views: HashMap::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Current in-memory view of a partition (empty if never loaded).
    pub fn records(&self, account: &str, chain_id: u64) -> &[HistoryRecord] {
        self.views
            .get(&partition(account, chain_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Read the persisted records. `Ok(None)` when nothing is stored.
    ///
    /// Entries that do not parse as records are left out.
    pub fn read_all(&self, account: &str) -> Result<Option<Vec<HistoryRecord>>, StorageError> {
        Ok(self.read_blob(account)?.map(|blob| blob.records))
    }

    fn read_blob(&self, account: &str) -> Result<Option<StoredBlob>, StorageError> {
        let Some(raw) = self.storage.get(&storage_key(account))? else {
            return Ok(None);
        };
        let items: Vec<Value> = serde_json::from_str(&raw)?;
        let mut blob = StoredBlob::default();
        for item in items {
            match serde_json::from_value::<HistoryRecord>(item.clone()) {
                Ok(record) => blob.records.push(record),
                Err(_) => blob.unreadable.push(item),
            }
        }
        if !blob.unreadable.is_empty() {
            log::warn!(
                "[history] keeping {} unreadable record(s) for {} as-is",
                blob.unreadable.len(),
                account.to_lowercase()
            );
        }
        Ok(Some(blob))
    }

    fn write_all(&self, account: &str, records: &[HistoryRecord], unreadable: &[Value]) {
        let encode = || -> anyhow::Result<String> {
            let mut items = records
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<Value>, _>>()?;
            items.extend(unreadable.iter().cloned());
            Ok(serde_json::to_string(&items)?)
        };
        let result = encode().and_then(|json| self.storage.set(&storage_key(account), &json));
        if let Err(e) = result {
            log::error!("[history] failed to persist history for {account}: {e}");
        }
    }

    /// Write a partition's view merged with the other chains' stored records.
    ///
    /// Skipped when the stored blob cannot be read, so that records of other
    /// chains are never overwritten blind.
    fn persist_partition(&self, account: &str, chain_id: u64) {
        let (others, unreadable) = match self.read_blob(account) {
            Ok(Some(blob)) => (
                blob.records
                    .into_iter()
                    .filter(|r| r.chain_id != chain_id)
                    .collect::<Vec<_>>(),
                blob.unreadable,
            ),
            Ok(None) => (Vec::new(), Vec::new()),
            Err(StorageError::Corrupt(e)) => {
                log::warn!("[history] overwriting unreadable history for {account}: {e}");
                (Vec::new(), Vec::new())
            }
            Err(e @ StorageError::Backend(_)) => {
                log::error!("[history] not persisting history for {account}: {e}");
                return;
            }
        };
        let merged: Vec<HistoryRecord> = self
            .records(account, chain_id)
            .iter()
            .cloned()
            .chain(others)
            .collect();
        self.write_all(account, &merged, &unreadable);
    }

    fn ensure_loaded(&mut self, account: &str, chain_id: u64) {
        if !self.views.contains_key(&partition(account, chain_id)) {
            self.load(account, chain_id);
        }
    }

    /// Load a partition, newest first, and rewrite the stored blob without
    /// duplicates.
    ///
    /// A blob that is not JSON is treated as empty. When the backend itself
    /// fails, the partition stays unloaded and the next call reads again.
    pub fn load(&mut self, account: &str, chain_id: u64) -> Vec<HistoryRecord> {
        let blob = match self.read_blob(account) {
            Ok(Some(blob)) => blob,
            Ok(None) => StoredBlob::default(),
            Err(StorageError::Corrupt(e)) => {
                log::warn!("[history] discarding stored history for {account}: {e}");
                self.views.insert(partition(account, chain_id), Vec::new());
                return Vec::new();
            }
            Err(e @ StorageError::Backend(_)) => {
                log::error!("[history] failed to read history for {account}: {e}");
                return self.records(account, chain_id).to_vec();
            }
        };

        let before = blob.records.len();
        let unique = dedup_latest(blob.records);
        let mut filtered: Vec<HistoryRecord> = unique
            .iter()
            .filter(|r| r.chain_id == chain_id)
            .cloned()
            .collect();
        sort_newest_first(&mut filtered);

        if unique.len() < before {
            log::info!(
                "[history] removed {} duplicate record(s) for {}",
                before - unique.len(),
                account.to_lowercase()
            );
            self.write_all(account, &unique, &blob.unreadable);
        }

        log::debug!(
            "[history] loaded {} record(s) for {} on chain {chain_id}",
            filtered.len(),
            account.to_lowercase()
        );
        self.views
            .insert(partition(account, chain_id), filtered.clone());
        filtered
    }

    /// Insert a record into the partition. Returns `true` only for a hash not
    /// seen before.
    ///
    /// A repeat observation replaces the stored record when its timestamp is
    /// greater, and is otherwise ignored; either way it reports `false`.
    pub fn append(&mut self, account: &str, chain_id: u64, mut record: HistoryRecord) -> bool {
        record.chain_id = chain_id;
        if record.explorer_url.is_none() {
            record.explorer_url = chains::explorer_tx_url(chain_id, &record.hash);
        }

        self.ensure_loaded(account, chain_id);
        let cap = self.cap;
        let Some(view) = self.views.get_mut(&partition(account, chain_id)) else {
            log::warn!("[history] history unavailable, {} not recorded", record.hash);
            return false;
        };

        if let Some(existing) = view.iter_mut().find(|r| r.same_tx(&record.hash)) {
            if record.timestamp <= existing.timestamp {
                log::debug!("[history] {} already recorded, skipping", record.hash);
                return false;
            }
            log::debug!("[history] newer observation of {} replaces stored record", record.hash);
            *existing = record;
            sort_newest_first(view);
            self.persist_partition(account, chain_id);
            return false;
        }

        view.insert(0, record);
        let mut unique = dedup_latest(std::mem::take(view));
        sort_newest_first(&mut unique);
        if unique.len() > cap {
            log::debug!(
                "[history] evicting {} oldest record(s) on chain {chain_id}",
                unique.len() - cap
            );
            unique.truncate(cap);
        }
        *view = unique;

        self.persist_partition(account, chain_id);
        true
    }

    /// Change the status of a recorded transaction. Returns `false` when the
    /// hash is not in the partition (evicted, or recorded on another chain).
    pub fn update_status(&mut self, account: &str, chain_id: u64, hash: &str, status: TxStatus) -> bool {
        self.ensure_loaded(account, chain_id);
        let Some(view) = self.views.get_mut(&partition(account, chain_id)) else {
            log::warn!("[history] history unavailable, status of {hash} not updated");
            return false;
        };
        let Some(record) = view.iter_mut().find(|r| r.same_tx(hash)) else {
            log::warn!("[history] transaction not found for status update: {hash}");
            return false;
        };

        if record.status == status {
            return true;
        }
        record.status = status;
        self.persist_partition(account, chain_id);
        true
    }

    /// Drop every record of the account, on all chains.
    pub fn clear(&mut self, account: &str) {
        let owner = account.to_lowercase();
        self.views.retain(|(a, _), _| *a != owner);
        if let Err(e) = self.storage.remove(&storage_key(account)) {
            log::error!("[history] failed to clear history for {owner}: {e}");
        }
    }

    /// Deduplicate the whole stored blob and refresh the partition view.
    ///
    /// `None` when nothing is stored or the blob is unreadable.
    pub fn cleanup_duplicates(&mut self, account: &str, chain_id: u64) -> Option<CleanupReport> {
        let blob = match self.read_blob(account) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("[history] cannot clean up history for {account}: {e}");
                return None;
            }
        };

        let before = blob.records.len();
        let mut unique = dedup_latest(blob.records);
        sort_newest_first(&mut unique);
        self.write_all(account, &unique, &blob.unreadable);

        let filtered: Vec<HistoryRecord> = unique
            .iter()
            .filter(|r| r.chain_id == chain_id)
            .cloned()
            .collect();
        self.views.insert(partition(account, chain_id), filtered);

        let report = CleanupReport {
            before,
            after: unique.len(),
        };
        log::info!(
            "[history] cleaned up duplicates: {} -> {} records",
            report.before,
            report.after
        );
        Some(report)
    }
}

fn partition(account: &str, chain_id: u64) -> (String, u64) {
    (account.to_lowercase(), chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const ALICE: &str = "0xA11ce00000000000000000000000000000000001";

    fn rec(hash: &str, ts: i64) -> HistoryRecord {
        HistoryRecord::new(hash, TxKind::EthTransfer, ALICE, ts)
    }

    #[test]
    fn test_dedup_keeps_latest() {
        let mut a = rec("0xabc", 100);
        a.chain_id = 1;
        let mut b = rec("0xABC", 200);
        b.chain_id = 1;
        let mut other_chain = rec("0xabc", 50);
        other_chain.chain_id = 10;

        let out = dedup_latest(vec![a, other_chain, b]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, 200);
        assert_eq!(out[1].chain_id, 10);
    }

    #[test]
    fn test_record_json_shape() {
        let mut r = rec("0x1", 5)
            .with_status(TxStatus::Confirmed)
            .with_to("0xb0b")
            .with_extra("blockNumber", Value::from(42));
        r.chain_id = 1;
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], "eth_transfer");
        assert_eq!(v["status"], "confirmed");
        assert_eq!(v["chainId"], 1);
        assert_eq!(v["blockNumber"], 42);
        assert!(v.get("tokenSymbol").is_none());

        let back: HistoryRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_append_stamps_chain_and_explorer() {
        let mut store = HistoryStore::new(MemoryStore::new(), 10);
        assert!(store.append(ALICE, chains::SEPOLIA, rec("0x1", 1)));

        let view = store.records(ALICE, chains::SEPOLIA);
        assert_eq!(view[0].chain_id, chains::SEPOLIA);
        assert_eq!(
            view[0].explorer_url.as_deref(),
            Some("https://sepolia.etherscan.io/tx/0x1")
        );
    }

    #[test]
    fn test_account_is_case_insensitive() {
        let mut store = HistoryStore::new(MemoryStore::new(), 10);
        store.append(ALICE, 1, rec("0x1", 1));
        assert_eq!(store.load(&ALICE.to_lowercase(), 1).len(), 1);
        assert_eq!(store.records(&ALICE.to_uppercase(), 1).len(), 1);
    }

    #[test]
    fn test_update_status_same_value_is_noop() {
        let mut store = HistoryStore::new(MemoryStore::new(), 10);
        store.append(ALICE, 1, rec("0x1", 1));
        assert!(store.update_status(ALICE, 1, "0x1", TxStatus::Pending));
        assert!(store.update_status(ALICE, 1, "0X1", TxStatus::Failed));
        assert_eq!(store.records(ALICE, 1)[0].status, TxStatus::Failed);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Confirmed".parse::<TxStatus>().unwrap(), TxStatus::Confirmed);
        assert_eq!("reverted".parse::<TxStatus>().unwrap(), TxStatus::Failed);
        assert!("done".parse::<TxStatus>().is_err());
    }

    #[test]
    fn test_skips_unreadable_entries() {
        let storage = MemoryStore::new();
        let good = serde_json::to_value({
            let mut r = rec("0x1", 1);
            r.chain_id = 1;
            r
        })
        .unwrap();
        let blob = serde_json::to_string(&vec![good, serde_json::json!({"hash": 7})]).unwrap();
        storage.set(&storage_key(ALICE), &blob).unwrap();

        let mut store = HistoryStore::new(&storage, 10);
        assert_eq!(store.load(ALICE, 1).len(), 1);
        assert!(store.append(ALICE, 1, rec("0x2", 2)));

        let stored: Vec<Value> =
            serde_json::from_str(&storage.get(&storage_key(ALICE)).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.contains(&serde_json::json!({"hash": 7})));
    }
}
