//! History store tests - dedup, retention and persistence over an in-memory store

use std::cell::Cell;
use walletdash::history::{storage_key, HistoryRecord, HistoryStore, TxKind, TxStatus};
use walletdash::storage::{KeyValueStore, MemoryStore};

const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
const SEPOLIA: u64 = 11_155_111;
const MAINNET: u64 = 1;

fn rec(hash: &str, ts: i64) -> HistoryRecord {
    HistoryRecord::new(hash, TxKind::EthTransfer, ALICE, ts)
}

/// Memory store whose next `failing_gets` reads return a backend error.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing_gets: Cell<usize>,
}

impl FlakyStore {
    fn fail_next_gets(&self, n: usize) {
        self.failing_gets.set(n);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let left = self.failing_gets.get();
        if left > 0 {
            self.failing_gets.set(left - 1);
            anyhow::bail!("database is locked");
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key)
    }
}

fn stored_json(mem: &MemoryStore) -> Option<String> {
    mem.get(&storage_key(ALICE)).unwrap()
}

#[test]
fn same_hash_keeps_later_timestamp_in_either_order() {
    for order in [[100, 200], [200, 100]] {
        let mem = MemoryStore::new();
        let mut store = HistoryStore::new(&mem, 100);
        assert!(store.append(ALICE, SEPOLIA, rec("0xabc", order[0])));
        assert!(!store.append(ALICE, SEPOLIA, rec("0xabc", order[1])));

        let loaded = HistoryStore::new(&mem, 100).load(ALICE, SEPOLIA);
        assert_eq!(loaded.len(), 1, "order {order:?}");
        assert_eq!(loaded[0].timestamp, 200, "order {order:?}");
    }
}

#[test]
fn cap_evicts_oldest() {
    let mem = MemoryStore::new();
    let mut store = HistoryStore::new(&mem, 2);
    store.append(ALICE, SEPOLIA, rec("0x1", 1));
    store.append(ALICE, SEPOLIA, rec("0x2", 2));
    store.append(ALICE, SEPOLIA, rec("0x3", 3));

    let hashes: Vec<String> = store
        .load(ALICE, SEPOLIA)
        .into_iter()
        .map(|r| r.hash)
        .collect();
    assert_eq!(hashes, vec!["0x3", "0x2"]);
}

#[test]
fn load_never_returns_other_chains() {
    let mem = MemoryStore::new();
    let mut store = HistoryStore::new(&mem, 100);
    store.append(ALICE, SEPOLIA, rec("0xs", 10));
    store.append(ALICE, MAINNET, rec("0xm", 20));

    let sepolia = store.load(ALICE, SEPOLIA);
    assert_eq!(sepolia.len(), 1);
    assert!(sepolia.iter().all(|r| r.chain_id == SEPOLIA));

    // Both chains share the account's blob.
    let blob: Vec<serde_json::Value> = serde_json::from_str(&stored_json(&mem).unwrap()).unwrap();
    assert_eq!(blob.len(), 2);
}

#[test]
fn update_status_on_missing_hash_leaves_storage_unchanged() {
    let mem = MemoryStore::new();
    let mut store = HistoryStore::new(&mem, 100);
    store.append(ALICE, SEPOLIA, rec("0x1", 1));
    let before = stored_json(&mem);

    assert!(!store.update_status(ALICE, SEPOLIA, "0xmissing", TxStatus::Confirmed));
    assert_eq!(stored_json(&mem), before);

    assert!(store.update_status(ALICE, SEPOLIA, "0x1", TxStatus::Failed));
    let reloaded = HistoryStore::new(&mem, 100).load(ALICE, SEPOLIA);
    assert_eq!(reloaded[0].status, TxStatus::Failed);
}

#[test]
fn corrupt_blob_loads_empty_and_is_overwritten() {
    let mem = MemoryStore::new();
    mem.set(&storage_key(ALICE), "{not json").unwrap();

    let mut store = HistoryStore::new(&mem, 100);
    assert!(store.load(ALICE, SEPOLIA).is_empty());

    assert!(store.append(ALICE, SEPOLIA, rec("0x1", 1)));
    let reloaded = HistoryStore::new(&mem, 100).load(ALICE, SEPOLIA);
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn load_rewrites_duplicated_blob() {
    let mem = MemoryStore::new();
    let mut a = rec("0xdup", 5);
    a.chain_id = SEPOLIA;
    let mut b = rec("0xDUP", 9);
    b.chain_id = SEPOLIA;
    mem.set(&storage_key(ALICE), &serde_json::to_string(&vec![a, b]).unwrap())
        .unwrap();

    let loaded = HistoryStore::new(&mem, 100).load(ALICE, SEPOLIA);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].timestamp, 9);

    let blob: Vec<HistoryRecord> = serde_json::from_str(&stored_json(&mem).unwrap()).unwrap();
    assert_eq!(blob.len(), 1);
}

#[test]
fn clear_empties_view_and_storage() {
    let mem = MemoryStore::new();
    let mut store = HistoryStore::new(&mem, 100);
    store.append(ALICE, SEPOLIA, rec("0x1", 1));
    store.append(ALICE, MAINNET, rec("0x2", 2));

    store.clear(ALICE);
    assert!(store.records(ALICE, SEPOLIA).is_empty());
    assert_eq!(stored_json(&mem), None);
    assert!(store.load(ALICE, MAINNET).is_empty());
}

#[test]
fn appends_on_one_chain_preserve_the_other() {
    let mem = MemoryStore::new();
    let mut first = HistoryStore::new(&mem, 100);
    first.append(ALICE, MAINNET, rec("0xm", 1));

    // A second store instance (another tab) writes to a different chain.
    let mut second = HistoryStore::new(&mem, 100);
    second.append(ALICE, SEPOLIA, rec("0xs", 2));
    first.append(ALICE, MAINNET, rec("0xm2", 3));

    let mut fresh = HistoryStore::new(&mem, 100);
    assert_eq!(fresh.load(ALICE, SEPOLIA).len(), 1);
    assert_eq!(fresh.load(ALICE, MAINNET).len(), 2);
}

#[test]
fn cleanup_reports_counts() {
    let mem = MemoryStore::new();
    let mut store = HistoryStore::new(&mem, 100);
    assert_eq!(store.cleanup_duplicates(ALICE, SEPOLIA), None);

    let mut a = rec("0x1", 1);
    a.chain_id = SEPOLIA;
    let mut b = a.clone();
    b.timestamp = 2;
    mem.set(&storage_key(ALICE), &serde_json::to_string(&vec![a, b]).unwrap())
        .unwrap();

    let report = store.cleanup_duplicates(ALICE, SEPOLIA).unwrap();
    assert_eq!((report.before, report.after), (2, 1));
    assert_eq!(store.records(ALICE, SEPOLIA)[0].timestamp, 2);
}

#[test]
fn failed_read_does_not_erase_stored_records() {
    let flaky = FlakyStore::default();
    let mut seed = HistoryStore::new(&flaky, 100);
    for i in 0..5 {
        seed.append(ALICE, MAINNET, rec(&format!("0x{i}"), i));
    }

    let mut store = HistoryStore::new(&flaky, 100);
    flaky.fail_next_gets(1);
    assert!(store.load(ALICE, MAINNET).is_empty());

    assert!(store.append(ALICE, MAINNET, rec("0xnew", 10)));
    assert_eq!(HistoryStore::new(&flaky, 100).load(ALICE, MAINNET).len(), 6);
}

#[test]
fn unreadable_backend_skips_write() {
    let flaky = FlakyStore::default();
    let mut store = HistoryStore::new(&flaky, 100);
    store.append(ALICE, SEPOLIA, rec("0xs", 1));
    let mut other = HistoryStore::new(&flaky, 100);
    other.append(ALICE, MAINNET, rec("0xm", 2));
    let before = stored_json(&flaky.inner);

    flaky.fail_next_gets(1);
    assert!(store.append(ALICE, SEPOLIA, rec("0xs2", 3)));
    assert_eq!(stored_json(&flaky.inner), before);
    assert_eq!(store.records(ALICE, SEPOLIA).len(), 2);
}

#[test]
fn entries_of_unknown_shape_survive_load_and_append() {
    let mem = MemoryStore::new();
    let mut known = rec("0x1", 1);
    known.chain_id = MAINNET;
    let blob = serde_json::json!([
        serde_json::to_value(&known).unwrap(),
        {"hash": "0x2", "type": "swap", "chainId": 10, "timestamp": 2},
    ]);
    mem.set(&storage_key(ALICE), &blob.to_string()).unwrap();

    let mut store = HistoryStore::new(&mem, 100);
    assert_eq!(store.load(ALICE, MAINNET).len(), 1);
    assert!(store.append(ALICE, MAINNET, rec("0x3", 3)));

    let stored: Vec<serde_json::Value> = serde_json::from_str(&stored_json(&mem).unwrap()).unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().any(|v| v["hash"] == "0x2" && v["type"] == "swap"));
}
