//! Turning decoded contract logs into history records.
//!
//! Two delivery paths feed the store: live subscription pushes and backfill
//! scans over a block range. They can overlap and redeliver the same log;
//! the store's hash dedup makes the order irrelevant.

use crate::chains;
use crate::history::{HistoryRecord, HistoryStore, TxKind, TxStatus};
use crate::storage::KeyValueStore;
use serde_json::Value;

/// Blocks scanned backwards from the head on backfill.
pub const BACKFILL_BLOCK_SPAN: u64 = 10_000;
/// Transfers kept from one backfill scan.
pub const BACKFILL_LIMIT: usize = 50;

/// Decoded ERC-20 `Transfer(from, to, value)` log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferLog {
    pub from: String,
    pub to: String,
    pub value: u128,
    pub transaction_hash: String,
    pub block_number: u64,
    /// Block time, when the source looked it up.
    pub timestamp_ms: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

/// How `account` is involved in a transfer; `None` if it is not.
pub fn direction_for(account: &str, log: &TransferLog) -> Option<Direction> {
    if log.from.eq_ignore_ascii_case(account) {
        Some(Direction::Sent)
    } else if log.to.eq_ignore_ascii_case(account) {
        Some(Direction::Received)
    } else {
        None
    }
}

impl TransferLog {
    pub fn to_record(&self, account: &str, token_symbol: &str, observed_at_ms: i64) -> Option<HistoryRecord> {
        let direction = direction_for(account, self)?;
        Some(
            HistoryRecord::new(
                self.transaction_hash.clone(),
                TxKind::TokenTransfer,
                self.from.clone(),
                self.timestamp_ms.unwrap_or(observed_at_ms),
            )
            .with_status(TxStatus::Confirmed)
            .with_to(self.to.clone())
            .with_value(self.value.to_string())
            .with_token_symbol(token_symbol)
            .with_description(direction.as_str())
            .with_extra("blockNumber", Value::from(self.block_number))
            .with_extra("direction", Value::from(direction.as_str())),
        )
    }
}

/// Record transfers involving `account`; returns how many were new.
pub fn ingest_transfer_logs<S: KeyValueStore>(
    store: &mut HistoryStore<S>,
    account: &str,
    chain_id: u64,
    token_symbol: &str,
    logs: &[TransferLog],
    now_ms: i64,
) -> usize {
    let mut inserted = 0;
    for entry in logs {
        let Some(record) = entry.to_record(account, token_symbol, now_ms) else {
            continue;
        };
        if store.append(account, chain_id, record) {
            inserted += 1;
        }
    }
    if inserted > 0 {
        log::info!("[events] recorded {inserted} new transfer(s) on chain {chain_id}");
    }
    inserted
}

/// Inclusive block range for a backfill scan ending at `head`.
pub fn backfill_range(head: u64) -> (u64, u64) {
    (head.saturating_sub(BACKFILL_BLOCK_SPAN), head)
}

/// Combine the sent and received halves of a backfill scan.
///
/// Newest block first, one entry per transaction hash (a self-transfer shows
/// up in both halves), at most `limit` entries.
pub fn merge_backfill(sent: Vec<TransferLog>, received: Vec<TransferLog>, limit: usize) -> Vec<TransferLog> {
    let mut all: Vec<TransferLog> = sent.into_iter().chain(received).collect();
    all.sort_by(|a, b| b.block_number.cmp(&a.block_number));

    let mut seen = std::collections::HashSet::new();
    all.retain(|t| seen.insert(t.transaction_hash.to_ascii_lowercase()));
    all.truncate(limit);
    all
}

/// Decoded DataLogger `DataUpdated(user, oldValue, newValue)` log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUpdatedLog {
    pub user: String,
    pub old_value: u128,
    pub new_value: u128,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl DataUpdatedLog {
    pub fn to_record(&self, observed_at_ms: i64) -> HistoryRecord {
        HistoryRecord::new(
            self.transaction_hash.clone(),
            TxKind::ContractInteraction,
            self.user.clone(),
            observed_at_ms,
        )
        .with_status(TxStatus::Confirmed)
        .with_description(format!("data: {} -> {}", self.old_value, self.new_value))
        .with_extra("blockNumber", Value::from(self.block_number))
        .with_extra("oldValue", Value::from(self.old_value.to_string()))
        .with_extra("newValue", Value::from(self.new_value.to_string()))
    }
}

/// Record the account's own data updates; returns how many were new.
pub fn ingest_data_updates<S: KeyValueStore>(
    store: &mut HistoryStore<S>,
    account: &str,
    chain_id: u64,
    logs: &[DataUpdatedLog],
    now_ms: i64,
) -> usize {
    if let chains::ContractLookup::Unsupported { .. } =
        chains::contract_address(chains::Contract::DataLogger, chain_id)
    {
        log::debug!("[events] no DataLogger on chain {chain_id}, ignoring updates");
        return 0;
    }
    logs.iter()
        .filter(|l| l.user.eq_ignore_ascii_case(account))
        .map(|l| store.append(account, chain_id, l.to_record(now_ms)))
        .filter(|inserted| *inserted)
        .count()
}

/// Pending record for a transfer the user just submitted.
///
/// The caller flips it with `update_status` once the receipt arrives.
pub fn submitted_transfer(
    chain_id: u64,
    hash: &str,
    from: &str,
    to: &str,
    value: &str,
    token_symbol: Option<&str>,
    now_ms: i64,
) -> HistoryRecord {
    let (kind, symbol) = match token_symbol {
        Some(symbol) => (TxKind::TokenTransfer, symbol.to_string()),
        None => (
            TxKind::EthTransfer,
            chains::chain_info(chain_id)
                .map(|c| c.native_symbol)
                .unwrap_or("ETH")
                .to_string(),
        ),
    };
    HistoryRecord::new(hash, kind, from, now_ms)
        .with_to(to)
        .with_value(value)
        .with_token_symbol(symbol)
}
