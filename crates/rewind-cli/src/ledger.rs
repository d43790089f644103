//! In-memory ledger the demo commands mutate
//!
//! Balances are keyed by scope name and account. Every mutating command
//! captures the state it overwrites when it runs, so it can be reversed
//! however long it sat in the queue.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rewind_undo_redo::{
    ActionResult, Command, ProgressReporter, Result, Scope, UndoRedoError, UndoableAction,
};
use serde_json::json;

/// Ledger key: scope name, account name
pub type AccountKey = (String, String);

/// Shared account balances
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: Arc<RwLock<BTreeMap<AccountKey, i64>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, scope: &str, account: &str) -> Option<i64> {
        self.balances
            .read()
            .get(&(scope.to_string(), account.to_string()))
            .copied()
    }

    /// All balances in key order
    pub fn snapshot(&self) -> Vec<(AccountKey, i64)> {
        self.balances
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), *value))
            .collect()
    }

    fn put(&self, key: &AccountKey, value: Option<i64>) -> Option<i64> {
        let mut balances = self.balances.write();
        match value {
            Some(value) => balances.insert(key.clone(), value),
            None => balances.remove(key),
        }
    }

    /// Command overwriting an account's balance
    pub fn set(&self, scope_name: &str, scope: Scope, account: &str, value: i64) -> Result<Command> {
        Command::builder(format!("set {} {} = {}", scope_name, account, value))
            .scope(scope)
            .action(SetBalance {
                ledger: self.clone(),
                key: (scope_name.to_string(), account.to_string()),
                value,
                previous: Mutex::new(None),
            })
            .build()
    }

    /// Command adding `delta` to an account, opening it at zero if needed
    pub fn add(&self, scope_name: &str, scope: Scope, account: &str, delta: i64) -> Result<Command> {
        Command::builder(format!("add {} {} {:+}", scope_name, account, delta))
            .scope(scope)
            .action(AddToBalance {
                ledger: self.clone(),
                key: (scope_name.to_string(), account.to_string()),
                delta,
                previous: Mutex::new(None),
            })
            .build()
    }

    /// Query command reading an account's balance
    pub fn get(&self, scope_name: &str, scope: Scope, account: &str) -> Result<Command> {
        let ledger = self.clone();
        let scope_key = scope_name.to_string();
        let account = account.to_string();
        let text = format!("get {} {}", scope_name, account);
        let failing_text = text.clone();

        Command::query(text)
            .scope(scope)
            .forward(move |_| {
                let balance = ledger.balance(&scope_key, &account);
                let missing = format!("no account '{}' in scope '{}'", account, scope_key);
                let text = failing_text.clone();
                async move {
                    balance
                        .map(|value| json!(value))
                        .ok_or_else(|| UndoRedoError::execution_failed(text, missing))
                }
            })
            .build()
    }
}

/// Previous balance, recorded by every forward run
type Snapshot = Mutex<Option<Option<i64>>>;

fn restore(ledger: &Ledger, key: &AccountKey, snapshot: &Snapshot) -> ActionResult {
    let previous = (*snapshot.lock()).ok_or_else(|| {
        UndoRedoError::execution_failed(
            format!("{} {}", key.0, key.1),
            "nothing recorded to restore",
        )
    })?;
    ledger.put(key, previous);
    Ok(json!(previous))
}

struct SetBalance {
    ledger: Ledger,
    key: AccountKey,
    value: i64,
    previous: Snapshot,
}

#[async_trait]
impl UndoableAction for SetBalance {
    async fn execute(&self, _progress: &ProgressReporter) -> ActionResult {
        let previous = self.ledger.put(&self.key, Some(self.value));
        *self.previous.lock() = Some(previous);
        Ok(json!(self.value))
    }

    async fn reverse(&self, _progress: &ProgressReporter) -> ActionResult {
        restore(&self.ledger, &self.key, &self.previous)
    }
}

struct AddToBalance {
    ledger: Ledger,
    key: AccountKey,
    delta: i64,
    previous: Snapshot,
}

#[async_trait]
impl UndoableAction for AddToBalance {
    async fn execute(&self, progress: &ProgressReporter) -> ActionResult {
        progress.started();
        let current = self.ledger.balance(&self.key.0, &self.key.1);
        let updated = current.unwrap_or(0).checked_add(self.delta).ok_or_else(|| {
            UndoRedoError::execution_failed(
                format!("add {} {}", self.key.0, self.key.1),
                "balance overflow",
            )
        })?;

        self.ledger.put(&self.key, Some(updated));
        *self.previous.lock() = Some(current);
        progress.text(format!("{} {} = {}", self.key.0, self.key.1, updated));
        progress.finished();
        Ok(json!(updated))
    }

    async fn reverse(&self, _progress: &ProgressReporter) -> ActionResult {
        restore(&self.ledger, &self.key, &self.previous)
    }
}
