//! In-memory account for tests and the scenario simulator.
//!
//! Calls whose target is a registered token and whose payload decodes as a
//! [`TransferCall`] move tokens out of the account's balance. Every other call
//! just succeeds and is recorded.

use super::traits::SafeAccount;
use crate::clock::SharedClock;
use crate::error::GovernanceResult;
use crate::serialization::{from_cbor, to_cbor};
use crate::types::{Address, Transaction};
use crate::weights::MockTokenLedger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Token transfer out of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCall {
    pub to: Address,
    pub amount: u128,
}

impl TransferCall {
    /// Payload bytes for a transfer transaction.
    pub fn encode(&self) -> GovernanceResult<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    /// Build the transaction calling `token`.
    pub fn into_transaction(self, token: Address) -> GovernanceResult<Transaction> {
        Ok(Transaction::call(token, 0, self.encode()?))
    }
}

/// Which entry point carried out a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Module,
    Direct,
}

pub struct MockSafe {
    address: Address,
    clock: SharedClock,
    tokens: HashMap<Address, MockTokenLedger>,
    executed: Vec<(ExecutionPath, Transaction)>,
    fail_next: usize,
}

impl MockSafe {
    pub fn new(address: Address, clock: SharedClock) -> Self {
        Self {
            address,
            clock,
            tokens: HashMap::new(),
            executed: Vec::new(),
            fail_next: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Let calls to `token` move balance on `ledger`.
    pub fn with_token(mut self, token: Address, ledger: MockTokenLedger) -> Self {
        self.tokens.insert(token, ledger);
        self
    }

    /// Make the next `n` calls report failure.
    pub fn fail_next(&mut self, n: usize) {
        self.fail_next = n;
    }

    pub fn executed(&self) -> &[(ExecutionPath, Transaction)] {
        &self.executed
    }

    fn apply(&mut self, path: ExecutionPath, tx: &Transaction) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            debug!(target_addr = %tx.target, "mock account forced failure");
            return false;
        }
        if let Some(ledger) = self.tokens.get(&tx.target) {
            let Ok(call) = from_cbor::<TransferCall>(&tx.payload) else {
                return false;
            };
            let now = self.clock.now();
            if ledger
                .transfer(self.address, call.to, call.amount, now)
                .is_err()
            {
                return false;
            }
        }
        self.executed.push((path, tx.clone()));
        true
    }
}

impl SafeAccount for MockSafe {
    fn execute_from_module(&mut self, tx: &Transaction) -> bool {
        self.apply(ExecutionPath::Module, tx)
    }

    fn execute(&mut self, tx: &Transaction) -> bool {
        self.apply(ExecutionPath::Direct, tx)
    }
}
