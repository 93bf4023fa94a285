// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;
use crate::types::Address;

/// Caller context handed to every workflow call.
///
/// Holds the active account when a wallet is connected. Reads accept any
/// session; writes require an account and fail with `WalletNotConnected`
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    account: Option<Address>,
}

impl Session {
    pub fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
        }
    }

    pub fn disconnected() -> Self {
        Self { account: None }
    }

    pub fn account(&self) -> Option<&Address> {
        self.account.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    /// The active account, or `WalletNotConnected`
    pub fn require_account(&self) -> Result<&Address, LedgerError> {
        self.account.as_ref().ok_or(LedgerError::WalletNotConnected)
    }
}
