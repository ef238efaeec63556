//! Account storage for the ledger runtime.
//!
//! [`MemoryAccountStore`] is the default backend; data is lost on process
//! restart.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::identity::Pubkey;
use crate::{Error, Result};

/// A stored account: owning program plus opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Program allowed to interpret and mutate `data`.
    pub owner: Pubkey,
    /// Raw account bytes.
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

/// Address-keyed account storage.
///
/// Implementations must make `create` and `update` atomic per address:
/// concurrent callers on one address are serialized, and a failed `update`
/// leaves no trace.
pub trait AccountStore: Send + Sync {
    /// Snapshot of the account at `address`.
    fn get(&self, address: &Pubkey) -> Option<Account>;

    /// Allocate a new account.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if `address` is occupied.
    fn create(&self, address: Pubkey, account: Account) -> Result<()>;

    /// Atomically read-modify-write the account at `address`.
    ///
    /// `f` works on a staged copy; it is written back only if `f` returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if `address` is empty, or whatever `f` returns.
    fn update<T, F>(&self, address: &Pubkey, f: F) -> Result<T>
    where
        F: FnOnce(&mut Account) -> Result<T>;

    /// Number of stored accounts.
    fn len(&self) -> usize;

    /// Whether no accounts are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an account exists at `address`.
    fn exists(&self, address: &Pubkey) -> bool {
        self.get(address).is_some()
    }
}

/// In-memory account store on a sharded concurrent hashmap.
///
/// Each operation holds the shard write lock for its address for its whole
/// duration, which gives per-address serialization. Operations on different
/// addresses proceed independently.
///
/// # Example
///
/// ```rust
/// use votius_core::identity::Pubkey;
/// use votius_core::ledger::{Account, AccountStore, MemoryAccountStore};
///
/// let store = MemoryAccountStore::new();
/// let address = Pubkey::new([1; 32]);
/// store.create(address, Account { owner: Pubkey::new([2; 32]), data: vec![0] })?;
/// store.update(&address, |account| {
///     account.data[0] += 1;
///     Ok(())
/// })?;
/// assert_eq!(store.get(&address).unwrap().data, vec![1]);
/// # Ok::<(), votius_core::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryAccountStore {
    accounts: DashMap<Pubkey, Account, FxBuildHasher>,
}

impl MemoryAccountStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            accounts: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get(&self, address: &Pubkey) -> Option<Account> {
        self.accounts.get(address).map(|a| a.value().clone())
    }

    fn create(&self, address: Pubkey, account: Account) -> Result<()> {
        match self.accounts.entry(address) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(address)),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    fn update<T, F>(&self, address: &Pubkey, f: F) -> Result<T>
    where
        F: FnOnce(&mut Account) -> Result<T>,
    {
        let mut entry = self
            .accounts
            .get_mut(address)
            .ok_or(Error::AccountNotFound(*address))?;
        let mut staged = entry.value().clone();
        let out = f(&mut staged)?;
        *entry.value_mut() = staged;
        Ok(out)
    }

    fn len(&self) -> usize {
        self.accounts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn account(byte: u8) -> Account {
        Account {
            owner: Pubkey::new([9; 32]),
            data: vec![byte],
        }
    }

    #[test]
    fn test_create_get() {
        let store = MemoryAccountStore::new();
        let address = Pubkey::new([1; 32]);

        store.create(address, account(1)).unwrap();

        assert_eq!(store.get(&address), Some(account(1)));
        assert!(store.exists(&address));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = MemoryAccountStore::new();
        assert_eq!(store.get(&Pubkey::new([1; 32])), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_twice_fails_and_keeps_original() {
        let store = MemoryAccountStore::new();
        let address = Pubkey::new([1; 32]);

        store.create(address, account(1)).unwrap();
        let err = store.create(address, account(2)).unwrap_err();

        assert!(matches!(err, Error::AlreadyExists(a) if a == address));
        assert_eq!(store.get(&address), Some(account(1)));
    }

    #[test]
    fn test_update_missing() {
        let store = MemoryAccountStore::new();
        let err = store
            .update(&Pubkey::new([1; 32]), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[test]
    fn test_failed_update_discards_changes() {
        let store = MemoryAccountStore::new();
        let address = Pubkey::new([1; 32]);
        store.create(address, account(1)).unwrap();

        let result: Result<()> = store.update(&address, |a| {
            a.data[0] = 99;
            Err(Error::AlreadyCompleted(address))
        });

        assert!(result.is_err());
        assert_eq!(store.get(&address), Some(account(1)));
    }

    #[test]
    fn test_with_capacity() {
        let store = MemoryAccountStore::with_capacity(100);
        store.create(Pubkey::new([1; 32]), account(1)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        let store = Arc::new(MemoryAccountStore::new());
        let address = Pubkey::new([1; 32]);
        store
            .create(
                address,
                Account {
                    owner: Pubkey::new([9; 32]),
                    data: 0u64.to_le_bytes().to_vec(),
                },
            )
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..100 {
                        store
                            .update(&address, |a| {
                                let mut bytes = [0u8; 8];
                                bytes.copy_from_slice(&a.data);
                                a.data = (u64::from_le_bytes(bytes) + 1).to_le_bytes().to_vec();
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&store.get(&address).unwrap().data);
        assert_eq!(u64::from_le_bytes(bytes), 800);
    }
}
