//! Keyed entity store contract.
//!
//! The ledger and snapshot engine depend on nothing but `get`/`put` over
//! `(EntityKind, id)`, so the backing storage is swappable. The typed layer
//! on top (`EntityStoreExt`) gives handlers load-or-create access without
//! every call site re-matching `Record` variants.

mod memory;

use thiserror::Error;

use crate::entities::{
    Account, Deposit, Pool, PoolHourlySnapshot, Position, PositionSnapshot, Protocol,
    ProtocolHourlySnapshot, Swap, Token, Transfer, Withdrawal,
};

pub use memory::MemoryStore;

/// Closed set of entity kinds the store is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Protocol,
    Token,
    Pool,
    Position,
    PositionSnapshot,
    PoolHourlySnapshot,
    ProtocolHourlySnapshot,
    Account,
    Deposit,
    Withdrawal,
    Swap,
    Transfer,
}

/// A stored entity, tagged by kind.
#[derive(Debug, Clone)]
pub enum Record {
    Protocol(Protocol),
    Token(Token),
    Pool(Pool),
    Position(Position),
    PositionSnapshot(PositionSnapshot),
    PoolHourlySnapshot(PoolHourlySnapshot),
    ProtocolHourlySnapshot(ProtocolHourlySnapshot),
    Account(Account),
    Deposit(Deposit),
    Withdrawal(Withdrawal),
    Swap(Swap),
    Transfer(Transfer),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Protocol(_) => EntityKind::Protocol,
            Record::Token(_) => EntityKind::Token,
            Record::Pool(_) => EntityKind::Pool,
            Record::Position(_) => EntityKind::Position,
            Record::PositionSnapshot(_) => EntityKind::PositionSnapshot,
            Record::PoolHourlySnapshot(_) => EntityKind::PoolHourlySnapshot,
            Record::ProtocolHourlySnapshot(_) => EntityKind::ProtocolHourlySnapshot,
            Record::Account(_) => EntityKind::Account,
            Record::Deposit(_) => EntityKind::Deposit,
            Record::Withdrawal(_) => EntityKind::Withdrawal,
            Record::Swap(_) => EntityKind::Swap,
            Record::Transfer(_) => EntityKind::Transfer,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage failed; distinct from "not found", which is the
    /// `Ok(None)` case.
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("record under ({expected:?}, {id}) holds a different kind")]
    KindMismatch { expected: EntityKind, id: String },
}

/// A concrete entity type that knows its kind and key.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;
}

/// The persistence contract: a keyed get/put surface, nothing more.
///
/// Object-safe on purpose so the ledger can hold `&mut dyn EntityStore`.
pub trait EntityStore {
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, StoreError>;
    fn put(&mut self, kind: EntityKind, id: &str, record: Record) -> Result<(), StoreError>;
}

/// Typed access over any [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    fn get_entity<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        match self.get(E::KIND, id)? {
            None => Ok(None),
            Some(record) => match E::from_record(record) {
                Some(entity) => Ok(Some(entity)),
                None => Err(StoreError::KindMismatch {
                    expected: E::KIND,
                    id: id.to_string(),
                }),
            },
        }
    }

    fn put_entity<E: Entity>(&mut self, entity: E) -> Result<(), StoreError> {
        let id = entity.id().to_string();
        self.put(E::KIND, &id, entity.into_record())
    }

    /// Load-or-create as an explicit contract: the factory runs only when
    /// the id is absent, and the created entity is stored before return.
    fn get_or_insert<E, F>(&mut self, id: &str, factory: F) -> Result<E, StoreError>
    where
        E: Entity + Clone,
        F: FnOnce() -> E,
    {
        if let Some(existing) = self.get_entity::<E>(id)? {
            return Ok(existing);
        }
        let created = factory();
        self.put_entity(created.clone())?;
        Ok(created)
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

macro_rules! impl_entity {
    ($ty:ty, $kind:ident, $id:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> &str {
                &self.$id
            }

            fn into_record(self) -> Record {
                Record::$kind(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$kind(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

impl_entity!(Protocol, Protocol, id);
impl_entity!(Token, Token, address);
impl_entity!(Pool, Pool, id);
impl_entity!(Position, Position, id);
impl_entity!(PositionSnapshot, PositionSnapshot, id);
impl_entity!(PoolHourlySnapshot, PoolHourlySnapshot, id);
impl_entity!(ProtocolHourlySnapshot, ProtocolHourlySnapshot, id);
impl_entity!(Account, Account, address);
impl_entity!(Deposit, Deposit, id);
impl_entity!(Withdrawal, Withdrawal, id);
impl_entity!(Swap, Swap, id);
impl_entity!(Transfer, Transfer, id);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip_through_record() {
        let mut store = MemoryStore::new();
        let account = Account::new("0xAbC0000000000000000000000000000000000001");
        store.put_entity(account.clone()).unwrap();

        let loaded: Account = store
            .get_entity(&account.address)
            .unwrap()
            .expect("account stored");
        assert_eq!(loaded.address, "0xabc0000000000000000000000000000000000001");
        assert!(loaded.referral.is_none());
    }

    #[test]
    fn get_or_insert_runs_factory_once() {
        let mut store = MemoryStore::new();
        let mut runs = 0;

        for _ in 0..2 {
            let _: Account = store
                .get_or_insert("0x1111111111111111111111111111111111111111", || {
                    runs += 1;
                    Account::new("0x1111111111111111111111111111111111111111")
                })
                .unwrap();
        }

        assert_eq!(runs, 1);
    }

    #[test]
    fn absent_id_is_none_not_error() {
        let store = MemoryStore::new();
        let missing: Option<Account> = store.get_entity("0xdead").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn mismatched_kind_is_an_error() {
        let mut store = MemoryStore::new();
        // Force a wrong-kind record under the Account keyspace.
        store
            .put(
                EntityKind::Account,
                "0x01",
                Record::Protocol(Protocol::new()),
            )
            .unwrap();

        let result: Result<Option<Account>, StoreError> = store.get_entity("0x01");
        assert!(matches!(result, Err(StoreError::KindMismatch { .. })));
    }
}
