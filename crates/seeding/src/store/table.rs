//! Typed access to a single table.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Filter, Order, Record, Store, StoreError};

/// A row type stored in a named table.
///
/// Fields left out of the serialized form (e.g. `Option` keys with
/// `skip_serializing_if`) are filled in by the store's defaults.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: &'static str;
    const KEY: &'static str = "id";
}

/// Typed view of one table in a [`Store`].
pub struct Table<'s, E> {
    store: &'s dyn Store,
    _entity: PhantomData<fn() -> E>,
}

impl<'s, E: Entity> Table<'s, E> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Point lookup by primary key.
    pub async fn find(&self, key: impl Into<Value>) -> Result<Option<E>, StoreError> {
        let key = key.into();
        self.store
            .find_by_key(E::TABLE, E::KEY, &key)
            .await?
            .map(decode::<E>)
            .transpose()
    }

    pub async fn find_first(
        &self,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Option<E>, StoreError> {
        self.store
            .find_first(E::TABLE, filter, order)
            .await?
            .map(decode::<E>)
            .transpose()
    }

    pub async fn create(&self, entity: &E) -> Result<E, StoreError> {
        let record = encode(entity)?;
        decode(self.store.create(E::TABLE, record).await?)
    }

    pub async fn create_many(&self, entities: &[E], skip_duplicates: bool) -> Result<u64, StoreError> {
        let records = entities.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        self.store
            .create_many(E::TABLE, records, skip_duplicates)
            .await
    }

    /// Returns the row with the entity's key if present, otherwise creates it.
    ///
    /// Existing rows are returned untouched. Entities without a key are always
    /// created.
    pub async fn ensure(&self, entity: &E) -> Result<E, StoreError> {
        let record = encode(entity)?;
        if let Some(key) = record.get(E::KEY).filter(|k| !k.is_null())
            && let Some(existing) = self.store.find_by_key(E::TABLE, E::KEY, key).await?
        {
            return decode(existing);
        }
        decode(self.store.create(E::TABLE, record).await?)
    }

    /// Creates the row, or overwrites every non-key column if the key exists.
    pub async fn upsert(&self, entity: &E) -> Result<E, StoreError> {
        let mut record = encode(entity)?;
        let key = match record.get(E::KEY) {
            Some(key) if !key.is_null() => key.clone(),
            _ => return decode(self.store.create(E::TABLE, record).await?),
        };

        if self
            .store
            .find_by_key(E::TABLE, E::KEY, &key)
            .await?
            .is_none()
        {
            return decode(self.store.create(E::TABLE, record).await?);
        }

        record.remove(E::KEY);
        self.store.update(E::TABLE, E::KEY, &key, record).await?;
        self.store
            .find_by_key(E::TABLE, E::KEY, &key)
            .await?
            .map(decode::<E>)
            .transpose()?
            .ok_or_else(|| StoreError::Missing {
                table: E::TABLE.to_string(),
                key: key.to_string(),
            })
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.delete_many(E::TABLE, filter).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.count(E::TABLE, filter).await
    }
}

fn encode<E: Entity>(entity: &E) -> Result<Record, StoreError> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        _ => Err(StoreError::NotARecord(E::TABLE)),
    }
}

fn decode<E: Entity>(record: Record) -> Result<E, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}
