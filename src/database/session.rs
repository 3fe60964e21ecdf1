//! Session: the adapters plus the active transaction

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::index::{IndexCatalog, IndexDefinition, IndexError};
use crate::schema::{ClassDef, PropertyDef, RecordValidator, SchemaCatalog, SchemaError};
use crate::storage::{Record, RecordId, RecordStore, ScanDirection};
use crate::value::{Properties, Value};

use super::errors::{DatabaseError, DatabaseResult};
use super::metadata::MetadataStore;
use super::transaction::Transaction;

/// Everything a statement needs to run: the record, schema and index
/// adapters, database metadata and the transaction handle.
///
/// Cheap to clone; clones share adapters and transaction.
#[derive(Clone)]
pub struct DatabaseSession {
    name: Arc<str>,
    storage: Arc<dyn RecordStore>,
    schema: Arc<dyn SchemaCatalog>,
    indexes: Arc<dyn IndexCatalog>,
    metadata: Arc<MetadataStore>,
    tx: Transaction,
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession")
            .field("name", &self.name)
            .field("tx", &self.tx.id())
            .finish()
    }
}

impl DatabaseSession {
    /// Builds a session over arbitrary adapters, with an active transaction
    pub fn new(
        name: &str,
        storage: Arc<dyn RecordStore>,
        schema: Arc<dyn SchemaCatalog>,
        indexes: Arc<dyn IndexCatalog>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            storage,
            schema,
            indexes,
            metadata,
            tx: Transaction::begin(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &dyn RecordStore {
        self.storage.as_ref()
    }

    pub fn schema(&self) -> &dyn SchemaCatalog {
        self.schema.as_ref()
    }

    pub fn indexes(&self) -> &dyn IndexCatalog {
        self.indexes.as_ref()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Replaces the current transaction with a fresh active one
    pub fn begin(&mut self) {
        self.tx = Transaction::begin();
    }

    /// Starts a transaction that expires after `timeout`
    pub fn begin_with_timeout(&mut self, timeout: Duration) {
        self.tx = Transaction::begin_with_timeout(timeout);
    }

    /// Ends the current transaction and starts a new one.
    ///
    /// Handles obtained under the old transaction (updatable results)
    /// become read-only.
    pub fn commit(&mut self) {
        self.tx.close();
        self.tx = Transaction::begin();
    }

    /// Ends the current transaction without starting another
    pub fn close(&self) {
        self.tx.close();
    }

    pub fn ensure_active(&self) -> DatabaseResult<()> {
        if self.tx.is_active() {
            Ok(())
        } else {
            Err(DatabaseError::TransactionInactive)
        }
    }

    /// Indexes covering a class: those declared on it first, then those
    /// inherited from superclasses, each group ordered by name.
    pub fn indexes_on(&self, class: &str) -> DatabaseResult<Vec<IndexDefinition>> {
        let mut own = Vec::new();
        let mut inherited = Vec::new();
        for def in self.indexes.indexes()? {
            if def.class_name.eq_ignore_ascii_case(class) {
                own.push(def);
            } else if self.schema.is_subclass_of(class, &def.class_name)? {
                inherited.push(def);
            }
        }
        own.sort_by(|a, b| a.name.cmp(&b.name));
        inherited.sort_by(|a, b| a.name.cmp(&b.name));
        own.extend(inherited);
        Ok(own)
    }

    pub fn fetch_record(&self, rid: RecordId) -> DatabaseResult<Option<Record>> {
        Ok(self.storage.fetch_by_rid(rid)?)
    }

    // --- Record writes ---

    fn index_keys(
        &self,
        class: &str,
        properties: &Properties,
    ) -> DatabaseResult<Vec<(IndexDefinition, Vec<Vec<Value>>)>> {
        self.indexes_on(class)?
            .into_iter()
            .map(|def| {
                let keys = def.keys_for(properties)?;
                Ok((def, keys))
            })
            .collect()
    }

    fn check_unique(
        &self,
        keys: &[(IndexDefinition, Vec<Vec<Value>>)],
        owner: Option<RecordId>,
    ) -> DatabaseResult<()> {
        for (def, def_keys) in keys.iter().filter(|(d, _)| d.index_type.is_unique()) {
            for key in def_keys.iter().filter(|k| !k.iter().any(Value::is_null)) {
                if let Some(existing) = self.indexes.holder_of(&def.name, key)? {
                    if Some(existing) != owner {
                        return Err(IndexError::DuplicateKey {
                            index: def.name.clone(),
                            key: Value::List(key.clone()).to_string(),
                            existing,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Validates and stores a new record, maintaining every covering index
    pub fn create_record(
        &self,
        class: &str,
        cluster: Option<u32>,
        properties: Properties,
    ) -> DatabaseResult<Record> {
        self.ensure_active()?;
        let def = self.schema.require_class(class)?;
        if def.is_abstract {
            return Err(DatabaseError::AbstractClass(def.name));
        }
        let cluster = match cluster {
            Some(id) if def.cluster_ids.contains(&id) => id,
            Some(id) => {
                return Err(DatabaseError::ClusterMismatch {
                    cluster: id,
                    class: def.name,
                })
            }
            None => *def
                .cluster_ids
                .first()
                .ok_or_else(|| DatabaseError::AbstractClass(def.name.clone()))?,
        };

        let declared = self.schema.get_properties(&def.name)?;
        let properties = RecordValidator::new(&def.name, &declared).validate(&properties)?;
        let keys = self.index_keys(&def.name, &properties)?;
        self.check_unique(&keys, None)?;

        let record = self.storage.insert(cluster, &def.name, properties)?;
        for (index, index_keys) in keys {
            for key in index_keys {
                self.indexes.put(&index.name, key, record.rid)?;
            }
        }
        debug!(rid = %record.rid, class = %def.name, "record created");
        Ok(record)
    }

    /// Replaces a record's properties, maintaining every covering index
    pub fn update_record(&self, rid: RecordId, properties: Properties) -> DatabaseResult<Record> {
        self.ensure_active()?;
        let old = self
            .storage
            .fetch_by_rid(rid)?
            .ok_or(DatabaseError::RecordNotFound(rid))?;
        let declared = self.schema.get_properties(&old.class_name)?;
        let properties = RecordValidator::new(&old.class_name, &declared).validate(&properties)?;

        let old_keys = self.index_keys(&old.class_name, &old.properties)?;
        let new_keys = self.index_keys(&old.class_name, &properties)?;
        self.check_unique(&new_keys, Some(rid))?;

        let record = self.storage.update(rid, properties)?;
        for (index, keys) in old_keys {
            for key in keys {
                self.indexes.remove(&index.name, &key, rid)?;
            }
        }
        for (index, keys) in new_keys {
            for key in keys {
                self.indexes.put(&index.name, key, rid)?;
            }
        }
        Ok(record)
    }

    /// Deletes a record and its index entries; false when it did not exist
    pub fn delete_record(&self, rid: RecordId) -> DatabaseResult<bool> {
        self.ensure_active()?;
        let old = match self.storage.fetch_by_rid(rid)? {
            Some(record) => record,
            None => return Ok(false),
        };
        for (index, keys) in self.index_keys(&old.class_name, &old.properties)? {
            for key in keys {
                self.indexes.remove(&index.name, &key, rid)?;
            }
        }
        Ok(self.storage.delete(rid)?)
    }

    // --- Schema changes ---

    /// Creates a class with its default cluster (abstract classes get none)
    pub fn create_class(
        &self,
        name: &str,
        superclasses: Vec<String>,
        is_abstract: bool,
    ) -> DatabaseResult<ClassDef> {
        if self.schema.get_class(name)?.is_some() {
            return Err(SchemaError::ClassExists(name.to_string()).into());
        }
        for sup in &superclasses {
            self.schema.require_class(sup)?;
        }
        let mut def = ClassDef::new(name);
        def.superclasses = superclasses;
        def.is_abstract = is_abstract;
        if !is_abstract {
            def.cluster_ids
                .push(self.storage.create_cluster(&name.to_ascii_lowercase(), None)?);
        }
        if let Err(err) = self.schema.create_class(def.clone()) {
            for id in &def.cluster_ids {
                self.storage.drop_cluster(*id)?;
            }
            return Err(err.into());
        }
        Ok(def)
    }

    /// Drops a class with its clusters and the indexes declared on it
    pub fn drop_class(&self, name: &str) -> DatabaseResult<()> {
        let def = self.schema.require_class(name)?;
        let subclasses = self.schema.subclasses(&def.name)?;
        if !subclasses.is_empty() {
            return Err(SchemaError::HasSubclasses {
                class: def.name,
                subclasses: subclasses
                    .into_iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into());
        }
        for index in self.indexes.indexes_on_class(&def.name)? {
            self.indexes.drop_index(&index.name)?;
        }
        self.schema.drop_class(&def.name)?;
        for id in def.cluster_ids {
            self.storage.drop_cluster(id)?;
        }
        Ok(())
    }

    pub fn create_property(&self, class: &str, property: PropertyDef) -> DatabaseResult<()> {
        Ok(self.schema.create_property(class, property)?)
    }

    pub fn drop_property(&self, class: &str, property: &str) -> DatabaseResult<()> {
        Ok(self.schema.drop_property(class, property)?)
    }

    /// Indexes of a class whose key includes `property`
    pub fn dependent_indexes(&self, class: &str, property: &str) -> DatabaseResult<Vec<IndexDefinition>> {
        Ok(self
            .indexes
            .indexes_on_class(class)?
            .into_iter()
            .filter(|d| d.field_position(property).is_some())
            .collect())
    }

    pub fn create_cluster(&self, name: &str, id: Option<u32>) -> DatabaseResult<u32> {
        Ok(self.storage.create_cluster(name, id)?)
    }

    pub fn drop_cluster(&self, id: u32) -> DatabaseResult<()> {
        Ok(self.storage.drop_cluster(id)?)
    }

    // --- Index changes ---

    /// Creates an index and fills it from the class's records.
    ///
    /// Returns the number of entries. If filling fails (duplicate key in a
    /// unique index, key conversion) the index is removed again.
    pub fn create_index(&self, definition: IndexDefinition) -> DatabaseResult<u64> {
        let name = definition.name.clone();
        self.indexes.create_index(definition)?;
        match self.fill_index(&name) {
            Ok(count) => Ok(count),
            Err(err) => {
                self.indexes.drop_index(&name)?;
                Err(err)
            }
        }
    }

    pub fn drop_index(&self, name: &str) -> DatabaseResult<()> {
        Ok(self.indexes.drop_index(name)?)
    }

    /// Clears and refills an index from storage
    pub fn rebuild_index(&self, name: &str) -> DatabaseResult<u64> {
        self.indexes.clear(name)?;
        self.fill_index(name)
    }

    fn fill_index(&self, name: &str) -> DatabaseResult<u64> {
        let def = self
            .indexes
            .get_index(name)?
            .ok_or_else(|| IndexError::NotFound(name.to_string()))?;
        let mut count = 0u64;
        for cluster in self.schema.polymorphic_cluster_ids(&def.class_name)? {
            for record in self.storage.scan_cluster(cluster, ScanDirection::Ascending)? {
                let record = record?;
                for key in def.keys_for(&record.properties)? {
                    self.indexes.put(&def.name, key, record.rid)?;
                    count += 1;
                }
            }
        }
        debug!(index = %def.name, entries = count, "index filled");
        Ok(count)
    }
}
