//! Database-level metadata: sequences, users and security policies

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the [`MetadataStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("sequence '{0}' already exists")]
    SequenceExists(String),

    #[error("sequence '{0}' not found")]
    SequenceNotFound(String),

    #[error("sequence '{0}' overflowed")]
    SequenceOverflow(String),

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("security policy '{0}' already exists")]
    PolicyExists(String),

    #[error("security policy '{0}' not found")]
    PolicyNotFound(String),

    #[error("password hashing failed")]
    PasswordHash,

    #[error("metadata lock poisoned")]
    LockPoisoned,
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Allocation strategy of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SequenceType {
    #[default]
    Ordered,
    Cached,
}

/// Definition of a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDef {
    pub name: String,
    #[serde(default, rename = "type")]
    pub sequence_type: SequenceType,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_increment")]
    pub increment: i64,
    #[serde(default = "default_cache")]
    pub cache: i64,
}

fn default_increment() -> i64 {
    1
}

fn default_cache() -> i64 {
    20
}

impl SequenceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence_type: SequenceType::Ordered,
            start: 0,
            increment: default_increment(),
            cache: default_cache(),
        }
    }
}

#[derive(Debug)]
struct SequenceState {
    def: SequenceDef,
    current: i64,
    /// Last value of the block reserved by a cached sequence
    reserved_until: i64,
}

/// A database user; passwords are stored as Argon2id hashes only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDef {
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// Named set of per-operation predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub name: String,
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Inner {
    sequences: BTreeMap<String, SequenceState>,
    users: BTreeMap<String, UserDef>,
    policies: BTreeMap<String, SecurityPolicy>,
}

/// Store for sequences, users and security policies
#[derive(Debug, Default)]
pub struct MetadataStore {
    inner: RwLock<Inner>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> MetadataResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| MetadataError::LockPoisoned)
    }

    fn write(&self) -> MetadataResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| MetadataError::LockPoisoned)
    }

    // --- Sequences ---

    pub fn create_sequence(&self, def: SequenceDef) -> MetadataResult<()> {
        let mut guard = self.write()?;
        if guard.sequences.contains_key(&key(&def.name)) {
            return Err(MetadataError::SequenceExists(def.name));
        }
        let start = def.start;
        guard.sequences.insert(
            key(&def.name),
            SequenceState {
                def,
                current: start,
                reserved_until: start,
            },
        );
        Ok(())
    }

    pub fn drop_sequence(&self, name: &str) -> MetadataResult<()> {
        self.write()?
            .sequences
            .remove(&key(name))
            .map(|_| ())
            .ok_or_else(|| MetadataError::SequenceNotFound(name.to_string()))
    }

    pub fn sequence(&self, name: &str) -> MetadataResult<Option<SequenceDef>> {
        Ok(self.read()?.sequences.get(&key(name)).map(|s| s.def.clone()))
    }

    pub fn sequences(&self) -> MetadataResult<Vec<SequenceDef>> {
        Ok(self.read()?.sequences.values().map(|s| s.def.clone()).collect())
    }

    /// Advances a sequence by its increment and returns the new value.
    ///
    /// Cached sequences reserve `cache` values at a time; the values handed
    /// out are the same as for an ordered sequence.
    pub fn next_value(&self, name: &str) -> MetadataResult<i64> {
        let mut guard = self.write()?;
        let state = guard
            .sequences
            .get_mut(&key(name))
            .ok_or_else(|| MetadataError::SequenceNotFound(name.to_string()))?;
        let next = state
            .current
            .checked_add(state.def.increment)
            .ok_or_else(|| MetadataError::SequenceOverflow(name.to_string()))?;
        if state.def.sequence_type == SequenceType::Cached && next > state.reserved_until {
            let block = state.def.increment.saturating_mul(state.def.cache.max(1));
            state.reserved_until = state.current.saturating_add(block);
        }
        state.current = next;
        Ok(next)
    }

    pub fn current_value(&self, name: &str) -> MetadataResult<i64> {
        self.read()?
            .sequences
            .get(&key(name))
            .map(|s| s.current)
            .ok_or_else(|| MetadataError::SequenceNotFound(name.to_string()))
    }

    // --- Users ---

    /// Creates a user, hashing the password with Argon2id
    pub fn create_user(&self, name: &str, password: &str, roles: Vec<String>) -> MetadataResult<()> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| MetadataError::PasswordHash)?;

        let mut guard = self.write()?;
        if guard.users.contains_key(&key(name)) {
            return Err(MetadataError::UserExists(name.to_string()));
        }
        guard.users.insert(
            key(name),
            UserDef {
                name: name.to_string(),
                password_hash,
                roles,
            },
        );
        Ok(())
    }

    pub fn drop_user(&self, name: &str) -> MetadataResult<()> {
        self.write()?
            .users
            .remove(&key(name))
            .map(|_| ())
            .ok_or_else(|| MetadataError::UserNotFound(name.to_string()))
    }

    pub fn user(&self, name: &str) -> MetadataResult<Option<UserDef>> {
        Ok(self.read()?.users.get(&key(name)).cloned())
    }

    /// Checks a password against the stored hash
    pub fn verify_password(&self, name: &str, password: &str) -> MetadataResult<bool> {
        let user = self
            .user(name)?
            .ok_or_else(|| MetadataError::UserNotFound(name.to_string()))?;
        let parsed = PasswordHash::new(&user.password_hash).map_err(|_| MetadataError::PasswordHash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    // --- Security policies ---

    pub fn create_policy(&self, policy: SecurityPolicy) -> MetadataResult<()> {
        let mut guard = self.write()?;
        if guard.policies.contains_key(&key(&policy.name)) {
            return Err(MetadataError::PolicyExists(policy.name));
        }
        guard.policies.insert(key(&policy.name), policy);
        Ok(())
    }

    pub fn drop_policy(&self, name: &str) -> MetadataResult<()> {
        self.write()?
            .policies
            .remove(&key(name))
            .map(|_| ())
            .ok_or_else(|| MetadataError::PolicyNotFound(name.to_string()))
    }

    pub fn policy(&self, name: &str) -> MetadataResult<Option<SecurityPolicy>> {
        Ok(self.read()?.policies.get(&key(name)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_sequence() {
        let store = MetadataStore::new();
        let mut def = SequenceDef::new("ids");
        def.start = 10;
        def.increment = 5;
        store.create_sequence(def).unwrap();

        assert_eq!(store.current_value("ids").unwrap(), 10);
        assert_eq!(store.next_value("ids").unwrap(), 15);
        assert_eq!(store.next_value("IDS").unwrap(), 20);
        assert_eq!(store.current_value("ids").unwrap(), 20);
    }

    #[test]
    fn test_cached_sequence_yields_same_values() {
        let store = MetadataStore::new();
        let mut def = SequenceDef::new("c");
        def.sequence_type = SequenceType::Cached;
        def.cache = 2;
        store.create_sequence(def).unwrap();
        let values: Vec<i64> = (0..5).map(|_| store.next_value("c").unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_sequence() {
        let store = MetadataStore::new();
        store.create_sequence(SequenceDef::new("s")).unwrap();
        assert_eq!(
            store.create_sequence(SequenceDef::new("S")),
            Err(MetadataError::SequenceExists("S".into()))
        );
    }

    #[test]
    fn test_user_password_is_hashed() {
        let store = MetadataStore::new();
        store.create_user("alice", "secret", vec!["reader".into()]).unwrap();
        let user = store.user("alice").unwrap().unwrap();
        assert_ne!(user.password_hash, "secret");
        assert!(store.verify_password("alice", "secret").unwrap());
        assert!(!store.verify_password("alice", "wrong").unwrap());
    }

    #[test]
    fn test_policy_lifecycle() {
        let store = MetadataStore::new();
        store
            .create_policy(SecurityPolicy {
                name: "p".into(),
                rules: BTreeMap::new(),
            })
            .unwrap();
        assert!(store.policy("P").unwrap().is_some());
        store.drop_policy("p").unwrap();
        assert_eq!(
            store.drop_policy("p"),
            Err(MetadataError::PolicyNotFound("p".into()))
        );
    }
}
