//! In-memory storage implementation

use crate::storage::Entry;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Handle shared between client connections. The lock is the single
/// serialization point: mutating commands take the write half, read-only
/// commands the read half, which keeps every per-key operation linearizable
/// across connections.
pub type SharedStore = Arc<RwLock<Store>>;

/// In-memory store of typed entries
pub struct Store {
    data: HashMap<String, Entry>,
    started: Instant,
    ops_count: u64,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Store {
            data: HashMap::new(),
            started: Instant::now(),
            ops_count: 0,
        }
    }

    /// Create an empty store wrapped for concurrent access
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Store::new()))
    }

    /// Scalar read. Absent keys are `None`; non-string entries are an error.
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(Entry::String(val)) => Ok(Some(val)),
            Some(_) => Err(Error::WrongType),
        }
    }

    /// Create or overwrite the key as a string, regardless of prior variant.
    pub fn set(&mut self, key: &str, value: &str) {
        self.data
            .insert(key.to_string(), Entry::String(value.to_string()));
        self.ops_count += 1;
    }

    /// Remove entries of any variant; returns how many existed.
    pub fn del(&mut self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.data.remove(key).is_some() {
                removed += 1;
                self.ops_count += 1;
            }
        }
        removed
    }

    /// Add `delta` to the decimal integer held at `key`, treating an absent
    /// key as 0. Stores and returns the new value.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64> {
        let current = match self.data.get(key) {
            None => 0,
            Some(Entry::String(val)) => val.parse::<i64>().map_err(|_| Error::NotInteger)?,
            Some(_) => return Err(Error::WrongType),
        };

        let next = current.checked_add(delta).ok_or(Error::NotInteger)?;
        self.data
            .insert(key.to_string(), Entry::String(next.to_string()));
        self.ops_count += 1;
        Ok(next)
    }

    /// Insert at the head of the list, creating it on first push.
    /// Returns the new length.
    pub fn lpush(&mut self, key: &str, value: &str) -> Result<usize> {
        let entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));

        match entry {
            Entry::List(list) => {
                list.push_front(value.to_string());
                self.ops_count += 1;
                Ok(list.len())
            }
            _ => Err(Error::WrongType),
        }
    }

    /// Remove and return the head of the list. Absent or empty lists yield
    /// `None`, not an error. A list drained to empty releases its key.
    pub fn lpop(&mut self, key: &str) -> Result<Option<String>> {
        let popped = match self.data.get_mut(key) {
            None => return Ok(None),
            Some(Entry::List(list)) => list.pop_front(),
            Some(_) => return Err(Error::WrongType),
        };

        if popped.is_some() {
            self.ops_count += 1;
            let drained = matches!(self.data.get(key), Some(Entry::List(list)) if list.is_empty());
            if drained {
                self.data.remove(key);
            }
        }
        Ok(popped)
    }

    /// List length, 0 if absent.
    pub fn llen(&self, key: &str) -> Result<usize> {
        match self.data.get(key) {
            None => Ok(0),
            Some(Entry::List(list)) => Ok(list.len()),
            Some(_) => Err(Error::WrongType),
        }
    }

    /// Create or update one hash field. Returns whether the field was new.
    pub fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        let entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));

        match entry {
            Entry::Hash(hash) => {
                let created = hash
                    .insert(field.to_string(), value.to_string())
                    .is_none();
                self.ops_count += 1;
                Ok(created)
            }
            _ => Err(Error::WrongType),
        }
    }

    /// All field/value pairs of the hash; empty if absent.
    pub fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Hash(hash)) => Ok(hash
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            Some(_) => Err(Error::WrongType),
        }
    }

    /// Add a member to the set, creating it if absent. Returns whether the
    /// member was newly added; repeats are no-ops.
    pub fn sadd(&mut self, key: &str, member: &str) -> Result<bool> {
        let entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(Default::default()));

        match entry {
            Entry::Set(set) => {
                let added = set.insert(member.to_string());
                if added {
                    self.ops_count += 1;
                }
                Ok(added)
            }
            _ => Err(Error::WrongType),
        }
    }

    /// All members of the set; empty if absent.
    pub fn smembers(&self, key: &str) -> Result<Vec<String>> {
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(Error::WrongType),
        }
    }

    /// Get number of keys in store
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Server stats in the INFO text format
    pub fn info(&self) -> String {
        format!(
            "# Server\r\ntidepool_version:{}\r\n# Keyspace\r\ndb0:keys={},expires=0\r\n# Stats\r\ntotal_operations:{}\r\nuptime_seconds:{}",
            env!("CARGO_PKG_VERSION"),
            self.data.len(),
            self.ops_count,
            self.started.elapsed().as_secs()
        )
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_set_get_roundtrip() {
        let mut store = Store::new();
        store.set("mystr", "Hello world! 🙂");
        assert_eq!(store.get("mystr").unwrap(), Some("Hello world! 🙂"));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn del_removes_any_variant_and_counts() {
        let mut store = Store::new();
        store.set("a", "1");
        store.lpush("b", "x").unwrap();
        store.sadd("c", "m").unwrap();
        let removed = store.del(&["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(removed, 3);
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn incr_defaults_to_zero_and_accumulates() {
        let mut store = Store::new();
        assert_eq!(store.incr_by("mycounter", 2).unwrap(), 2);
        assert_eq!(store.incr_by("mycounter", 2).unwrap(), 4);
        assert_eq!(store.incr_by("mycounter", 4).unwrap(), 8);
        assert_eq!(store.get("mycounter").unwrap(), Some("8"));
    }

    #[test]
    fn incr_after_del_starts_fresh() {
        let mut store = Store::new();
        store.incr_by("n", 41).unwrap();
        store.del(&["n".into()]);
        assert_eq!(store.incr_by("n", 1).unwrap(), 1);
    }

    #[test]
    fn incr_rejects_non_numeric_strings() {
        let mut store = Store::new();
        store.set("mystr", "hello");
        assert!(matches!(store.incr_by("mystr", 1), Err(Error::NotInteger)));
    }

    #[test]
    fn incr_rejects_overflow() {
        let mut store = Store::new();
        store.set("big", &i64::MAX.to_string());
        assert!(matches!(store.incr_by("big", 1), Err(Error::NotInteger)));
        // value is untouched on failure
        assert_eq!(store.get("big").unwrap(), Some(&*i64::MAX.to_string()));
    }

    #[test]
    fn list_pops_in_reverse_push_order() {
        let mut store = Store::new();
        store.lpush("mylist", "🙂").unwrap();
        store.lpush("mylist", "world!").unwrap();
        store.lpush("mylist", "Hello").unwrap();
        assert_eq!(store.llen("mylist").unwrap(), 3);

        let mut parts = Vec::new();
        while let Some(part) = store.lpop("mylist").unwrap() {
            parts.push(part);
        }
        assert_eq!(parts.join(" "), "Hello world! 🙂");
    }

    #[test]
    fn pop_on_absent_or_drained_list_is_none() {
        let mut store = Store::new();
        assert_eq!(store.lpop("mylist").unwrap(), None);

        store.lpush("mylist", "only").unwrap();
        assert_eq!(store.lpop("mylist").unwrap(), Some("only".into()));
        // drained list releases the key, so a scalar read now reports absence
        assert_eq!(store.lpop("mylist").unwrap(), None);
        assert_eq!(store.get("mylist").unwrap(), None);
        assert_eq!(store.llen("mylist").unwrap(), 0);
    }

    #[test]
    fn scalar_read_of_a_list_is_wrong_type() {
        let mut store = Store::new();
        store.lpush("mylist", "x").unwrap();
        assert!(matches!(store.get("mylist"), Err(Error::WrongType)));
        assert!(matches!(store.incr_by("mylist", 1), Err(Error::WrongType)));
        assert!(matches!(store.sadd("mylist", "x"), Err(Error::WrongType)));
    }

    #[test]
    fn list_ops_against_a_string_are_wrong_type() {
        let mut store = Store::new();
        store.set("mystr", "hello");
        assert!(matches!(store.lpush("mystr", "x"), Err(Error::WrongType)));
        assert!(matches!(store.lpop("mystr"), Err(Error::WrongType)));
        assert!(matches!(store.llen("mystr"), Err(Error::WrongType)));
    }

    #[test]
    fn hash_fields_overwrite_and_collect() {
        let mut store = Store::new();
        assert!(store.hset("mydict", "naam", "adisor").unwrap());
        assert!(store.hset("mydict", "city", "rotterdam").unwrap());
        assert!(!store.hset("mydict", "city", "delft").unwrap());

        let mut pairs = store.hgetall("mydict").unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("city".to_string(), "delft".to_string()),
                ("naam".to_string(), "adisor".to_string()),
            ]
        );
        assert!(store.hgetall("nosuch").unwrap().is_empty());
    }

    #[test]
    fn sadd_is_idempotent() {
        let mut store = Store::new();
        for n in [1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 4, 5, 5] {
            store.sadd("myset", &n.to_string()).unwrap();
        }
        let mut members: Vec<i64> = store
            .smembers("myset")
            .unwrap()
            .iter()
            .map(|m| m.parse().unwrap())
            .collect();
        members.sort();
        assert_eq!(members, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_overwrites_other_variants() {
        let mut store = Store::new();
        store.lpush("k", "x").unwrap();
        store.set("k", "plain");
        assert_eq!(store.get("k").unwrap(), Some("plain"));
    }
}
