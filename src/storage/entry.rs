//! Typed entries bound to keys

use std::collections::{HashMap, HashSet, VecDeque};

/// The value held at one key. A key denotes at most one variant at a time;
/// a command addressed at a different variant fails with `WrongType` instead
/// of coercing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    String(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}
