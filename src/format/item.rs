//! Data model: items, ids, metadata values and the decoded index.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TortillaError};

/// Per-item metadata, ordered by key so encoding is deterministic
pub type Metadata = BTreeMap<String, MetaValue>;

/// Identifier of an item, unique within one container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemId {
    Int(u64),
    Str(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId::Int(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Str(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Str(s)
    }
}

/// A scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Str(s) => write!(f, "{}", s),
            MetaValue::Int(n) => write!(f, "{}", n),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Int(n)
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        MetaValue::Float(x)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// One packed file's record inside a container
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Absolute byte offset within the container
    pub offset: u64,
    pub length: u64,
    pub metadata: Metadata,
}

impl Item {
    /// One past the last byte of this item
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// How a caller refers to an item: by id or by position in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(ItemId),
    Position(usize),
}

impl ItemRef {
    pub fn id(id: impl Into<ItemId>) -> Self {
        ItemRef::Id(id.into())
    }

    pub fn position(position: usize) -> Self {
        ItemRef::Position(position)
    }
}

impl From<usize> for ItemRef {
    fn from(position: usize) -> Self {
        ItemRef::Position(position)
    }
}

impl From<ItemId> for ItemRef {
    fn from(id: ItemId) -> Self {
        ItemRef::Id(id)
    }
}

impl From<&str> for ItemRef {
    fn from(id: &str) -> Self {
        ItemRef::Id(ItemId::from(id))
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Id(id) => write!(f, "id {}", id),
            ItemRef::Position(p) => write!(f, "position {}", p),
        }
    }
}

/// Decoded footer: the ordered item table plus container-level fields
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    items: Vec<Item>,
    /// id → position
    positions: HashMap<ItemId, usize>,
    file_format: String,
    part_index: u32,
    part_count: u32,
}

impl Index {
    /// Build an index, rejecting duplicate ids
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            if positions.insert(item.id.clone(), pos).is_some() {
                return Err(TortillaError::DuplicateItemId(item.id.to_string()));
            }
        }
        Ok(Self {
            items,
            positions,
            file_format: String::new(),
            part_index: 0,
            part_count: 1,
        })
    }

    pub fn with_file_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = format.into();
        self
    }

    pub fn with_part(mut self, part_index: u32, part_count: u32) -> Self {
        self.part_index = part_index;
        self.part_count = part_count;
        self
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn file_format(&self) -> &str {
        &self.file_format
    }

    /// Zero-based part number of a multi-part container
    pub fn part_index(&self) -> u32 {
        self.part_index
    }

    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    /// Total bytes of the data region (sum of item lengths)
    pub fn data_length(&self) -> u64 {
        self.items.iter().map(|i| i.length).sum()
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Look up an item by id or position
    pub fn get(&self, item: &ItemRef) -> Result<&Item> {
        match item {
            ItemRef::Id(id) => self
                .positions
                .get(id)
                .map(|&pos| &self.items[pos])
                .ok_or_else(|| TortillaError::ItemNotFound(id.to_string())),
            ItemRef::Position(pos) => {
                self.items
                    .get(*pos)
                    .ok_or(TortillaError::IndexOutOfRange {
                        position: *pos,
                        len: self.items.len(),
                    })
            }
        }
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
