//! Core object model for restack
//!
//! Content-addressed Blob, Tree and Commit objects. Every object is stored
//! as a one-byte kind tag followed by its bincode body, and its identity is
//! the SHA-256 of those tagged bytes. Objects are never mutated: a "changed"
//! commit is always a new object with a new id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form used in log output
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Object type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    fn tag(self) -> u8 {
        match self {
            ObjectKind::Blob => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Commit => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ObjectKind::Blob),
            2 => Some(ObjectKind::Tree),
            3 => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// File content object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Raw content data
    pub data: Vec<u8>,
    /// Executable flag (for Unix permissions)
    pub executable: bool,
}

impl Blob {
    /// Create a new blob from data
    pub fn new(data: Vec<u8>, executable: bool) -> Self {
        Self { data, executable }
    }

    /// Create a new blob from data (non-executable)
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(data, false)
    }
}

/// Directory tree entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Name of the entry (a single path component)
    pub name: String,
    /// Object ID (points to Blob or Tree)
    pub id: ObjectId,
    /// Entry type
    pub kind: ObjectKind,
    /// File permissions (Unix mode)
    pub mode: u32,
}

impl TreeEntry {
    /// Create a new tree entry
    pub fn new(name: String, id: ObjectId, kind: ObjectKind, mode: u32) -> Self {
        Self {
            name,
            id,
            kind,
            mode,
        }
    }
}

/// Directory object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Sorted entries for deterministic hashing
    pub entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Id of the canonical empty tree, the snapshot of "before the root commit"
    pub fn empty_id() -> ObjectId {
        // Tag followed by bincode's u64 length prefix of an empty map.
        let mut encoded = [0u8; 9];
        encoded[0] = ObjectKind::Tree.tag();
        ObjectId::from_data(&encoded)
    }

    /// Add or update an entry
    pub fn insert(&mut self, entry: TreeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Remove an entry
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    /// Get an entry
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity plus the moment it acted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Unix seconds
    pub timestamp: i64,
    /// Timezone offset in minutes
    pub tz_offset: i32,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64, tz_offset: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset,
        }
    }

    /// Signature for `name <email>` stamped with the current UTC time
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, chrono::Utc::now().timestamp(), 0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tz_offset < 0 { '-' } else { '+' };
        let offset = self.tz_offset.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.timestamp,
            sign,
            offset / 60,
            offset % 60
        )
    }
}

/// Header keys carrying cryptographic signatures over the commit
pub const SIGNATURE_HEADERS: &[&str] = &["gpgsig", "gpgsig-sha256"];

/// Opaque extra commit header, carried across rewrites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraHeader {
    pub key: String,
    pub value: String,
}

impl ExtraHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A signature no longer verifies once anything about the commit changes.
    pub fn is_signature(&self) -> bool {
        SIGNATURE_HEADERS.contains(&self.key.as_str())
    }
}

/// Commit/Revision object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Tree object ID for this revision
    pub tree_id: ObjectId,
    /// Parent commit IDs (empty for a root commit)
    pub parents: Vec<ObjectId>,
    /// Who wrote the change
    pub author: Signature,
    /// Who created this commit object
    pub committer: Signature,
    /// Commit message
    pub message: String,
    /// Extra headers, in original order
    pub extra_headers: Vec<ExtraHeader>,
}

impl Commit {
    /// Create a new commit whose committer is its author
    pub fn new(tree_id: ObjectId, parents: Vec<ObjectId>, author: Signature, message: String) -> Self {
        Self {
            tree_id,
            parents,
            committer: author.clone(),
            author,
            message,
            extra_headers: Vec::new(),
        }
    }

    /// Check if this is a root commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// The single parent, if the commit has exactly one
    pub fn sole_parent(&self) -> Option<ObjectId> {
        match self.parents.as_slice() {
            [parent] => Some(*parent),
            _ => None,
        }
    }

    /// Message without leading and trailing blank lines
    pub fn body(&self) -> &str {
        self.message.trim_matches(|c| c == '\n' || c == '\r')
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.body().lines().next().unwrap_or("")
    }

    /// Extra headers minus any signature headers
    pub fn unsigned_headers(&self) -> Vec<ExtraHeader> {
        self.extra_headers
            .iter()
            .filter(|h| !h.is_signature())
            .cloned()
            .collect()
    }
}

/// Generic object that can be any type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Get the object kind
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Serialize into the tagged on-store format
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        let body = match self {
            Object::Blob(blob) => bincode::serialize(blob)?,
            Object::Tree(tree) => bincode::serialize(tree)?,
            Object::Commit(commit) => bincode::serialize(commit)?,
        };
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(self.kind().tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse the tagged on-store format
    pub fn decode(data: &[u8]) -> Result<Self, bincode::Error> {
        let (tag, body) = data
            .split_first()
            .ok_or_else(|| Box::new(bincode::ErrorKind::Custom("empty object".into())))?;
        match ObjectKind::from_tag(*tag) {
            Some(ObjectKind::Blob) => Ok(Object::Blob(bincode::deserialize(body)?)),
            Some(ObjectKind::Tree) => Ok(Object::Tree(bincode::deserialize(body)?)),
            Some(ObjectKind::Commit) => Ok(Object::Commit(bincode::deserialize(body)?)),
            None => Err(Box::new(bincode::ErrorKind::Custom(format!(
                "unknown object tag {}",
                tag
            )))),
        }
    }

    /// Get the object ID
    pub fn id(&self) -> Result<ObjectId, bincode::Error> {
        Ok(ObjectId::from_data(&self.encode()?))
    }
}
