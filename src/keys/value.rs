use serde::Serialize;
use crate::keys::mask::{Mask, MATCH_ALL};
use crate::{Error, Result};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Text shown instead of a binary value at untrusted boundaries.
pub const BINARY_PLACEHOLDER: &str = "<binary data>";

/// Page number, page size and mask of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    page: usize,
    page_size: usize,
    mask: Mask,
}

impl Query {
    /// Builds a query. Page numbers start at 1; both numbers must be positive.
    pub fn new(page: usize, page_size: usize, mask: &str) -> Result<Self> {
        if page == 0 {
            return Err(Error::InvalidArgument("page number must be positive".to_string()));
        }
        if page_size == 0 {
            return Err(Error::InvalidArgument("page size must be positive".to_string()));
        }
        Ok(Self {
            page,
            page_size,
            mask: Mask::new(mask),
        })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn is_masked(&self) -> bool {
        !self.mask.is_match_all()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            mask: Mask::new(MATCH_ALL),
        }
    }
}

/// Returns true if `text` has any character outside printable ASCII.
pub fn is_binary(text: &str) -> bool {
    text.chars().any(|c| !(c == ' ' || c.is_ascii_graphic()))
}

/// A value read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Value {
    pub value: String,
    pub is_binary: bool,
}

impl Value {
    pub fn new(value: String) -> Self {
        let is_binary = is_binary(&value);
        Self { value, is_binary }
    }

    /// The value with binary content replaced by [`BINARY_PLACEHOLDER`].
    pub fn redacted(&self) -> Value {
        if self.is_binary {
            Value {
                value: BINARY_PLACEHOLDER.to_string(),
                is_binary: true,
            }
        } else {
            self.clone()
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value.to_string())
    }
}

/// A list element tagged with its offset in the whole, unfiltered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListElement {
    pub index: usize,
    pub value: Value,
}

/// One field of a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashEntry {
    pub field: String,
    pub value: Value,
}

/// One member of a sorted set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZSetMember {
    pub score: i64,
    pub member: Value,
}
