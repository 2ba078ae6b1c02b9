use std::collections::HashMap;

use async_trait::async_trait;

use crate::RetrievalError;

/// Looks up richer text (a parent chunk, a document summary) by id.
/// `Ok(None)` means the id is unknown.
#[async_trait]
pub trait KeyValueResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<Option<String>, RetrievalError>;
}

#[derive(Clone, Debug, Default)]
pub struct HashMapResolver {
    entries: HashMap<String, String>,
}

impl HashMapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(id.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for HashMapResolver {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl KeyValueResolver for HashMapResolver {
    async fn resolve(&self, id: &str) -> Result<Option<String>, RetrievalError> {
        Ok(self.entries.get(id).cloned())
    }
}
