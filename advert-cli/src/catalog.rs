//! JSON catalog provider
//!
//! A catalog file is a JSON object mapping advertisement ids to entries:
//!
//! ```json
//! { "10": { "name": "Spring sale", "description": "Everything 20% off" } }
//! ```

use advert_error::{ErrorContext, Result};
use advert_traits::{AdvertProvider, Advertisement, ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// One catalog record; the id comes from the map key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Provider answering from an in-memory catalog.
///
/// Can be switched into an outage mode where every call fails, which is how
/// the CLI demonstrates fallback to the backup.
#[derive(Debug)]
pub struct JsonCatalogProvider {
    name: String,
    entries: HashMap<String, Advertisement>,
    down: AtomicBool,
}

impl JsonCatalogProvider {
    pub fn new(name: impl Into<String>, catalog: HashMap<String, CatalogEntry>) -> Self {
        let entries = catalog
            .into_iter()
            .map(|(id, entry)| {
                let adv = Advertisement::new(id.clone(), entry.name)
                    .with_description(entry.description);
                (id, adv)
            })
            .collect();
        Self {
            name: name.into(),
            entries,
            down: AtomicBool::new(false),
        }
    }

    /// Parses a catalog from JSON text
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let catalog: HashMap<String, CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self::new(name, catalog))
    }

    /// Reads a catalog file
    pub fn load(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let catalog: HashMap<String, CatalogEntry> = serde_json::from_str(&json)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        Ok(Self::new(name, catalog))
    }

    /// Makes every subsequent call fail
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AdvertProvider for JsonCatalogProvider {
    async fn fetch(&self, id: &str) -> ProviderResult<Option<Advertisement>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(format!("{} is down", self.name)));
        }
        Ok(self.entries.get(id).cloned())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
