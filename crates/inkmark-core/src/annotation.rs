//! Annotation documents: every page's overlay in one JSON object.
//!
//! The persisted form maps string page numbers to one surface blob each:
//!
//! ```json
//! { "1": { "version": 1, "width": 800.0, "height": 1100.0, "objects": [] } }
//! ```

use crate::coordinator::PageNumber;
use crate::error::{AnnotationError, AnnotationResult};
use crate::registry::OverlayRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialized overlays keyed by page number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationDocument {
    pages: BTreeMap<PageNumber, Value>,
}

/// Result of loading a document into a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Pages whose blob was loaded.
    pub loaded: Vec<PageNumber>,
    /// Pages without a surface; their blobs were ignored.
    pub dropped: Vec<PageNumber>,
    /// Per-page failures. Other pages still load.
    pub failed: Vec<AnnotationError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.failed.is_empty()
    }
}

impl AnnotationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored document.
    ///
    /// A JSON string holding a document is unwrapped first. Keys that are not
    /// page numbers are skipped.
    pub fn from_json(json: &str) -> AnnotationResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AnnotationError::MalformedAnnotationData(e.to_string()))?;
        let value = match value {
            Value::String(inner) => serde_json::from_str(&inner)
                .map_err(|e| AnnotationError::MalformedAnnotationData(e.to_string()))?,
            other => other,
        };
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> AnnotationResult<Self> {
        let Value::Object(map) = value else {
            return Err(AnnotationError::MalformedAnnotationData(
                "expected an object keyed by page number".to_string(),
            ));
        };

        let mut pages = BTreeMap::new();
        for (key, blob) in map {
            match key.trim().parse::<PageNumber>() {
                Ok(page) if page > 0 => {
                    pages.insert(page, blob);
                }
                _ => log::warn!("Skipping annotation entry with key {:?}", key),
            }
        }
        Ok(Self { pages })
    }

    pub fn to_json(&self) -> AnnotationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Snapshot every surface. Pages without a surface are omitted.
    pub fn capture(registry: &OverlayRegistry) -> AnnotationResult<Self> {
        let mut pages = BTreeMap::new();
        for (page, surface) in registry.iter() {
            pages.insert(page, surface.serialize()?);
        }
        Ok(Self { pages })
    }

    /// Load each page blob into its surface.
    pub fn apply(&self, registry: &mut OverlayRegistry) -> LoadReport {
        let mut report = LoadReport::default();
        for (&page, blob) in &self.pages {
            let Some(surface) = registry.get_surface_mut(page) else {
                log::debug!("No overlay for page {}, dropping its annotations", page);
                report.dropped.push(page);
                continue;
            };
            match surface.load(blob) {
                Ok(count) => {
                    log::debug!("Loaded {} objects on page {}", count, page);
                    report.loaded.push(page);
                }
                Err(e) => {
                    log::warn!("Failed to load annotations for page {}: {}", page, e);
                    report.failed.push(AnnotationError::PerPageLoadFailed {
                        page,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    pub fn page(&self, page: PageNumber) -> Option<&Value> {
        self.pages.get(&page)
    }

    pub fn pages(&self) -> impl Iterator<Item = PageNumber> + '_ {
        self.pages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Highest page number carrying annotations.
    pub fn last_page(&self) -> Option<PageNumber> {
        self.pages.keys().next_back().copied()
    }
}
