//! Lexical (keyword) scoring for hybrid ranking.
//!
//! Free text is mapped onto a fixed taxonomy of category tags by substring
//! rules. A query and a catalog item are then compared by how many of the
//! query's tags the item shares.
//!
//! The taxonomy is data (`taxonomy.yaml`), loaded once and shared read-only.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::storage::StorageManager;

/// File name of the taxonomy override inside the base directory.
pub const TAXONOMY_FILE: &str = "taxonomy.yaml";

const DEFAULT_TAXONOMY_YAML: &str = include_str!("taxonomy.yaml");

static DEFAULT_TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| {
    Taxonomy::from_yaml(DEFAULT_TAXONOMY_YAML).expect("bundled taxonomy.yaml is invalid")
});

/// One category tag and the substrings that trigger it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub tag: String,
    pub triggers: Vec<String>,
}

/// Direct tag assignment for a known catalog item name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRule {
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Invalid taxonomy yaml: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("Invalid taxonomy: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable keyword taxonomy.
///
/// Triggers and name keys are stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    names: Vec<NameRule>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        DEFAULT_TAXONOMY.clone()
    }
}

impl Taxonomy {
    /// Build a taxonomy from already-structured data.
    pub fn new(categories: Vec<Category>, names: Vec<NameRule>) -> Result<Self, TaxonomyError> {
        let mut taxonomy = Self { categories, names };
        taxonomy.normalize()?;
        Ok(taxonomy)
    }

    /// Parse a taxonomy from its YAML representation.
    pub fn from_yaml(yaml: &str) -> Result<Self, TaxonomyError> {
        let mut taxonomy: Self = serde_yml::from_str(yaml)?;
        taxonomy.normalize()?;
        Ok(taxonomy)
    }

    /// Load `taxonomy.yaml` from the store, falling back to the bundled one.
    pub fn load_with(store: &dyn StorageManager) -> Result<Self, TaxonomyError> {
        if !store.exists(TAXONOMY_FILE) {
            return Ok(Self::default());
        }

        let bytes = store.read(TAXONOMY_FILE)?;
        let yaml = String::from_utf8(bytes)
            .map_err(|_| TaxonomyError::Invalid(format!("{TAXONOMY_FILE} is not valid utf8")))?;

        let taxonomy = Self::from_yaml(&yaml)?;
        log::info!(
            "loaded {TAXONOMY_FILE} with {} categories and {} name rules",
            taxonomy.categories.len(),
            taxonomy.names.len()
        );
        Ok(taxonomy)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Tags whose triggers occur in `text`.
    ///
    /// Each tag appears at most once, in taxonomy order.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        let mut found = Vec::new();
        self.scan_into(&text, &mut found);
        found
    }

    /// Tags for a catalog item: the taxonomy scan over `name` + `description`,
    /// united with the tags of every name rule matching the item name.
    pub fn match_item_keywords(&self, name: &str, description: &str) -> Vec<String> {
        let mut found = Vec::new();

        let name_lower = name.trim().to_lowercase();
        if !name_lower.is_empty() {
            for rule in &self.names {
                if name_lower.contains(&rule.name) || rule.name.contains(&name_lower) {
                    for tag in &rule.tags {
                        push_unique(&mut found, tag);
                    }
                }
            }
        }

        let combined = format!("{} {}", name, description).to_lowercase();
        self.scan_into(&combined, &mut found);

        found
    }

    fn scan_into(&self, lowered: &str, found: &mut Vec<String>) {
        for category in &self.categories {
            if category.triggers.iter().any(|t| lowered.contains(t.as_str())) {
                push_unique(found, &category.tag);
            }
        }
    }

    fn normalize(&mut self) -> Result<(), TaxonomyError> {
        for category in &mut self.categories {
            if category.tag.trim().is_empty() {
                return Err(TaxonomyError::Invalid("category with empty tag".to_string()));
            }
            for trigger in &mut category.triggers {
                *trigger = trigger.to_lowercase();
            }
            // an empty trigger would match every text
            if category.triggers.iter().any(|t| t.is_empty()) {
                return Err(TaxonomyError::Invalid(format!(
                    "category '{}' has an empty trigger",
                    category.tag
                )));
            }
        }

        for rule in &mut self.names {
            rule.name = rule.name.trim().to_lowercase();
            if rule.name.is_empty() {
                return Err(TaxonomyError::Invalid("name rule with empty name".to_string()));
            }
        }

        Ok(())
    }
}

/// Share of the query's tags that the item also carries.
///
/// `|query ∩ item| / max(|query|, 1)`, clamped to 1. Zero when either side
/// has no tags.
pub fn keyword_score(query_tags: &[String], item_tags: &[String]) -> f32 {
    if query_tags.is_empty() || item_tags.is_empty() {
        return 0.0;
    }

    let mut seen: Vec<&String> = Vec::with_capacity(query_tags.len());
    let mut intersection = 0usize;
    for tag in query_tags {
        if seen.contains(&tag) {
            continue;
        }
        seen.push(tag);
        if item_tags.contains(tag) {
            intersection += 1;
        }
    }

    let score = intersection as f32 / seen.len().max(1) as f32;
    score.min(1.0)
}

fn push_unique(found: &mut Vec<String>, tag: &str) {
    if !found.iter().any(|t| t == tag) {
        found.push(tag.to_string());
    }
}
