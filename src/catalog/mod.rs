//! Catalog of installable MCP connectors.
//!
//! The catalog provider is the source of truth for connector entries. The
//! rest of the crate only sees [`CatalogItem`] and the [`CatalogProvider`]
//! trait.

pub mod playmcp;

use serde::{Deserialize, Serialize};

pub use playmcp::PlayMcpClient;

/// One connector entry as published by the catalog provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub developer_name: String,
    /// Popularity signal, not used for ranking
    #[serde(default)]
    pub monthly_call_count: u64,
}

impl CatalogItem {
    /// Text submitted to the embedding provider for this item.
    pub fn embedding_text(&self) -> String {
        format!("{}. {}", self.name, self.description)
            .trim()
            .to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("catalog returned status {status} for {url}")]
    Status { status: u16, url: String },
}

pub trait CatalogProvider: Send + Sync {
    /// Every item in the catalog. Pagination is handled internally.
    fn fetch_all(&self) -> Result<Vec<CatalogItem>, CatalogError>;

    /// One item by id, or `None` if the provider doesn't know it.
    fn fetch_one(&self, id: u64) -> Result<Option<CatalogItem>, CatalogError>;

    /// Public page of an item.
    fn page_url(&self, id: u64) -> String;
}
