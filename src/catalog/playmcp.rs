use std::time::Duration;

use serde::Deserialize;

use crate::catalog::{CatalogError, CatalogItem, CatalogProvider};
use crate::config::CatalogConfig;

/// Client for the PlayMCP public catalog API.
pub struct PlayMcpClient {
    api_base: String,
    web_base: String,
    page_size: u32,
    timeout: Duration,
}

/// Wire format of one catalog entry. Optional fields come back as `null`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpInfo {
    id: u64,
    name: String,
    description: Option<String>,
    developer_name: Option<String>,
    monthly_call_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpPage {
    #[serde(default)]
    content: Vec<McpInfo>,
    #[serde(default)]
    total_pages: u32,
}

impl From<McpInfo> for CatalogItem {
    fn from(info: McpInfo) -> Self {
        CatalogItem {
            id: info.id,
            name: info.name,
            description: info.description.unwrap_or_default(),
            developer_name: info.developer_name.unwrap_or_default(),
            monthly_call_count: info.monthly_call_count.unwrap_or_default(),
        }
    }
}

impl PlayMcpClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            web_base: config.web_base.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, CatalogError> {
        log::debug!("GET {url}");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(client
            .get(url)
            .header("accept", "application/json")
            .send()?)
    }

    fn fetch_page(&self, page: u32) -> Result<McpPage, CatalogError> {
        let url = format!(
            "{}/mcps?page={page}&sortBy=FEATURED_LEVEL&pageSize={}",
            self.api_base, self.page_size
        );

        let resp = self.get(&url)?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }

        Ok(resp.json::<McpPage>()?)
    }
}

impl CatalogProvider for PlayMcpClient {
    fn fetch_all(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut items = Vec::new();
        let mut page = 0;
        let mut total_pages = 1;

        while page < total_pages {
            let data = self.fetch_page(page)?;
            log::debug!(
                "catalog page {}/{} items={}",
                page + 1,
                data.total_pages,
                data.content.len()
            );

            items.extend(data.content.into_iter().map(CatalogItem::from));
            total_pages = data.total_pages;
            page += 1;
        }

        log::info!("fetched {} catalog items", items.len());
        Ok(items)
    }

    fn fetch_one(&self, id: u64) -> Result<Option<CatalogItem>, CatalogError> {
        let url = format!("{}/mcps/{id}", self.api_base);

        let resp = self.get(&url)?;
        if !resp.status().is_success() {
            log::warn!("catalog detail for {id} returned {}", resp.status());
            return Ok(None);
        }

        Ok(Some(resp.json::<McpInfo>()?.into()))
    }

    fn page_url(&self, id: u64) -> String {
        format!("{}/mcp/{id}", self.web_base)
    }
}
