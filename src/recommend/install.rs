use serde::{Deserialize, Serialize};

use crate::semantic::CatalogCache;

/// How to add one catalog item to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallGuide {
    pub success: bool,
    pub mcp_id: String,
    pub mcp_name: Option<String>,
    pub url: String,
    pub instructions: Vec<String>,
    pub message: String,
}

fn steps(url: &str, name: &str) -> Vec<String> {
    vec![
        format!("1. Open the connector page: {url}"),
        "2. Sign in with your Kakao account.".to_string(),
        "3. Press the \"Add\" button.".to_string(),
        "4. Enable the connector in your client's MCP settings.".to_string(),
        format!("5. Restart the client and \"{name}\" is ready to use."),
    ]
}

/// Install instructions for `mcp_id`.
///
/// The name comes from the cache, then from the catalog provider, and falls
/// back to `MCP #{id}` when neither knows the item.
pub fn install_guide(cache: &CatalogCache, mcp_id: &str) -> InstallGuide {
    let mcp_id = mcp_id.trim();
    let Ok(id) = mcp_id.parse::<u64>() else {
        return InstallGuide {
            success: false,
            mcp_id: mcp_id.to_string(),
            mcp_name: None,
            url: String::new(),
            instructions: vec![],
            message: format!("\"{mcp_id}\" is not a valid MCP id. Use the numeric id from find_mcp."),
        };
    };

    let cached = cache
        .get()
        .and_then(|s| s.mcps.iter().find(|m| m.item.id == id).map(|m| m.item.name.clone()));

    let name = match cached {
        Some(name) => Some(name),
        None => match cache.catalog().fetch_one(id) {
            Ok(item) => item.map(|item| item.name),
            Err(e) => {
                log::warn!("catalog lookup for id={id} failed: {e}");
                None
            }
        },
    };

    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("MCP #{id}"));
    let url = cache.catalog().page_url(id);

    InstallGuide {
        success: true,
        mcp_id: id.to_string(),
        instructions: steps(&url, &name),
        message: format!("How to add the \"{name}\" MCP."),
        mcp_name: Some(name),
        url,
    }
}
