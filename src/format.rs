//! Human-readable rendering of results, used by the MCP tools and the CLI.

use std::fmt::Write;

use crate::app::RankingResult;
use crate::recommend::InstallGuide;

pub fn format_ranking(result: &RankingResult) -> String {
    if !result.success {
        return format!("Error: {}", result.message);
    }

    if result.recommendations.is_empty() {
        return match &result.no_match_reason {
            Some(reason) => format!("{}\n{reason}", result.message),
            None => result.message.clone(),
        };
    }

    let mut out = format!(
        "Results for \"{}\" ({} found)\n\n",
        result.query, result.total_found
    );

    for (n, rec) in result.recommendations.iter().enumerate() {
        let item = &rec.item;
        let _ = writeln!(out, "{}. {} (id: {})", n + 1, item.name, item.id);
        if !item.description.is_empty() {
            let _ = writeln!(out, "   {}", item.description);
        }
        if !item.developer_name.is_empty() {
            let _ = writeln!(out, "   Developer: {}", item.developer_name);
        }
        let _ = writeln!(out, "   Monthly calls: {}", item.monthly_call_count);
        let _ = writeln!(out, "   {}", rec.url);
        let _ = writeln!(out, "   Relevance: {}%", (rec.similarity * 100.0).round());
        if let Some(reason) = &rec.reason {
            let _ = writeln!(out, "   Why: {reason}");
        }
        out.push('\n');
    }

    out.push_str("To add one, call add_mcp with its id.");
    out
}

pub fn format_install_guide(guide: &InstallGuide) -> String {
    if !guide.success {
        return format!("Error: {}", guide.message);
    }

    let name = guide.mcp_name.as_deref().unwrap_or(&guide.mcp_id);
    let mut out = format!("Add {name}\n\nLink: {}\n\nSteps:\n", guide.url);
    for step in &guide.instructions {
        let _ = writeln!(out, "{step}");
    }
    out.push_str("\nOnce installed, its tools are available right away.");
    out
}
