//! Reading polygons from GeoJSON files and popups back into plain text.

use anyhow::{Context, Result, bail};
use mapnotes_engine::{Feature, FeatureCollection, Geometry};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// First polygon in a GeoJSON file holding a FeatureCollection, a Feature or a
/// bare geometry.
pub fn read_polygon(path: &Path) -> Result<Geometry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_polygon(&content).with_context(|| format!("No usable polygon in {}", path.display()))
}

pub fn parse_polygon(content: &str) -> Result<Geometry> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or_default();

    let geometries: Vec<Geometry> = match kind {
        "FeatureCollection" => serde_json::from_value::<FeatureCollection>(value)?
            .features
            .into_iter()
            .map(|f| f.geometry)
            .collect(),
        "Feature" => vec![serde_json::from_value::<Feature>(value)?.geometry],
        _ => vec![serde_json::from_value::<Geometry>(value)?],
    };

    match geometries
        .into_iter()
        .find(|g| matches!(g, Geometry::Polygon(_)))
    {
        Some(polygon) => Ok(polygon),
        None => bail!("expected a Polygon geometry"),
    }
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"))
}

/// Popup HTML as terminal lines: tags dropped, entities decoded, blank lines removed.
pub fn popup_lines(html: &str) -> Vec<String> {
    html.lines()
        .map(|line| {
            let text = tag_regex().replace_all(line, "");
            html_escape::decode_html_entities(text.trim()).into_owned()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
