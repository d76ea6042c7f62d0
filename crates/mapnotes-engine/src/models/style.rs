use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The basemap styles the map can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasemapStyle {
    #[default]
    Streets,
    Satellite,
    Dark,
    Light,
}

impl BasemapStyle {
    pub fn all() -> &'static [BasemapStyle] {
        &[
            BasemapStyle::Streets,
            BasemapStyle::Satellite,
            BasemapStyle::Dark,
            BasemapStyle::Light,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BasemapStyle::Streets => "streets",
            BasemapStyle::Satellite => "satellite",
            BasemapStyle::Dark => "dark",
            BasemapStyle::Light => "light",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            BasemapStyle::Streets => "mapbox://styles/mapbox/streets-v11",
            BasemapStyle::Satellite => "mapbox://styles/mapbox/satellite-streets-v11",
            BasemapStyle::Dark => "mapbox://styles/mapbox/dark-v10",
            BasemapStyle::Light => "mapbox://styles/mapbox/light-v10",
        }
    }

    /// The style after this one, wrapping around
    pub fn next(&self) -> BasemapStyle {
        let all = Self::all();
        let index = all.iter().position(|s| s == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

impl fmt::Display for BasemapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown basemap style {0:?}")]
pub struct UnknownStyle(pub String);

impl FromStr for BasemapStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|style| style.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Maps each basemap style to the URL the engine loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleCatalog {
    overrides: HashMap<BasemapStyle, String>,
}

impl StyleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, style: BasemapStyle, url: impl Into<String>) -> Self {
        self.overrides.insert(style, url.into());
        self
    }

    pub fn url(&self, style: BasemapStyle) -> &str {
        self.overrides
            .get(&style)
            .map(String::as_str)
            .unwrap_or_else(|| style.default_url())
    }

    /// Reverse lookup used when the engine reports which style finished loading.
    pub fn style_for_url(&self, url: &str) -> Option<BasemapStyle> {
        BasemapStyle::all()
            .iter()
            .copied()
            .find(|style| self.url(*style) == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("streets", BasemapStyle::Streets)]
    #[case("Satellite", BasemapStyle::Satellite)]
    #[case(" dark ", BasemapStyle::Dark)]
    #[case("light", BasemapStyle::Light)]
    fn test_parse_style_names(#[case] input: &str, #[case] expected: BasemapStyle) {
        assert_eq!(input.parse::<BasemapStyle>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_style_name() {
        assert!("terrain".parse::<BasemapStyle>().is_err());
    }

    #[test]
    fn test_next_cycles_through_all_styles() {
        let mut style = BasemapStyle::Streets;
        for _ in 0..BasemapStyle::all().len() {
            style = style.next();
        }
        assert_eq!(style, BasemapStyle::Streets);
    }

    #[test]
    fn test_catalog_overrides_and_reverse_lookup() {
        let catalog =
            StyleCatalog::new().with_override(BasemapStyle::Dark, "https://tiles.example/dark.json");

        assert_eq!(catalog.url(BasemapStyle::Dark), "https://tiles.example/dark.json");
        assert_eq!(
            catalog.url(BasemapStyle::Streets),
            "mapbox://styles/mapbox/streets-v11"
        );
        assert_eq!(
            catalog.style_for_url("https://tiles.example/dark.json"),
            Some(BasemapStyle::Dark)
        );
        assert_eq!(catalog.style_for_url("mapbox://styles/mapbox/dark-v10"), None);
    }
}
