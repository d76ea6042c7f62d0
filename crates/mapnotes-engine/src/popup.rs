//! HTML content for map popups.
//!
//! Popups are rendered from the clicked feature's properties, the same bag the
//! annotation source carries, so they always show what the map is showing.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::Feature;

/// Fields of an annotation feature shown in its popup.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSummary {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub area: f64,
    pub image_url: Option<String>,
}

impl AnnotationSummary {
    pub fn from_feature(feature: &Feature) -> Self {
        let created_at = feature
            .property_str("time")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));
        Self {
            name: feature.property_str("name").unwrap_or_default().to_string(),
            created_at,
            area: feature
                .properties
                .get("area")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            image_url: feature.property_str("imageUrl").map(str::to_string),
        }
    }

    /// Popup HTML with the creation time shown in `tz`.
    pub fn to_html<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let name = encode_text(&self.name);
        let created = match self.created_at {
            Some(t) => t.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "unknown".to_string(),
        };

        let mut html = format!(
            "<div class=\"popup\">\n\
             <h3>{name}</h3>\n\
             <p>Created: {created}</p>\n\
             <p>Area: {:.2} sq. meters</p>\n",
            self.area
        );
        if let Some(url) = &self.image_url {
            html.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">\n",
                encode_double_quoted_attribute(url),
                encode_double_quoted_attribute(&self.name)
            ));
        }
        html.push_str("</div>");
        html
    }
}

/// Popup for a point in a category layer.
pub fn category_popup(feature: &Feature, label: &str) -> String {
    let name = feature.property_str("name").unwrap_or_default();
    format!(
        "<h3>{}</h3><p>{}</p>",
        encode_text(name),
        encode_text(label)
    )
}
