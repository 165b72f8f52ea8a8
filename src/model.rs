use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw page content handed over by the scraping side
///
/// `html` may hold any text blob; alternate sources (video transcripts,
/// image posts) are rendered into it with [`ScrapedPage::from_video`] and
/// [`ScrapedPage::from_image_post`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub html: String,
}

impl ScrapedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Build a page from a video: title, description, transcript and thumbnail
    pub fn from_video(
        url: impl Into<String>,
        title: &str,
        description: &str,
        transcript: &str,
        thumbnail_url: Option<&str>,
    ) -> Self {
        let mut sections = vec![("Video Title", title), ("Description", description)];
        if let Some(thumbnail) = thumbnail_url {
            sections.push(("Thumbnail", thumbnail));
        }
        sections.push(("Transcript", transcript));
        Self::new(url, labelled_sections(&sections))
    }

    /// Build a page from an image post: caption plus the post image
    pub fn from_image_post(url: impl Into<String>, caption: &str, image_url: Option<&str>) -> Self {
        let mut sections = vec![("Caption", caption)];
        if let Some(image) = image_url {
            sections.push(("Image", image));
        }
        Self::new(url, labelled_sections(&sections))
    }
}

fn labelled_sections(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{}:\n{}", label, value.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One ingredient or direction entry
///
/// Header entries mark sections such as "For the sauce:" and are kept in
/// place, never merged into content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeLine {
    pub text: String,
    #[serde(default)]
    pub is_header: bool,
}

impl RecipeLine {
    pub fn item(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_header: false,
        }
    }

    pub fn header(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_header: true,
        }
    }
}

/// Canonical structured recipe produced by extraction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDocument {
    pub name: String,
    /// Free text, not yet resolved against the category enumeration
    pub cuisine: String,
    pub image_url: String,
    pub ingredients: Vec<RecipeLine>,
    pub directions: Vec<RecipeLine>,
    pub url: String,
}

impl RecipeDocument {
    /// Normalize a parsed model answer into the canonical shape
    ///
    /// Accepts the legacy shapes too: `instructions` in place of
    /// `directions`, and plain string arrays instead of `{text, isHeader}`
    /// objects. Missing fields become empty. Never fails, and normalizing
    /// the JSON of an already-canonical document yields the same document.
    pub fn normalize(value: &Value) -> RecipeDocument {
        let empty = Map::new();
        let object = value.as_object().unwrap_or(&empty);

        let directions = match object.get("directions") {
            Some(d) if !is_empty_value(d) => d,
            _ => {
                if object.contains_key("instructions") {
                    debug!("Renaming legacy 'instructions' field to 'directions'");
                }
                object.get("instructions").unwrap_or(&Value::Null)
            }
        };

        RecipeDocument {
            name: string_field(object, "name"),
            cuisine: string_field(object, "cuisine"),
            image_url: string_field(object, "imageUrl"),
            ingredients: normalize_lines(object.get("ingredients").unwrap_or(&Value::Null)),
            directions: normalize_lines(directions),
            url: string_field(object, "url"),
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn normalize_lines(value: &Value) -> Vec<RecipeLine> {
    match value {
        Value::Array(items) => items.iter().filter_map(normalize_line).collect(),
        // A single block of text: one entry per non-empty line
        Value::String(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(RecipeLine::item)
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_line(value: &Value) -> Option<RecipeLine> {
    match value {
        Value::String(text) => Some(RecipeLine::item(text.as_str())),
        Value::Object(entry) => {
            // Header markers survive even without text
            let text = match entry.get("text") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let is_header = entry
                .get("isHeader")
                .or_else(|| entry.get("is_header"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(RecipeLine { text, is_header })
        }
        Value::Number(n) => Some(RecipeLine::item(n.to_string())),
        _ => None,
    }
}
