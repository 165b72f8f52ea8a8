//! Live database schema and the lookup tables used to map a recipe onto it.
//!
//! Property names in user databases are arbitrary, so every mapping is
//! data: candidate-name lists and name rules below, plus one
//! type-compatibility function. New database shapes are handled by editing
//! these tables.

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use crate::categories::{CategoryOptions, CategorySource};
use crate::error::ImportError;
use crate::model::RecipeDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Url,
    MultiSelect,
    Other(String),
}

impl PropertyType {
    pub fn from_api(name: &str) -> Self {
        match name {
            "title" => PropertyType::Title,
            "rich_text" | "text" => PropertyType::RichText,
            "number" => PropertyType::Number,
            "url" => PropertyType::Url,
            "multi_select" => PropertyType::MultiSelect,
            other => PropertyType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    pub name: String,
    pub kind: PropertyType,
    /// Option names, for multi_select properties
    pub options: Vec<String>,
}

/// Snapshot of `{property name -> type}` in the order the API returned it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub properties: Vec<PropertySchema>,
}

/// How a property name is compared against a hint (always lowercased)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    Exact(&'static str),
    Contains(&'static str),
}

impl NameRule {
    pub fn matches(self, property_name: &str) -> bool {
        let name = property_name.trim().to_lowercase();
        match self {
            NameRule::Exact(hint) => name == hint,
            NameRule::Contains(hint) => name.contains(hint),
        }
    }
}

/// Names that mark a multi_select property as the category property
pub const CATEGORY_NAME_RULES: &[NameRule] = &[
    NameRule::Exact("cuisine"),
    NameRule::Contains("cuisine"),
    NameRule::Contains("category"),
    NameRule::Exact("type"),
];

/// Recipe fields that may be copied into optional properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeField {
    Url,
}

/// A recipe field value before it is shaped for a property type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Url(String),
    Number(f64),
}

impl RecipeField {
    pub fn value(self, doc: &RecipeDocument) -> Option<FieldValue> {
        match self {
            RecipeField::Url => {
                Some(doc.url.trim()).filter(|u| !u.is_empty()).map(|u| FieldValue::Url(u.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: RecipeField,
    /// Lowercased property names accepted for this field
    pub candidates: &'static [&'static str],
}

pub const OPTIONAL_FIELDS: &[FieldMapping] = &[FieldMapping {
    field: RecipeField::Url,
    candidates: &["url", "source", "website", "link", "recipe url", "source url"],
}];

/// Shape `value` for a property of type `kind`, or `None` when they are
/// incompatible; values are never coerced across types
pub fn property_value(kind: &PropertyType, value: &FieldValue) -> Option<Value> {
    match (kind, value) {
        (PropertyType::Number, FieldValue::Number(n)) => Some(json!({ "number": n })),
        (PropertyType::Url, FieldValue::Url(url)) => Some(json!({ "url": url })),
        (PropertyType::RichText, FieldValue::Text(text) | FieldValue::Url(text)) => {
            Some(json!({ "rich_text": [{ "text": { "content": text } }] }))
        }
        (PropertyType::RichText, FieldValue::Number(n)) => {
            Some(json!({ "rich_text": [{ "text": { "content": n.to_string() } }] }))
        }
        _ => None,
    }
}

impl DatabaseSchema {
    /// Read the `properties` object of a database response
    pub fn from_json(database: &Value) -> Self {
        let properties = database["properties"]
            .as_object()
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| {
                        let kind = PropertyType::from_api(prop["type"].as_str().unwrap_or(""));
                        let options = prop["multi_select"]["options"]
                            .as_array()
                            .map(|opts| {
                                opts.iter()
                                    .filter_map(|o| o["name"].as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        PropertySchema {
                            name: name.clone(),
                            kind,
                            options,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        DatabaseSchema { properties }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn title_property(&self) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.kind == PropertyType::Title)
    }

    /// First property whose lowercased name is one of the mapping's candidates
    pub fn find_optional_property(&self, mapping: &FieldMapping) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| {
            let name = p.name.trim().to_lowercase();
            mapping.candidates.contains(&name.as_str())
        })
    }

    fn multi_selects(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties
            .iter()
            .filter(|p| p.kind == PropertyType::MultiSelect)
    }

    fn named_category_property(&self) -> Option<&PropertySchema> {
        self.multi_selects()
            .find(|p| CATEGORY_NAME_RULES.iter().any(|rule| rule.matches(&p.name)))
    }

    /// Property that receives the category value
    ///
    /// Prefers the remembered property if it still is a multi_select, then a
    /// category-like name, then any multi_select.
    pub fn category_property(&self, remembered: Option<&str>) -> Option<&PropertySchema> {
        remembered
            .and_then(|name| self.get(name))
            .filter(|p| p.kind == PropertyType::MultiSelect)
            .or_else(|| self.named_category_property())
            .or_else(|| self.multi_selects().next())
    }

    /// Options of the category-like property, else of the first multi_select
    /// that has any
    pub fn category_options(&self) -> CategoryOptions {
        let named = self.named_category_property();

        if let Some(property) = named.filter(|p| !p.options.is_empty()) {
            debug!(
                "Found {} category options in '{}'",
                property.options.len(),
                property.name
            );
            return CategoryOptions {
                options: property.options.clone(),
                property_name: Some(property.name.clone()),
            };
        }

        if let Some(property) = self.multi_selects().find(|p| !p.options.is_empty()) {
            debug!("No category property found, using options of '{}'", property.name);
            return CategoryOptions {
                options: property.options.clone(),
                property_name: Some(property.name.clone()),
            };
        }

        CategoryOptions {
            options: Vec::new(),
            property_name: named.map(|p| p.name.clone()),
        }
    }
}

#[async_trait]
impl CategorySource for DatabaseSchema {
    async fn fetch_category_options(&self) -> Result<CategoryOptions, ImportError> {
        Ok(self.category_options())
    }
}
