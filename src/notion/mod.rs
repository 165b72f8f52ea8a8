//! Destination database: schema introspection, record mapping and creation.

mod blocks;
mod client;
mod importer;
mod schema;

pub use blocks::{body_blocks, Block, DIRECTIONS_HEADING, INGREDIENTS_HEADING};
pub use client::{format_database_id, CreatedPage, NotionClient};
pub use importer::{build_page, ImportResult, NotionImporter, PageDraft, UNTITLED_RECIPE};
pub use schema::{
    property_value, DatabaseSchema, FieldMapping, FieldValue, NameRule, PropertySchema,
    PropertyType, RecipeField, CATEGORY_NAME_RULES, OPTIONAL_FIELDS,
};
