use serde_json::{json, Value};

use crate::model::{RecipeDocument, RecipeLine};

pub const INGREDIENTS_HEADING: &str = "Ingredients";
pub const DIRECTIONS_HEADING: &str = "Directions";

/// Page body block, in the order it is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Image { url: String },
    Heading { text: String },
    /// Section header inside a list, rendered as bold text
    BoldParagraph { text: String },
    BulletedItem { text: String },
    NumberedItem { text: String },
}

impl Block {
    pub fn to_json(&self) -> Value {
        match self {
            Block::Image { url } => json!({
                "object": "block",
                "type": "image",
                "image": {
                    "type": "external",
                    "external": { "url": url }
                }
            }),
            Block::Heading { text } => json!({
                "object": "block",
                "type": "heading_2",
                "heading_2": { "rich_text": [plain_text(text)] }
            }),
            Block::BoldParagraph { text } => json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{
                        "type": "text",
                        "text": { "content": text },
                        "annotations": { "bold": true }
                    }]
                }
            }),
            Block::BulletedItem { text } => json!({
                "object": "block",
                "type": "bulleted_list_item",
                "bulleted_list_item": { "rich_text": [plain_text(text)] }
            }),
            Block::NumberedItem { text } => json!({
                "object": "block",
                "type": "numbered_list_item",
                "numbered_list_item": { "rich_text": [plain_text(text)] }
            }),
        }
    }
}

fn plain_text(text: &str) -> Value {
    json!({ "type": "text", "text": { "content": text } })
}

/// Image, ingredients, then directions, mirroring the recipe's order
pub fn body_blocks(doc: &RecipeDocument) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(doc.ingredients.len() + doc.directions.len() + 3);

    if !doc.image_url.trim().is_empty() {
        blocks.push(Block::Image {
            url: doc.image_url.trim().to_string(),
        });
    }

    blocks.push(Block::Heading {
        text: INGREDIENTS_HEADING.to_string(),
    });
    blocks.extend(doc.ingredients.iter().map(|line| {
        list_block(line, |text| Block::BulletedItem { text })
    }));

    blocks.push(Block::Heading {
        text: DIRECTIONS_HEADING.to_string(),
    });
    blocks.extend(doc.directions.iter().map(|line| {
        list_block(line, |text| Block::NumberedItem { text })
    }));

    blocks
}

fn list_block(line: &RecipeLine, item: impl Fn(String) -> Block) -> Block {
    if line.is_header {
        Block::BoldParagraph {
            text: line.text.clone(),
        }
    } else {
        item(line.text.clone())
    }
}
