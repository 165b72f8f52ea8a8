use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::categories::{resolve_category, CuisineCache};
use crate::error::ImportError;
use crate::model::RecipeDocument;
use crate::notion::blocks::body_blocks;
use crate::notion::{property_value, DatabaseSchema, NotionClient, OPTIONAL_FIELDS};
use crate::session::SessionToken;
use crate::store::StateStore;

pub const UNTITLED_RECIPE: &str = "Untitled Recipe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub remote_id: String,
    pub remote_url: String,
}

/// Record ready to be sent to `POST /v1/pages`
#[derive(Debug, Clone, PartialEq)]
pub struct PageDraft {
    pub properties: Map<String, Value>,
    pub children: Vec<Value>,
}

/// Map a recipe onto the live schema
///
/// `category` is the already resolved value; `remembered` is the category
/// property name found by an earlier refresh. Optional fields whose property
/// type does not fit are skipped.
pub fn build_page(
    doc: &RecipeDocument,
    schema: &DatabaseSchema,
    category: Option<&str>,
    remembered: Option<&str>,
) -> Result<PageDraft, ImportError> {
    let title = schema
        .title_property()
        .ok_or(ImportError::NoTitleProperty)?;
    debug!("Using '{}' as title property", title.name);

    let name = match doc.name.trim() {
        "" => UNTITLED_RECIPE,
        name => name,
    };

    let mut properties = Map::new();
    properties.insert(
        title.name.clone(),
        json!({ "title": [{ "text": { "content": name } }] }),
    );

    for mapping in OPTIONAL_FIELDS {
        let Some(value) = mapping.field.value(doc) else {
            continue;
        };
        let Some(property) = schema.find_optional_property(mapping) else {
            debug!("No property for {:?} in database", mapping.field);
            continue;
        };
        match property_value(&property.kind, &value) {
            Some(shaped) => {
                debug!("Setting {:?} on '{}'", mapping.field, property.name);
                properties.insert(property.name.clone(), shaped);
            }
            None => debug!(
                "Skipping {:?}: property '{}' has incompatible type {:?}",
                mapping.field, property.name, property.kind
            ),
        }
    }

    if let Some(category) = category {
        match schema.category_property(remembered) {
            Some(property) => {
                debug!("Setting category '{}' on '{}'", category, property.name);
                properties.insert(
                    property.name.clone(),
                    json!({ "multi_select": [{ "name": category }] }),
                );
            }
            None => debug!("No multi_select property for category '{}'", category),
        }
    }

    let children = body_blocks(doc).iter().map(|block| block.to_json()).collect();

    Ok(PageDraft {
        properties,
        children,
    })
}

pub struct NotionImporter {
    client: Arc<NotionClient>,
    cache: Arc<CuisineCache>,
    store: Arc<StateStore>,
    allow_new_categories: bool,
}

impl NotionImporter {
    pub fn new(
        client: Arc<NotionClient>,
        cache: Arc<CuisineCache>,
        store: Arc<StateStore>,
        allow_new_categories: bool,
    ) -> Self {
        Self {
            client,
            cache,
            store,
            allow_new_categories,
        }
    }

    pub async fn import(
        &self,
        doc: &RecipeDocument,
        token: &SessionToken,
    ) -> Result<ImportResult, ImportError> {
        self.client.credentials()?;

        let schema = self.client.fetch_schema().await?;
        if schema.title_property().is_none() {
            return Err(ImportError::NoTitleProperty);
        }

        let options = match self.cache.get().await {
            Some(options) => options,
            None => self.cache.refresh(&schema).await,
        };
        let category = self.pick_category(&doc.cuisine, &options);
        let remembered = self.store.cuisine_property_name().await;

        let draft = build_page(doc, &schema, category.as_deref(), remembered.as_deref())?;

        token.check()?;
        let created = self
            .client
            .create_page(draft.properties, draft.children)
            .await?;
        token.check()?;

        info!("Recipe imported to Notion: {}", created.url);
        Ok(ImportResult {
            success: true,
            remote_id: created.id,
            remote_url: created.url,
        })
    }

    fn pick_category(&self, cuisine: &str, options: &[String]) -> Option<String> {
        let resolved = resolve_category(cuisine, options)?;
        let known = options.iter().any(|o| o.eq_ignore_ascii_case(&resolved));
        if !known && !self.allow_new_categories {
            info!("Skipping unknown category '{}'", resolved);
            return None;
        }
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::DEFAULT_CACHE_TTL;
    use crate::error::ErrorKind;
    use crate::model::RecipeLine;
    use mockito::{Matcher, Server};

    const DB_PATH: &str = "/v1/databases/db";

    fn tacos() -> RecipeDocument {
        RecipeDocument {
            name: "Tacos".to_string(),
            cuisine: "Mexican".to_string(),
            ingredients: vec![RecipeLine::item("tortillas")],
            directions: vec![RecipeLine::item("Warm tortillas")],
            url: "https://x.com/r".to_string(),
            ..Default::default()
        }
    }

    fn schema(properties: Value) -> DatabaseSchema {
        DatabaseSchema::from_json(&json!({ "properties": properties }))
    }

    #[test]
    fn test_build_page_maps_properties() {
        let schema = schema(json!({
            "Name": {"type": "title"},
            "Source": {"type": "url"},
            "Category": {"type": "multi_select"}
        }));

        let draft = build_page(&tacos(), &schema, Some("Mexican"), None).unwrap();
        assert_eq!(
            Value::Object(draft.properties),
            json!({
                "Name": {"title": [{"text": {"content": "Tacos"}}]},
                "Source": {"url": "https://x.com/r"},
                "Category": {"multi_select": [{"name": "Mexican"}]}
            })
        );
        assert_eq!(draft.children[0]["heading_2"]["rich_text"][0]["text"]["content"], "Ingredients");
    }

    #[test]
    fn test_build_page_skips_incompatible_and_missing() {
        let schema = schema(json!({
            "Recipe": {"type": "title"},
            "Link": {"type": "number"}
        }));
        let doc = RecipeDocument {
            name: "  ".to_string(),
            ..tacos()
        };

        let draft = build_page(&doc, &schema, Some("Mexican"), None).unwrap();
        assert_eq!(draft.properties.len(), 1);
        assert_eq!(
            draft.properties["Recipe"]["title"][0]["text"]["content"],
            UNTITLED_RECIPE
        );
    }

    #[test]
    fn test_build_page_requires_title() {
        let schema = schema(json!({"Notes": {"type": "rich_text"}}));
        let err = build_page(&tacos(), &schema, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTitleProperty);
    }

    fn importer(server: &Server, allow_new: bool) -> (NotionImporter, Arc<CuisineCache>) {
        let store = Arc::new(StateStore::in_memory());
        let cache = Arc::new(CuisineCache::new(store.clone(), DEFAULT_CACHE_TTL));
        let client = Arc::new(NotionClient::with_base_url(
            Some("secret".to_string()),
            Some("db".to_string()),
            server.url(),
        ));
        (
            NotionImporter::new(client, cache.clone(), store, allow_new),
            cache,
        )
    }

    async fn mock_schema(server: &mut Server) -> mockito::Mock {
        server
            .mock("GET", DB_PATH)
            .with_status(200)
            .with_body(
                r#"{"properties": {
                    "Name": {"type": "title", "title": {}},
                    "Category": {"type": "multi_select", "multi_select": {"options": [{"name": "Mexican"}, {"name": "Thai"}]}}
                }}"#,
            )
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_import_creates_page() {
        let mut server = Server::new_async().await;
        let _schema = mock_schema(&mut server).await;
        let create = server
            .mock("POST", "/v1/pages")
            .match_body(Matcher::PartialJson(json!({
                "properties": {"Category": {"multi_select": [{"name": "Mexican"}]}}
            })))
            .with_status(200)
            .with_body(r#"{"id": "p1", "url": "https://www.notion.so/p1"}"#)
            .create_async()
            .await;

        let (importer, cache) = importer(&server, true);
        let doc = RecipeDocument {
            cuisine: "mexican food".to_string(),
            ..tacos()
        };
        let result = importer.import(&doc, &SessionToken::new()).await.unwrap();

        assert_eq!(
            result,
            ImportResult {
                success: true,
                remote_id: "p1".to_string(),
                remote_url: "https://www.notion.so/p1".to_string()
            }
        );
        // Empty cache was filled from the fetched schema
        assert_eq!(cache.get().await, Some(vec!["Mexican".to_string(), "Thai".to_string()]));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancelled_import_never_writes() {
        let mut server = Server::new_async().await;
        let _schema = mock_schema(&mut server).await;
        let create = server
            .mock("POST", "/v1/pages")
            .expect(0)
            .create_async()
            .await;

        let (importer, _) = importer(&server, true);
        let token = SessionToken::new();
        token.cancel();

        let err = importer.import(&tacos(), &token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_remote_rejection_is_terminal() {
        let mut server = Server::new_async().await;
        let _schema = mock_schema(&mut server).await;
        let create = server
            .mock("POST", "/v1/pages")
            .with_status(400)
            .with_body(r#"{"object": "error", "message": "body failed validation"}"#)
            .expect(1)
            .create_async()
            .await;

        let (importer, _) = importer(&server, true);
        let err = importer.import(&tacos(), &SessionToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected(400));
        assert!(err.to_string().contains("body failed validation"));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_category_skipped_when_new_values_disallowed() {
        let server = Server::new_async().await;
        let (importer, _) = importer(&server, false);
        let options = vec!["Thai".to_string()];

        assert_eq!(importer.pick_category("Klingon", &options), None);
        assert_eq!(importer.pick_category("thai", &options), Some("Thai".to_string()));
    }
}
