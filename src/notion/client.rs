use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::categories::{CategoryOptions, CategorySource};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::notion::DatabaseSchema;

static UNHYPHENATED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)([0-9a-f]{8})([0-9a-f]{4})([0-9a-f]{4})([0-9a-f]{4})([0-9a-f]{12})$")
        .unwrap()
});

/// Format a 32-hex-digit database id as a hyphenated UUID; other ids pass through
pub fn format_database_id(id: &str) -> String {
    let id = id.trim();
    if id.contains('-') {
        return id.to_string();
    }
    UNHYPHENATED_ID
        .replace(id, "$1-$2-$3-$4-$5")
        .into_owned()
}

/// Page created by [`NotionClient::create_page`]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedPage {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

pub struct NotionClient {
    client: Client,
    base_url: String,
    version: String,
    token: Option<String>,
    database_id: Option<String>,
}

impl NotionClient {
    /// Create a client from configuration; credentials are checked per call
    pub fn new(config: &ImportConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        NotionClient {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: config.notion.base_url.trim_end_matches('/').to_string(),
            version: config.notion.version.clone(),
            token: config.notion_token(),
            database_id: config.notion_database_id(),
        }
    }

    #[doc(hidden)]
    pub fn with_base_url(
        token: Option<String>,
        database_id: Option<String>,
        base_url: String,
    ) -> Self {
        NotionClient {
            client: Client::new(),
            base_url,
            version: "2022-06-28".to_string(),
            token,
            database_id,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_ok()
    }

    /// Token and formatted database id, or `CredentialMissing`
    pub fn credentials(&self) -> Result<(&str, String), ImportError> {
        match (self.token.as_deref(), self.database_id.as_deref()) {
            (Some(token), Some(id)) => Ok((token, format_database_id(id))),
            _ => Err(ImportError::CredentialMissing),
        }
    }

    /// GET /v1/databases/{id}
    pub async fn fetch_schema(&self) -> Result<DatabaseSchema, ImportError> {
        let (token, database_id) = self.credentials()?;

        let response = self
            .client
            .get(format!("{}/v1/databases/{}", self.base_url, database_id))
            .bearer_auth(token)
            .header("Notion-Version", &self.version)
            .send()
            .await?;

        let body: Value = ok_json(response).await?;
        let schema = DatabaseSchema::from_json(&body);
        debug!(
            "Available properties in Notion database: {:?}",
            schema.property_names()
        );
        Ok(schema)
    }

    /// POST /v1/pages with the database as parent
    pub async fn create_page(
        &self,
        properties: Map<String, Value>,
        children: Vec<Value>,
    ) -> Result<CreatedPage, ImportError> {
        let (token, database_id) = self.credentials()?;

        let response = self
            .client
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(token)
            .header("Notion-Version", &self.version)
            .json(&json!({
                "parent": { "database_id": database_id },
                "properties": properties,
                "children": children
            }))
            .send()
            .await?;

        let body: Value = ok_json(response).await?;
        debug!("Created page in Notion: {}", body);
        serde_json::from_value(body).map_err(|e| ImportError::RemoteRejected {
            status: 200,
            message: format!("unexpected page response: {}", e),
        })
    }

    /// Verify the token can read the database
    pub async fn check_connection(&self) -> Result<(), ImportError> {
        match self.fetch_schema().await {
            Err(ImportError::RemoteRejected { status, message })
                if message.contains("not find database") =>
            {
                Err(ImportError::RemoteRejected {
                    status,
                    message: format!(
                        "{}. Make sure you've shared the database with your integration in Notion.",
                        message
                    ),
                })
            }
            other => other.map(|_| ()),
        }
    }
}

/// Decode a success body, or turn the status and Notion's error message
/// into `RemoteRejected`
async fn ok_json(response: Response) -> Result<Value, ImportError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(ImportError::RemoteRejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ImportError::RemoteRejected {
        status: status.as_u16(),
        message: format!("invalid JSON body: {}", e),
    })
}

#[async_trait]
impl CategorySource for NotionClient {
    async fn fetch_category_options(&self) -> Result<CategoryOptions, ImportError> {
        Ok(self.fetch_schema().await?.category_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::{Matcher, Server};

    const DB_ID: &str = "0123456789abcdef0123456789abcdef";
    const DB_PATH: &str = "/v1/databases/01234567-89ab-cdef-0123-456789abcdef";

    fn client(server: &Server) -> NotionClient {
        NotionClient::with_base_url(
            Some("secret".to_string()),
            Some(DB_ID.to_string()),
            server.url(),
        )
    }

    #[test]
    fn test_format_database_id() {
        assert_eq!(
            format_database_id(DB_ID),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
        assert_eq!(format_database_id("already-hyphenated"), "already-hyphenated");
        assert_eq!(format_database_id("short"), "short");
    }

    #[tokio::test]
    async fn test_fetch_schema() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", DB_PATH)
            .match_header("authorization", "Bearer secret")
            .match_header("notion-version", "2022-06-28")
            .with_status(200)
            .with_body(
                r#"{"object": "database", "properties": {
                    "Name": {"type": "title", "title": {}},
                    "Cuisine": {"type": "multi_select", "multi_select": {"options": [{"name": "Thai"}]}}
                }}"#,
            )
            .create_async()
            .await;

        let schema = client(&server).fetch_schema().await.unwrap();
        assert_eq!(schema.property_names(), vec!["Name", "Cuisine"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = NotionClient::with_base_url(None, Some(DB_ID.to_string()), "http://unused".to_string());
        let err = client.fetch_schema().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialMissing);
        assert!(!client.has_credentials());
    }

    #[tokio::test]
    async fn test_create_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/pages")
            .match_body(Matcher::PartialJson(json!({
                "parent": {"database_id": "01234567-89ab-cdef-0123-456789abcdef"}
            })))
            .with_status(200)
            .with_body(r#"{"object": "page", "id": "page-1", "url": "https://www.notion.so/page-1"}"#)
            .create_async()
            .await;

        let created = client(&server)
            .create_page(Map::new(), Vec::new())
            .await
            .unwrap();
        assert_eq!(
            created,
            CreatedPage {
                id: "page-1".to_string(),
                url: "https://www.notion.so/page-1".to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_connection_adds_sharing_hint() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", DB_PATH)
            .with_status(404)
            .with_body(r#"{"object": "error", "status": 404, "code": "object_not_found", "message": "Could not find database with ID: 0123"}"#)
            .create_async()
            .await;

        let err = client(&server).check_connection().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected(404));
        assert!(err.to_string().contains("shared the database with your integration"));
    }
}
