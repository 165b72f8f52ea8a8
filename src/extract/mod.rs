mod html;
mod parse;
mod prompt;

pub use html::{simplify_html, MAX_CONTENT_CHARS};
pub use parse::{
    parse_embedded_object, parse_fenced_block, parse_recipe_response, parse_whole_response,
    ParseStrategy, STRATEGIES,
};
pub use prompt::{build_extraction_prompt, EXTRACTION_PROMPT};

use std::sync::Arc;

use log::{info, warn};

use crate::categories::default_cuisines;
use crate::error::ExtractionError;
use crate::llm::{complete_with_retry, LlmProvider, RetryPolicy};
use crate::model::{RecipeDocument, ScrapedPage};
use crate::session::SessionToken;

/// Turns a scraped page into a [`RecipeDocument`] with one LLM call
pub struct TextExtractor {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl TextExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Extract a recipe from `page`
    ///
    /// `category_hints` biases the cuisine the model picks; the default
    /// cuisine list is used when it is empty.
    pub async fn extract(
        &self,
        page: &ScrapedPage,
        category_hints: &[String],
        token: &SessionToken,
    ) -> Result<RecipeDocument, ExtractionError> {
        info!("Extracting recipe from {}", page.url);

        let simplified = simplify_html(&page.html);
        let cuisines = if category_hints.is_empty() {
            default_cuisines()
        } else {
            category_hints.to_vec()
        };
        let prompt = build_extraction_prompt(&page.url, &simplified, &cuisines);

        let answer =
            complete_with_retry(self.provider.as_ref(), &prompt, &self.retry, token).await?;

        let mut recipe = parse_recipe_response(&answer).ok_or_else(|| {
            warn!("No recipe object found in model answer: {}", answer);
            ExtractionError::Unparseable
        })?;

        if recipe.url.is_empty() {
            recipe.url = page.url.clone();
        }

        info!(
            "Extracted '{}' with {} ingredients and {} directions",
            recipe.name,
            recipe.ingredients.len(),
            recipe.directions.len()
        );
        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedProvider {
        answer: Result<String, LlmError>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(answer: Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn provider_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone()
        }
    }

    fn page() -> ScrapedPage {
        ScrapedPage::new(
            "https://x.com/r",
            "<html><script>track()</script><h1>Tacos</h1></html>",
        )
    }

    #[tokio::test]
    async fn test_extract_uses_hints_and_backfills_url() {
        let provider = CannedProvider::new(Ok(
            r#"```json
{"name": "Tacos", "cuisine": "Mexican", "ingredients": ["tortillas"], "directions": ["Warm"], "url": ""}
```"#
                .to_string(),
        ));
        let extractor = TextExtractor::new(provider.clone(), RetryPolicy::default());

        let recipe = extractor
            .extract(
                &page(),
                &["Mexican".to_string(), "Thai".to_string()],
                &SessionToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(recipe.name, "Tacos");
        assert_eq!(recipe.url, "https://x.com/r");

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Mexican, Thai"));
        assert!(prompts[0].contains("<h1>Tacos</h1>"));
        assert!(!prompts[0].contains("track()"));
    }

    #[tokio::test]
    async fn test_extract_falls_back_to_default_cuisines() {
        let provider = CannedProvider::new(Ok(r#"{"name": "Tacos", "ingredients": []}"#.to_string()));
        let extractor = TextExtractor::new(provider.clone(), RetryPolicy::default());

        extractor
            .extract(&page(), &[], &SessionToken::new())
            .await
            .unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Chinese, Mexican, African"));
    }

    #[tokio::test]
    async fn test_unparseable_answer() {
        let provider = CannedProvider::new(Ok("Sorry, no recipe here.".to_string()));
        let extractor = TextExtractor::new(provider, RetryPolicy::default());

        let err = extractor
            .extract(&page(), &[], &SessionToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unparseable);
    }

    #[tokio::test]
    async fn test_missing_key_is_credential_error() {
        let provider = CannedProvider::new(Err(LlmError::MissingApiKey));
        let extractor = TextExtractor::new(provider, RetryPolicy::default());

        let err = extractor
            .extract(&page(), &[], &SessionToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialMissing);
    }
}
