/// The extraction prompt template.
///
/// Loaded from `prompt.txt` at compile time. Contains `{{CUISINES}}`,
/// `{{URL}}` and `{{CONTENT}}` placeholders filled by [`build_extraction_prompt`].
pub const EXTRACTION_PROMPT: &str = include_str!("prompt.txt");

/// Fill the template with the category enumeration, source URL and content
///
/// Content is substituted last so placeholder-like text inside a page is
/// never expanded.
pub fn build_extraction_prompt(url: &str, content: &str, cuisines: &[String]) -> String {
    EXTRACTION_PROMPT
        .replace("{{CUISINES}}", &cuisines.join(", "))
        .replace("{{URL}}", url)
        .replace("{{CONTENT}}", content)
}
