use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on the simplified content, in characters
pub const MAX_CONTENT_CHARS: usize = 100_000;

/// Whole blocks dropped before the page goes to the model
static NOISE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "nav", "header", "footer", "aside"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid block regex")
        })
        .collect()
});

static COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid regex"));

static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

static ALT_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\balt\s*=\s*["']([^"']*)["']"#).expect("valid regex"));

/// Reduce raw page markup to what the model needs
///
/// Removes script/style/comment/nav/header/footer/aside blocks, keeps only
/// `src` and `alt` on image tags, then truncates to [`MAX_CONTENT_CHARS`].
/// Everything else, prose and markup alike, passes through untouched, so
/// plain text input comes out unchanged apart from truncation.
pub fn simplify_html(html: &str) -> String {
    let mut simplified = COMMENTS.replace_all(html, "").into_owned();

    for block in NOISE_BLOCKS.iter() {
        simplified = block.replace_all(&simplified, "").into_owned();
    }

    simplified = IMG_TAG
        .replace_all(&simplified, |caps: &regex::Captures| collapse_img(&caps[0]))
        .into_owned();

    truncate_chars(simplified, MAX_CONTENT_CHARS)
}

fn collapse_img(tag: &str) -> String {
    let src = SRC_ATTR.captures(tag).map(|c| c[1].to_string());
    let alt = ALT_ATTR.captures(tag).map(|c| c[1].to_string());

    match (src, alt) {
        (Some(src), Some(alt)) => format!(r#"<img src="{}" alt="{}">"#, src, alt),
        (Some(src), None) => format!(r#"<img src="{}">"#, src),
        // Lazy-loaded images without src carry nothing useful
        (None, _) => String::new(),
    }
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_noise_blocks() {
        let html = r#"
            <html><head><style>body { color: red; }</style>
            <script type="text/javascript">console.log('</div>');</script></head>
            <body>
                <HEADER class="site">Logo</HEADER>
                <nav><a href="/">Home</a></nav>
                <h1>Tacos</h1>
                <!-- ad slot -->
                <aside>Related posts</aside>
                <p>Warm the tortillas.</p>
                <footer>Copyright</footer>
            </body></html>
        "#;

        let simplified = simplify_html(html);
        assert!(simplified.contains("<h1>Tacos</h1>"));
        assert!(simplified.contains("<p>Warm the tortillas.</p>"));
        for gone in ["console.log", "color: red", "Logo", "Home", "ad slot", "Related", "Copyright"] {
            assert!(!simplified.contains(gone), "{} should be stripped", gone);
        }
    }

    #[test]
    fn test_collapses_image_attributes() {
        let html = r#"<img class="hero" alt="Finished tacos" loading="lazy" src="https://img.example/tacos.jpg" width="600">"#;
        assert_eq!(
            simplify_html(html),
            r#"<img src="https://img.example/tacos.jpg" alt="Finished tacos">"#
        );

        let no_alt = r#"<img data-x="1" src='https://img.example/a.png'/>"#;
        assert_eq!(simplify_html(no_alt), r#"<img src="https://img.example/a.png">"#);
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = "Caption:\nLemon cake with 3 eggs";
        assert_eq!(simplify_html(text), text);
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_CONTENT_CHARS + 10);
        let simplified = simplify_html(&long);
        assert_eq!(simplified.chars().count(), MAX_CONTENT_CHARS);
    }
}
