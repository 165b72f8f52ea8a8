mod cache;
mod resolve;

pub use cache::{CategoryOptions, CategorySource, CuisineCache, DEFAULT_CACHE_TTL};
pub use resolve::resolve_category;

/// Used when the destination database offers no category options
pub const DEFAULT_CUISINES: [&str; 16] = [
    "Chinese",
    "Mexican",
    "African",
    "Thai",
    "Korean",
    "Indian",
    "Filipino",
    "Mediterranean",
    "Caribbean",
    "Soups",
    "Brunch",
    "American",
    "Hawaiian",
    "South America",
    "Italian",
    "Japanese",
];

pub fn default_cuisines() -> Vec<String> {
    DEFAULT_CUISINES.iter().map(|c| c.to_string()).collect()
}

/// Drop blanks and case-insensitive duplicates, keeping first occurrences in order
pub fn dedup_options<I, S>(options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = std::collections::HashSet::new();
    options
        .into_iter()
        .map(Into::into)
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty() && seen.insert(option.to_lowercase()))
        .collect()
}
