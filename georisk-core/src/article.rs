//! Article input submitted for classification

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::text::{collapse_whitespace, truncate_chars};

/// A short text to classify, as supplied by the surrounding collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleInput {
    /// Headline
    pub title: String,
    /// Body text (may be empty)
    #[serde(default)]
    pub content: String,
    /// Country the article is about, free-form
    #[serde(default)]
    pub country: Option<String>,
    /// Preferred language for the reasoning text
    #[serde(default)]
    pub language: Option<String>,
}

impl ArticleInput {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Country with blank values treated as absent
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Language with blank values treated as absent
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Title and content joined for analysis
    pub fn full_text(&self) -> String {
        let title = self.title.trim();
        let content = self.content.trim();
        match (title.is_empty(), content.is_empty()) {
            (false, false) => format!("{}. {}", title, content),
            (false, true) => title.to_string(),
            (true, false) => content.to_string(),
            (true, true) => String::new(),
        }
    }

    /// Content with whitespace collapsed and cut to `budget` characters
    pub fn prompt_content(&self, budget: usize) -> String {
        let collapsed = collapse_whitespace(&self.content);
        truncate_chars(&collapsed, budget).to_string()
    }

    /// Stable 16-hex-char key over the normalized article fields
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.title.trim(),
            self.content.trim(),
            self.country().unwrap_or_default(),
            self.language().unwrap_or_default(),
        ] {
            hasher.update(collapse_whitespace(part).to_lowercase().as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_text_with_empty_content() {
        let article = ArticleInput::new("Economic summit opens in Geneva", "");
        assert_eq!(article.full_text(), "Economic summit opens in Geneva");
    }

    #[test]
    fn test_blank_country_is_absent() {
        let article = ArticleInput::new("t", "c").with_country("   ");
        assert_eq!(article.country(), None);
    }

    #[test]
    fn test_prompt_content_is_bounded() {
        let long = "word ".repeat(1000);
        let article = ArticleInput::new("t", &long);
        let prompt = article.prompt_content(800);
        assert_eq!(prompt.chars().count(), 800);
        assert_eq!(prompt, article.prompt_content(800));
    }

    #[test]
    fn test_fingerprint_ignores_case_and_spacing() {
        let a = ArticleInput::new("Border  Clash", "Troops moved").with_country("Mali");
        let b = ArticleInput::new("border clash", "troops   moved").with_country(" mali ");
        let c = ArticleInput::new("border clash", "troops moved");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
