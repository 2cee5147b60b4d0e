//! Classification prompt
//!
//! The template is an embedded TOML document rendered once per analysis, so
//! every provider in the chain sees exactly the same text.

use regex::{Captures, Regex};
use serde::Deserialize;
use std::sync::LazyLock;
use thiserror::Error;

use georisk_core::text::collapse_whitespace;
use georisk_core::ArticleInput;

const EMBEDDED_TEMPLATE: &str = include_str!("../prompts/classifier.toml");

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(title|content|country|language_hint)\}").unwrap()
});

#[derive(Debug, Error)]
#[error("Invalid prompt template: {0}")]
pub struct PromptError(#[from] toml::de::Error);

#[derive(Debug, Clone, Deserialize)]
struct PromptFile {
    prompt: PromptTemplate,
}

/// System and user templates with `{placeholder}` slots
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    #[serde(default)]
    pub version: u32,
    pub system: String,
    pub user: String,
    pub language_hint: String,
}

/// A rendered prompt, ready for `LlmBackend::generate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    /// The built-in classifier template
    pub fn embedded() -> Result<Self, PromptError> {
        Self::from_toml_str(EMBEDDED_TEMPLATE)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PromptError> {
        Ok(toml::from_str::<PromptFile>(text)?.prompt)
    }

    /// Render for one article with content cut to `budget` characters
    pub fn render(&self, article: &ArticleInput, budget: usize) -> Prompt {
        let language_hint = article
            .language()
            .map(|language| self.language_hint.replace("{language}", language))
            .unwrap_or_default();

        let title = collapse_whitespace(&article.title);
        let content = article.prompt_content(budget);
        let country = article.country().unwrap_or("unspecified");

        // One pass, so placeholders inside article text stay literal
        let user = PLACEHOLDER_REGEX.replace_all(&self.user, |caps: &Captures<'_>| match &caps[1] {
            "title" => title.clone(),
            "content" => content.clone(),
            "country" => country.to_string(),
            _ => language_hint.clone(),
        });

        Prompt {
            system: self.system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_template_loads() {
        let template = PromptTemplate::embedded().unwrap();
        assert_eq!(template.id, "risk_classifier");
        assert!(template.system.contains("JSON only"));
    }

    #[test]
    fn test_render_truncates_content() {
        let template = PromptTemplate::embedded().unwrap();
        let article = ArticleInput::new("Border clashes", &"é".repeat(2000)).with_country("Sudan");
        let prompt = template.render(&article, 800);

        assert!(prompt.user.contains("Title: Border clashes"));
        assert!(prompt.user.contains("Country: Sudan"));
        assert!(prompt.user.contains(&"é".repeat(800)));
        assert!(!prompt.user.contains(&"é".repeat(801)));
    }

    #[test]
    fn test_language_hint() {
        let template = PromptTemplate::embedded().unwrap();
        let article = ArticleInput::new("Cumbre económica", "").with_language("Spanish");
        assert!(template.render(&article, 800).user.contains("Write the reasoning in Spanish"));

        let plain = template.render(&ArticleInput::new("Summit", ""), 800);
        assert!(!plain.user.contains("Write the reasoning"));
        assert!(plain.user.contains("Country: unspecified"));
    }

    #[test]
    fn test_render_is_identical_across_calls() {
        let template = PromptTemplate::embedded().unwrap();
        let article = ArticleInput::new("A  title\n", "some   content");
        assert_eq!(template.render(&article, 800), template.render(&article, 800));
    }

    #[test]
    fn test_article_text_is_not_expanded() {
        let template = PromptTemplate::embedded().unwrap();
        let article = ArticleInput::new("Report {content}", "SECRET BODY mentions {country} and {title}")
            .with_country("Mali")
            .with_language("{content}");
        let prompt = template.render(&article, 800);

        assert!(prompt.user.contains("Title: Report {content}"));
        assert!(prompt.user.contains("SECRET BODY mentions {country} and {title}"));
        assert!(prompt.user.contains("Country: Mali"));
        assert!(prompt.user.contains("Write the reasoning in {content}."));
        assert_eq!(prompt.user.matches("SECRET BODY").count(), 1);
    }
}
