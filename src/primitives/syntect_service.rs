//! Default highlighting service backed by syntect
//!
//! Syntax definitions and themes are loaded once per process, on first use,
//! and shared by every service instance.

use crate::primitives::highlight_cache::{HighlightService, Theme};
use crate::primitives::language::Language;
use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_nonewlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// syntect theme used for light mode
pub const LIGHT_THEME: &str = "InspiredGitHub";
/// syntect theme used for dark mode
pub const DARK_THEME: &str = "base16-ocean.dark";

/// Highlights single lines into inline-styled HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntectHighlightService;

impl SyntectHighlightService {
    pub fn new() -> Self {
        Self
    }

    /// Find the syntax for a language id or a raw syntect token
    fn syntax(language: &str) -> Option<&'static SyntaxReference> {
        let syntax_set = &*SYNTAX_SET;
        Language::from_id(language)
            .and_then(|l| syntax_set.find_syntax_by_extension(l.extension()))
            .or_else(|| syntax_set.find_syntax_by_token(language))
    }

    fn theme(theme: Theme) -> anyhow::Result<&'static SyntectTheme> {
        let name = match theme {
            Theme::Light => LIGHT_THEME,
            Theme::Dark => DARK_THEME,
        };
        THEME_SET
            .themes
            .get(name)
            .with_context(|| format!("theme {name} is not bundled"))
    }

    /// Highlight one line synchronously
    pub fn highlight(&self, text: &str, language: &str, theme: Theme) -> anyhow::Result<String> {
        let syntax =
            Self::syntax(language).with_context(|| format!("no syntax for {language}"))?;
        let mut highlighter = HighlightLines::new(syntax, Self::theme(theme)?);
        let regions = highlighter
            .highlight_line(text, &SYNTAX_SET)
            .context("syntect failed to parse line")?;
        let html = styled_line_to_highlighted_html(&regions[..], IncludeBackground::No)
            .context("syntect failed to render line")?;
        Ok(html)
    }
}

#[async_trait]
impl HighlightService for SyntectHighlightService {
    async fn highlight_line(
        &self,
        text: &str,
        language: &str,
        theme: Theme,
    ) -> anyhow::Result<String> {
        self.highlight(text, language, theme)
    }
}

/// Languages with a bundled syntax definition
pub fn supported_languages() -> Vec<Language> {
    Language::all()
        .iter()
        .copied()
        .filter(|l| SyntectHighlightService::syntax(l.id()).is_some())
        .collect()
}
