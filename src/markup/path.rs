use scraper::{ElementRef, Selector};

use crate::{MarkupError, MarkupResult};

/// What a path reads from each matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// All descendant text, concatenated
    Text,
    /// The value of the named attribute
    Attr(String),
}

/// A compiled selector path: a CSS selector plus the value to read
#[derive(Debug, Clone)]
pub struct MarkupPath {
    source: String,
    selector: Selector,
    target: Target,
}

impl MarkupPath {
    /// Path reading the text of every element matching `css`
    pub fn text(css: &str) -> MarkupResult<Self> {
        Self::compile(css, Target::Text)
    }

    /// Path reading attribute `name` of every element matching `css`
    pub fn attr(css: &str, name: &str) -> MarkupResult<Self> {
        Self::compile(css, Target::Attr(name.to_string()))
    }

    fn compile(css: &str, target: Target) -> MarkupResult<Self> {
        let selector = Selector::parse(css).map_err(|e| MarkupError::InvalidSelector {
            selector: css.to_string(),
            message: format!("{:?}", e),
        })?;

        Ok(Self {
            source: css.to_string(),
            selector,
            target,
        })
    }

    /// The CSS source this path was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn selector(&self) -> &Selector {
        &self.selector
    }

    pub(crate) fn extract(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.target {
            Target::Text => Some(element.text().collect()),
            Target::Attr(name) => element.value().attr(name).map(str::to_string),
        }
    }
}
