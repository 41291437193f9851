//! Structured queries over rendered markup.
//!
//! A thin layer over `scraper` so extraction code reads as "find all blocks,
//! take the n-th, read its text" without touching the DOM tree directly.
use lingua_common::{HarvestError, Result};
use scraper::{ElementRef, Html, Selector};

/// Parsed snapshot of one rendered page.
pub struct Markup {
    doc: Html,
}

impl Markup {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }

    /// Every match in document order.
    pub fn find_all(&self, selector: &Selector) -> Vec<ElementRef<'_>> {
        self.doc.select(selector).collect()
    }

    /// First match in document order.
    pub fn find(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.doc.select(selector).next()
    }
}

/// Matches below `parent`, in document order.
pub fn find_all_in<'a>(parent: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    parent.select(selector).collect()
}

/// Direct element children of `parent`; text and comment nodes are skipped.
pub fn children_of(parent: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    parent.children().filter_map(ElementRef::wrap).collect()
}

/// Concatenated text of the element and all its descendants.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Compile a CSS selector, naming the layout field on failure.
pub fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| HarvestError::Config(format!("{field} selector `{css}`: {e:?}")))
}
