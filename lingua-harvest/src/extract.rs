//! Detail page extraction.
//!
//! [`DetailExtractor`] turns one rendered teacher profile into a
//! [`TeacherRecord`]. Every field is looked up independently so a failure
//! report names all missing fields at once, but the result is all-or-nothing:
//! one missing block and no record is produced for the item.
use crate::markup::{Markup, children_of, compile, find_all_in, text_of};
use lingua_common::{HarvestError, Locator, Result, TeacherRecord};
use lingua_config::{DescriptionsLayout, DetailLayout, StatsLayout};
use regex::Regex;
use scraper::Selector;

pub struct DetailExtractor {
    rating: Selector,
    stats: Selector,
    stat_ordinals: StatsLayout,
    languages: Selector,
    language_tag: Selector,
    country: Selector,
    country_prefix: String,
    descriptions: Selector,
    description_ordinals: DescriptionsLayout,
    price: Selector,
    price_pattern: Regex,
    ready: Locator,
}

impl DetailExtractor {
    /// Compile every selector of `layout` up front so a bad layout fails the
    /// run before any page is visited.
    pub fn new(layout: &DetailLayout) -> Result<Self> {
        let price_pattern = Regex::new(&layout.price.pattern).map_err(|e| {
            HarvestError::Config(format!("price pattern `{}`: {e}", layout.price.pattern))
        })?;
        Ok(Self {
            rating: compile("rating", &layout.rating.selector)?,
            stats: compile("stats", &layout.stats.selector)?,
            stat_ordinals: layout.stats.clone(),
            languages: compile("languages.container", &layout.languages.container)?,
            language_tag: compile("languages.tag", &layout.languages.tag)?,
            country: compile("country", &layout.country.container)?,
            country_prefix: layout.country.prefix.clone(),
            descriptions: compile("descriptions", &layout.descriptions.selector)?,
            description_ordinals: layout.descriptions.clone(),
            price: compile("price", &layout.price.selector)?,
            price_pattern,
            ready: Locator::css(layout.rating.selector.clone()),
        })
    }

    /// Element whose presence means the detail view has rendered.
    pub fn ready_locator(&self) -> &Locator {
        &self.ready
    }

    pub fn extract(&self, html: &str) -> Result<TeacherRecord> {
        let doc = Markup::parse(html);
        let mut missing = Vec::new();

        let rating = present(&mut missing, "rating", self.rating(&doc));
        let stats = present(&mut missing, "stats", self.stats(&doc));
        let languages = present(&mut missing, "languages", self.languages(&doc));
        let country = present(&mut missing, "country", self.country(&doc));
        let descriptions = present(&mut missing, "descriptions", self.descriptions(&doc));
        let price = present(&mut missing, "price", self.price(&doc));

        match (rating, stats, languages, country, descriptions, price) {
            (
                Some(rating),
                Some((student_count, lesson_count, attendance)),
                Some(languages_taught),
                Some(country),
                Some((about, as_teacher, teaching_style)),
                Some(price),
            ) => Ok(TeacherRecord {
                rating,
                student_count,
                lesson_count,
                attendance: strip_unit(&attendance),
                price,
                about,
                as_teacher,
                teaching_style,
                languages_taught,
                country,
            }),
            _ => Err(HarvestError::NotFound(format!(
                "detail fields missing: {}",
                missing.join(", ")
            ))),
        }
    }

    // Rating is read as visible text, hence trimmed.
    fn rating(&self, doc: &Markup) -> Option<String> {
        doc.find(&self.rating)
            .map(|el| text_of(el).trim().to_string())
    }

    fn stats(&self, doc: &Markup) -> Option<(String, String, String)> {
        let blocks = doc.find_all(&self.stats);
        let nth = |i: usize| blocks.get(i).map(|el| text_of(*el));
        Some((
            nth(self.stat_ordinals.student_count)?,
            nth(self.stat_ordinals.lesson_count)?,
            nth(self.stat_ordinals.attendance)?,
        ))
    }

    fn languages(&self, doc: &Markup) -> Option<Vec<String>> {
        let container = doc.find(&self.languages)?;
        Some(
            find_all_in(container, &self.language_tag)
                .into_iter()
                .map(text_of)
                .collect(),
        )
    }

    fn country(&self, doc: &Markup) -> Option<String> {
        let container = doc.find(&self.country)?;
        let first = children_of(container).into_iter().next()?;
        Some(strip_country_prefix(&text_of(first), &self.country_prefix))
    }

    fn descriptions(&self, doc: &Markup) -> Option<(String, String, String)> {
        let blocks = doc.find_all(&self.descriptions);
        let nth = |i: usize| blocks.get(i).map(|el| text_of(*el));
        let layout = &self.description_ordinals;
        Some((
            nth(layout.about)?,
            nth(layout.as_teacher)?,
            nth(layout.teaching_style)?,
        ))
    }

    /// `Some(None)`: the price block exists but holds no decimal token.
    fn price(&self, doc: &Markup) -> Option<Option<String>> {
        let block = doc.find(&self.price)?;
        Some(first_price(&text_of(block), &self.price_pattern))
    }
}

fn present<T>(missing: &mut Vec<&'static str>, field: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        missing.push(field);
    }
    value
}

/// Drop the trailing unit character (`"98%"` becomes `"98"`).
pub fn strip_unit(raw: &str) -> String {
    let mut chars = raw.chars();
    chars.next_back();
    chars.as_str().to_string()
}

/// First match of `pattern` in `text`, if any.
pub fn first_price(text: &str, pattern: &Regex) -> Option<String> {
    pattern.find(text).map(|m| m.as_str().to_string())
}

/// Remove `prefix` once from the start of `text`; other text is returned unchanged.
pub fn strip_country_prefix(text: &str, prefix: &str) -> String {
    text.strip_prefix(prefix).unwrap_or(text).to_string()
}
