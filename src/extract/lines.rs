//! Line-cursor scanning for listing pages that only render flat text.
//!
//! Some listing pages carry no useful markup: the only structure is the
//! visual order of text lines, with date headings followed by runs of
//! title / time / price lines. The scanner walks the lines once, keeping
//! the most recent date heading in a [`DateCursor`] and grouping the lines
//! after each known title into an [`EventBlock`].

use chrono::NaiveDateTime;
use scraper::Html;

use super::normalize_space;

/// Tracks the date heading currently in effect while scanning lines.
///
/// Entries between headings inherit the last heading seen; before any
/// heading the cursor is empty and blocks carry no date.
#[derive(Debug, Default)]
pub struct DateCursor {
    current: Option<NaiveDateTime>,
}

impl DateCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A date heading line was seen; it governs until the next heading.
    pub fn observe(&mut self, day: NaiveDateTime) {
        self.current = Some(day);
    }

    pub fn current(&self) -> Option<NaiveDateTime> {
        self.current
    }
}

/// One title and its trailing detail lines, as grouped by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBlock {
    /// Date heading in effect when the title line was seen.
    pub date: Option<NaiveDateTime>,
    pub title: String,
    /// First line that was neither a time nor a price.
    pub description: Option<String>,
    /// First time-looking line.
    pub time_line: Option<String>,
    /// First price-looking line.
    pub price_line: Option<String>,
}

/// Line classifiers for one source's flat-text layout.
pub struct LineScanner<'a> {
    /// Recognizes date heading lines and resolves them to a day.
    pub parse_heading: &'a dyn Fn(&str) -> Option<NaiveDateTime>,
    /// Recognizes lines that are known event titles.
    pub is_title: &'a dyn Fn(&str) -> bool,
    pub is_time: &'a dyn Fn(&str) -> bool,
    pub is_price: &'a dyn Fn(&str) -> bool,
}

impl LineScanner<'_> {
    /// Group lines into event blocks.
    ///
    /// A block opens at a title line and closes at the next heading or
    /// title. Within a block the first time line, first price line, and
    /// first remaining line (the description) are kept.
    pub fn scan(&self, lines: &[String]) -> Vec<EventBlock> {
        let mut cursor = DateCursor::new();
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            if let Some(day) = (self.parse_heading)(line) {
                cursor.observe(day);
                i += 1;
                continue;
            }
            if !(self.is_title)(line) {
                i += 1;
                continue;
            }

            let mut block = EventBlock {
                date: cursor.current(),
                title: line.clone(),
                description: None,
                time_line: None,
                price_line: None,
            };
            let mut j = i + 1;
            while j < lines.len() {
                let next = &lines[j];
                if (self.parse_heading)(next).is_some() || (self.is_title)(next) {
                    break;
                }
                if (self.is_time)(next) {
                    if block.time_line.is_none() {
                        block.time_line = Some(next.clone());
                    }
                } else if (self.is_price)(next) {
                    if block.price_line.is_none() {
                        block.price_line = Some(next.clone());
                    }
                } else if block.description.is_none() {
                    block.description = Some(next.clone());
                }
                j += 1;
            }
            blocks.push(block);
            i = j;
        }
        blocks
    }
}

/// Flatten a parsed document to normalized, non-empty text lines in
/// document order.
pub fn text_lines(html: &Html) -> Vec<String> {
    html.root_element()
        .text()
        .flat_map(|chunk| chunk.lines())
        .map(normalize_space)
        .filter(|line| !line.is_empty())
        .collect()
}
