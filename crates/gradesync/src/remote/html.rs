//! Scraping of the gradebook setup page into `ObservedEntity` rows.
//!
//! The page is a table with one `<tr>` per category or item. Categories carry
//! `data-category`, items carry `id="grade-item-ig<N>"`, and both carry
//! `data-parent-category`. Rows that cannot be identified are skipped.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::tree::{EntityKind, ObservedEntity, RemoteId};

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

static ROWTITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.rowtitle").unwrap());

static ITEMHEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.gradeitemheader").unwrap());

/// A scraped row before depths are filled in.
#[derive(Debug)]
struct RawRow {
    id: RemoteId,
    name: String,
    parent: Option<RemoteId>,
    level: Option<u32>,
}

/// Parses the gradebook setup page.
pub fn parse_tree(html: &str) -> Vec<ObservedEntity> {
    let document = Html::parse_document(html);
    let rows: Vec<RawRow> = document.select(&ROW).filter_map(parse_row).collect();
    fill_depths(rows)
}

fn parse_row(row: ElementRef<'_>) -> Option<RawRow> {
    let element = row.value();
    let id = if has_class(row, "category") {
        category_id(row)?
    } else if has_class(row, "item") {
        let token = element.attr("id")?.strip_prefix("grade-item-")?;
        let id: RemoteId = token.parse().ok()?;
        if id.kind() != EntityKind::Item {
            return None;
        }
        id
    } else {
        return None;
    };

    let parent = element
        .attr("data-parent-category")
        .and_then(normalize_category_token);

    let cell = name_cell(row)?;
    let name = extract_name(cell);
    if name.is_empty() {
        return None;
    }

    let level = cell
        .value()
        .classes()
        .find_map(|c| c.strip_prefix("level").and_then(|n| n.parse().ok()));

    Some(RawRow {
        id,
        name,
        parent,
        level,
    })
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn category_id(row: ElementRef<'_>) -> Option<RemoteId> {
    if let Some(id) = row
        .value()
        .attr("data-category")
        .and_then(normalize_category_token)
    {
        return Some(id);
    }
    // Older themes only have the row id.
    let token = row.value().attr("id")?.strip_prefix("grade-item-")?;
    token
        .parse::<RemoteId>()
        .ok()
        .filter(|id| id.kind() == EntityKind::Category)
}

/// Accepts `cg123` as well as a bare `123`.
fn normalize_category_token(raw: &str) -> Option<RemoteId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(id) = raw.parse::<RemoteId>() {
        return (id.kind() == EntityKind::Category).then_some(id);
    }
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().map(RemoteId::category)
}

/// The `column-name` cell, or the first cell when no cell is labelled.
fn name_cell(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut cells = row.select(&CELL).peekable();
    let first = cells.peek().copied();
    cells
        .find(|cell| has_class(*cell, "column-name"))
        .or(first)
}

fn extract_name(cell: ElementRef<'_>) -> String {
    let title = cell
        .select(&ROWTITLE)
        .next()
        .or_else(|| cell.select(&ITEMHEADER).next())
        .unwrap_or(cell);
    text_content(title)
}

/// Text of an element and everything below it, whitespace collapsed.
/// Entities are already decoded by the parser.
pub(crate) fn text_content(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uses the `levelN` class where present, otherwise derives depth from the
/// parent chain. Top rows sit at depth 1.
fn fill_depths(rows: Vec<RawRow>) -> Vec<ObservedEntity> {
    let levels: HashMap<RemoteId, (Option<RemoteId>, Option<u32>)> = rows
        .iter()
        .map(|row| (row.id, (row.parent, row.level)))
        .collect();

    rows.into_iter()
        .map(|row| {
            let depth = row
                .level
                .unwrap_or_else(|| chain_depth(row.id, &levels));
            ObservedEntity::new(row.id, row.name, row.parent, depth)
        })
        .collect()
}

fn chain_depth(start: RemoteId, rows: &HashMap<RemoteId, (Option<RemoteId>, Option<u32>)>) -> u32 {
    let mut depth = 0;
    let mut current = start;
    // Bounded by the row count so a malformed parent cycle cannot spin.
    for _ in 0..=rows.len() {
        match rows.get(&current) {
            Some((Some(parent), _)) => {
                depth += 1;
                match rows.get(parent) {
                    Some((_, Some(level))) => return depth + level,
                    Some(_) => current = *parent,
                    None => return depth,
                }
            }
            _ => return depth + 1,
        }
    }
    depth
}
