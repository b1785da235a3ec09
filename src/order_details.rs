//! Human-readable order summary, e.g.
//! `[채소] 감자 1kg(2), 양파(1) | [과일] 사과(3)`.
//!
//! Line items are stored in `order_items`; this string is what receipts and
//! the Excel report show. Orders written before item rows existed only carry
//! the summary, so [`parse`] is still used to restock them on cancel.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLine {
    pub category: String,
    pub name: String,
    pub quantity: i32,
}

static GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([^\]]*)\]\s*(.*)$").expect("valid regex"));

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\((\d+)\)\s*$").expect("valid regex"));

pub fn render<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, i32)>,
{
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for (category, name, quantity) in lines {
        let item = format!("{name}({quantity})");
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, items)) => items.push(item),
            None => groups.push((category, vec![item])),
        }
    }

    groups
        .into_iter()
        .map(|(category, items)| format!("[{category}] {}", items.join(", ")))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn parse(text: &str) -> Vec<DetailLine> {
    let mut lines = Vec::new();
    for group in text.split(" | ") {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let (category, items) = match GROUP_RE.captures(group) {
            Some(caps) => (
                caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
                caps.get(2).map_or("", |m| m.as_str()),
            ),
            None => (String::new(), group),
        };

        for item in split_items(items) {
            let (name, quantity) = match ITEM_RE.captures(item) {
                Some(caps) => {
                    let name = caps.get(1).map_or("", |m| m.as_str());
                    let quantity = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse::<i32>().ok())
                        .unwrap_or(1);
                    (name, quantity)
                }
                None => (item, 1),
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            lines.push(DetailLine {
                category: category.clone(),
                name: name.to_string(),
                quantity,
            });
        }
    }
    lines
}

// Split on ", " only outside parentheses so names like "두부(국산, 300g)" survive.
fn split_items(items: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = items.as_bytes();
    for (idx, ch) in items.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(items[start..idx].trim());
                start = idx + 1;
                if bytes.get(start) == Some(&b' ') {
                    start += 1;
                }
            }
            _ => {}
        }
    }
    out.push(items[start..].trim());
    out.into_iter().filter(|s| !s.is_empty()).collect()
}
