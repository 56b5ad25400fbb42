//! Inventory intake: detect the products in a photo and read the date printed
//! on a label.
//!
//! Item detection asks the model for a JSON array and is lenient about what
//! comes back. The first `[` .. last `]` span is parsed as items; a reply with
//! no array is scanned for `name: count` pairs; anything unparseable becomes a
//! single placeholder item so intake can continue by hand.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use super::vision::{Sampling, VisionClient};
use crate::acquisition::CapturedImage;
use crate::error::PanelResult;

pub const NO_ITEMS_NOTICE: &str = "Could not detect specific items. Try a clearer image or different angle.";

/// Material whose labels carry a manufacturing date instead of an expiry date.
pub const VINE: &str = "vine";

/// One detected product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    /// Absent when the model was unsure.
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: Option<u32>,
    #[serde(rename = "type", default)]
    pub material: String,
}

impl InventoryItem {
    fn placeholder(material: &str, tag: &str) -> Self {
        Self {
            name: format!("{} item ({})", material, tag),
            quantity: Some(1),
            material: material.to_string(),
        }
    }
}

/// Models send counts as numbers or numeric strings.
fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// How the items were recovered from the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Json,
    CountPairs,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetection {
    pub items: Vec<InventoryItem>,
    pub source: DetectionSource,
    /// Set when nothing specific was detected.
    pub notice: Option<String>,
    pub full_response: String,
}

fn detection_prompt(material: &str) -> String {
    format!(
        "Examine the image and identify all visible products made of {material}. \
Provide a structured JSON response containing an array of objects, where each object includes: \
name: The product's name, quantity: The number of items detected (##IF UNSURE DONT MENTION), \
type: '{material}' Ensure accuracy in detection and categorization"
    )
}

/// Recover items from a model reply.
pub fn parse_items(reply: &str, material: &str) -> ItemDetection {
    let (mut items, mut source) = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            match serde_json::from_str::<Vec<InventoryItem>>(&reply[start..=end]) {
                Ok(items) => (items, DetectionSource::Json),
                Err(e) => {
                    debug!(error = %e, "item array did not parse");
                    (
                        vec![InventoryItem::placeholder(material, "auto-detected")],
                        DetectionSource::Placeholder,
                    )
                }
            }
        }
        _ => (count_pairs(reply, material), DetectionSource::CountPairs),
    };

    for item in &mut items {
        if item.material.trim().is_empty() {
            item.material = material.to_string();
        }
    }

    let mut notice = None;
    if items.is_empty() {
        items.push(InventoryItem::placeholder(material, "generic"));
        source = DetectionSource::Placeholder;
        notice = Some(NO_ITEMS_NOTICE.to_string());
    }

    ItemDetection {
        items,
        source,
        notice,
        full_response: reply.to_string(),
    }
}

/// `Wine bottles: 3`, `apples 4, pears 2`: up to two words right before a count.
fn count_pairs(reply: &str, material: &str) -> Vec<InventoryItem> {
    let mut items = Vec::new();
    for line in reply.lines() {
        let mut rest = line;
        while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
            let len = rest[start..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len() - start);
            let label = rest[..start].trim_end().trim_end_matches(':').trim_end();

            if label.ends_with(|c: char| c.is_alphanumeric() || c == '_') {
                let words: Vec<&str> = label
                    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .filter(|w| !w.is_empty())
                    .collect();
                if let Ok(quantity) = rest[start..start + len].parse::<u32>() {
                    items.push(InventoryItem {
                        name: words[words.len().saturating_sub(2)..].join(" "),
                        quantity: Some(quantity),
                        material: material.to_string(),
                    });
                }
            }
            rest = &rest[start + len..];
        }
    }
    items
}

/// Detect the products of `material` visible in `image`.
pub async fn detect_items(
    client: &VisionClient,
    image: &CapturedImage,
    material: &str,
) -> PanelResult<ItemDetection> {
    let sampling = Sampling::new(0.5).with_top_p(1.0);
    let reply = client.ask(&detection_prompt(material), image, sampling).await?;
    let detection = parse_items(&reply, material);
    if detection.notice.is_some() {
        warn!(material, "no specific inventory items detected");
    }
    info!(
        material,
        items = detection.items.len(),
        source = ?detection.source,
        "inventory items detected"
    );
    Ok(detection)
}

/// Which date a label is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Manufacturing,
    Expiry,
}

impl DateKind {
    pub fn for_material(material: &str) -> Self {
        if material.eq_ignore_ascii_case(VINE) {
            Self::Manufacturing
        } else {
            Self::Expiry
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manufacturing => "manufacturing",
            Self::Expiry => "expiry",
        }
    }
}

fn date_prompt(kind: DateKind) -> String {
    format!(
        "Look at this image and extract the {} date from the product label or packaging. \
Return the date in DD/MM/YYYY format only. If you find a date in MM/DD/YYYY format, \
please convert it to DD/MM/YYYY format. If you can't find a clear date, identify any \
date-like patterns and convert them to DD/MM/YYYY format.",
        kind.as_str()
    )
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

fn days_in_month(month: u32, year: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 31,
    }
}

fn format_date(day: u32, month: u32, year: u32) -> Option<String> {
    let valid = (1..=12).contains(&month) && day >= 1 && day <= days_in_month(month, year);
    valid.then(|| format!("{:02}/{:02}/{:04}", day, month, year))
}

/// First `d/m/yyyy` (also `.` or `-` separated) in `text`.
fn numeric_date(text: &str) -> Option<(u32, u32, u32)> {
    let bytes = text.as_bytes();
    let digits_at = |from: usize, min: usize, max: usize| -> Option<(u32, usize)> {
        let len = bytes[from..]
            .iter()
            .take(max)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if len < min {
            return None;
        }
        text[from..from + len].parse().ok().map(|n| (n, from + len))
    };
    let sep_at = |at: usize| matches!(bytes.get(at), Some(b'/' | b'.' | b'-'));

    (0..bytes.len())
        .filter(|&i| bytes[i].is_ascii_digit() && (i == 0 || !bytes[i - 1].is_ascii_digit()))
        .find_map(|i| {
            let (first, end) = digits_at(i, 1, 2)?;
            if !sep_at(end) {
                return None;
            }
            let (second, end) = digits_at(end + 1, 1, 2)?;
            if !sep_at(end) {
                return None;
            }
            let (year, _) = digits_at(end + 1, 4, 4)?;
            Some((first, second, year))
        })
}

/// `12th of March, 2025` style dates.
fn written_date(text: &str) -> Option<(u32, u32, u32)> {
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    words.iter().enumerate().find_map(|(i, word)| {
        let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let suffix = &word[digits.len()..];
        if digits.is_empty()
            || digits.len() > 2
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || !matches!(suffix.to_ascii_lowercase().as_str(), "" | "st" | "nd" | "rd" | "th")
        {
            return None;
        }
        let mut next = i + 1;
        if words.get(next)?.eq_ignore_ascii_case("of") {
            next += 1;
        }
        let month_word = words.get(next)?.to_ascii_lowercase();
        let month = MONTHS.iter().position(|m| month_word.contains(m))? as u32 + 1;
        let year_word = words.get(next + 1)?;
        if year_word.len() != 4 {
            return None;
        }
        Some((digits.parse().ok()?, month, year_word.parse().ok()?))
    })
}

/// Normalize a model reply to `DD/MM/YYYY`.
///
/// A middle number above 12 must be the day, so the pair is swapped; a reply
/// that says it is using month-first order is swapped too. Returns `None`
/// when no valid calendar date is found.
pub fn parse_label_date(reply: &str) -> Option<String> {
    if let Some((mut day, mut month, year)) = numeric_date(reply) {
        let lower = reply.to_ascii_lowercase();
        let month_first = reply.contains("MM/DD/YYYY")
            || reply.contains("US format")
            || matches!(
                (lower.find("month"), lower.find("day")),
                (Some(m), Some(d)) if m < d
            );
        if month > 12 || (month_first && day <= 12) {
            std::mem::swap(&mut day, &mut month);
        }
        if let Some(date) = format_date(day, month, year) {
            return Some(date);
        }
    }
    written_date(reply).and_then(|(day, month, year)| format_date(day, month, year))
}

/// Label date read from a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDate {
    pub kind: DateKind,
    /// `DD/MM/YYYY`, if the reply held a valid date.
    pub date: Option<String>,
    pub full_response: String,
}

/// Read the manufacturing or expiry date on the label of `image`.
pub async fn extract_date(
    client: &VisionClient,
    image: &CapturedImage,
    kind: DateKind,
) -> PanelResult<LabelDate> {
    let sampling = Sampling::new(0.2).with_top_p(1.0).with_max_tokens(128);
    let reply = client.ask(&date_prompt(kind), image, sampling).await?;
    let date = parse_label_date(&reply);
    match &date {
        Some(date) => info!(kind = kind.as_str(), date = %date, "label date read"),
        None => warn!(kind = kind.as_str(), "no valid date in label reply"),
    }
    Ok(LabelDate {
        kind,
        date,
        full_response: reply,
    })
}
