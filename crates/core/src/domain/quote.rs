use std::fmt::Write as _;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{optional_str, required_str, string_list};
use crate::errors::PayloadError;

/// Price sentinel for tiers that are priced case by case.
pub const ASK_FOR_QUOTE: &str = "咨询报价";

const ASK_FOR_QUOTE_ALIASES: [&str; 3] = [ASK_FOR_QUOTE, "ask for quote", "ask for a quote"];
const CURRENCY_PREFIXES: [&str; 5] = ["¥", "￥", "$", "RMB", "CNY"];
const PRICE_SUFFIXES: [&str; 4] = ["元起", "元", "起", "+"];
/// Ten-thousand multipliers, as in `1.5万` or `2w`.
const UNIT_SUFFIXES: [&str; 3] = ["万", "w", "W"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTier {
    pub name: String,
    pub price: String,
    pub features: Vec<String>,
    pub desc: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub tiers: Vec<QuoteTier>,
    pub notes: Vec<String>,
    pub analysis: String,
}

/// How a tier price string reads once currency markers are stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TierPrice {
    Amount { low: Decimal, high: Option<Decimal> },
    AskForQuote,
}

impl TierPrice {
    /// Returns `None` for prices that are neither numeric-looking nor the
    /// ask-for-quote sentinel.
    pub fn classify(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if ASK_FOR_QUOTE_ALIASES.iter().any(|alias| trimmed.eq_ignore_ascii_case(alias)) {
            return Some(Self::AskForQuote);
        }

        let body = strip_price_suffixes(strip_currency(trimmed));
        let body = body.chars().filter(|ch| !ch.is_whitespace() && *ch != ',').collect::<String>();

        let Some((low, high)) = body.split_once(['-', '~', '–']) else {
            let (amount, _) = parse_amount(&body)?;
            return Some(Self::Amount { low: amount, high: None });
        };
        let (mut low, low_has_unit) = parse_amount(low)?;
        let (high, high_has_unit) = parse_amount(high)?;
        // "1-2万" shares the unit across the range; "5000-2万" does not.
        if high_has_unit && !low_has_unit {
            if let Some(scaled) = low.checked_mul(ten_thousand()).filter(|scaled| *scaled <= high) {
                low = scaled;
            }
        }
        if high < low {
            return None;
        }

        Some(Self::Amount { low, high: Some(high) })
    }
}

fn ten_thousand() -> Decimal {
    Decimal::new(10_000, 0)
}

fn strip_currency(raw: &str) -> &str {
    CURRENCY_PREFIXES.iter().find_map(|prefix| raw.strip_prefix(prefix)).unwrap_or(raw)
}

/// Strips trailing price markers until none match, so `1500元+` reads as `1500`.
fn strip_price_suffixes(raw: &str) -> &str {
    let mut body = raw.trim_end();
    while let Some(rest) = PRICE_SUFFIXES.iter().find_map(|suffix| body.strip_suffix(suffix)) {
        body = rest.trim_end();
    }
    body
}

/// Parses one side of a price. The flag reports whether a ten-thousand
/// unit was applied.
fn parse_amount(raw: &str) -> Option<(Decimal, bool)> {
    let body = strip_price_suffixes(strip_currency(raw));
    let (digits, has_unit) = match UNIT_SUFFIXES.iter().find_map(|unit| body.strip_suffix(unit)) {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    let mut amount = Decimal::from_str(digits).ok()?;
    if amount.is_sign_negative() {
        return None;
    }
    if has_unit {
        amount = amount.checked_mul(ten_thousand())?;
    }
    Some((amount, has_unit))
}

impl QuoteTier {
    pub fn price_kind(&self) -> TierPrice {
        TierPrice::classify(&self.price).unwrap_or(TierPrice::AskForQuote)
    }

    fn from_value(value: &Value, path: &str) -> Result<Self, PayloadError> {
        let name = required_str(value, "name", path)?.trim();
        if name.is_empty() {
            return Err(PayloadError::MissingField(format!("{path}.name")));
        }

        Ok(Self {
            name: name.to_string(),
            price: normalize_price(value, path)?,
            features: string_list(value, "features", path)?,
            desc: optional_str(value, "desc", path)?,
        })
    }
}

/// Prices that are neither numeric-looking nor the sentinel are replaced by
/// the sentinel so a garbled figure is never shown as a price.
fn normalize_price(value: &Value, path: &str) -> Result<String, PayloadError> {
    let raw = match value.get("price") {
        None | Some(Value::Null) => {
            return Err(PayloadError::MissingField(format!("{path}.price")));
        }
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => {
            warn!(
                event_name = "interview.quote.price_normalized",
                field = %format!("{path}.price"),
                raw = %other,
                "tier price is not a string, replaced by ask-for-quote sentinel"
            );
            return Ok(ASK_FOR_QUOTE.to_string());
        }
    };

    match TierPrice::classify(&raw) {
        Some(_) => Ok(raw),
        None => {
            warn!(
                event_name = "interview.quote.price_normalized",
                field = %format!("{path}.price"),
                raw = %raw,
                "tier price is not numeric, replaced by ask-for-quote sentinel"
            );
            Ok(ASK_FOR_QUOTE.to_string())
        }
    }
}

impl Quote {
    /// Validates a model payload into a quote. `tiers` is required and must
    /// be non-empty; `notes` and `analysis` default to empty.
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let items = match payload.get("tiers") {
            None | Some(Value::Null) => return Err(PayloadError::MissingField("tiers".into())),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(PayloadError::WrongType {
                    field: "tiers".into(),
                    expected: "an array of tiers",
                })
            }
        };
        if items.is_empty() {
            return Err(PayloadError::EmptyList("tiers".into()));
        }

        let tiers = items
            .iter()
            .enumerate()
            .map(|(index, item)| QuoteTier::from_value(item, &format!("tiers[{index}]")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tiers,
            notes: string_list(payload, "notes", "quote")?,
            analysis: optional_str(payload, "analysis", "quote")?,
        })
    }

    /// Plain-text rendering used when the quote is copied out of the wizard.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for tier in &self.tiers {
            let _ = writeln!(out, "【{}】{}", tier.name, display_price(&tier.price));
            if !tier.desc.is_empty() {
                let _ = writeln!(out, "  {}", tier.desc);
            }
            for feature in &tier.features {
                let _ = writeln!(out, "  - {feature}");
            }
        }
        if !self.notes.is_empty() {
            out.push_str("注意事项：\n");
            for note in &self.notes {
                let _ = writeln!(out, "  * {note}");
            }
        }
        if !self.analysis.is_empty() {
            let _ = writeln!(out, "分析：{}", self.analysis);
        }
        out
    }
}

fn display_price(price: &str) -> String {
    match TierPrice::classify(price) {
        Some(TierPrice::Amount { .. })
            if !CURRENCY_PREFIXES.iter().any(|prefix| price.starts_with(prefix)) =>
        {
            format!("¥{price}")
        }
        _ => price.to_string(),
    }
}
