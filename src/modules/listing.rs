// Listing records - no storage or bus imports allowed.
// Converts caller-supplied listing data into the summary kept by the cache.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, StoreError};

/// Listing data as handed over by a UI surface.
///
/// Only `id` is required. Every text field also accepts a JSON number
/// (prices and ids frequently arrive as numbers) and is coerced to its
/// string form. Absent or null fields become empty strings in the summary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    #[serde(deserialize_with = "required_text")]
    pub id: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub created_at: Option<String>,

    // Thumbnail sources, in fallback order.
    #[serde(default, deserialize_with = "loose_text")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub cover_photo: Option<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub images: Vec<String>,
}

impl ListingInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Parses an arbitrary JSON value at the boundary.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(StoreError::InvalidListing(format!(
                "expected an object, got {}",
                kind_of(value)
            )));
        }
        let input = Self::deserialize(value)
            .map_err(|e| StoreError::InvalidListing(e.to_string()))?;
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(StoreError::InvalidListing("id is empty".to_string()));
        }
        Ok(())
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    pub fn created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    /// First non-empty thumbnail source, or "" when none is set.
    ///
    /// Order: `thumbnailUrl`, `thumbnail`, `imageUrl`, `coverPhoto`, then
    /// the first non-empty entry of `images`.
    pub fn resolved_thumbnail(&self) -> String {
        [
            &self.thumbnail_url,
            &self.thumbnail,
            &self.image_url,
            &self.cover_photo,
        ]
        .into_iter()
        .flatten()
        .chain(self.images.iter())
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default()
    }
}

/// The record kept in the recent listings cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub viewed_at: String,
}

impl ListingSummary {
    pub fn from_input(input: ListingInput, viewed_at: DateTime<Utc>) -> Self {
        let thumbnail_url = input.resolved_thumbnail();
        Self {
            id: input.id,
            title: input.title.unwrap_or_default(),
            price: input.price.unwrap_or_default(),
            district: input.district.unwrap_or_default(),
            neighborhood: input.neighborhood.unwrap_or_default(),
            thumbnail_url,
            created_at: input.created_at.unwrap_or_default(),
            viewed_at: format_timestamp(viewed_at),
        }
    }

    pub fn viewed_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.viewed_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// RFC 3339, UTC, millisecond precision: `2026-10-19T08:30:00.123Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// String form of a scalar JSON value. Null, arrays and objects have none.
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whole-number floats print without a fraction, so `5.0` and `5` agree.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_text(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("id must be a string or number, got {}", kind_of(&value)))
    })
}

fn loose_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_text))
}

fn loose_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(coerce_text).collect(),
        Some(other) => coerce_text(&other).into_iter().collect(),
        None => Vec::new(),
    })
}
