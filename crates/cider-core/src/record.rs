//! Journal records as seen by the analytics engine.
//!
//! The engine reads records, never writes them. Only the id, one date field,
//! and the numeric field being aggregated matter here.

use chrono::{DateTime, Utc};
use cider_common::parse_record_date;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tasted or collected cider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CiderRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the cider entered the collection (ISO-8601 string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// When the cider was last tasted (ISO-8601 string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasted_at: Option<String>,

    /// Overall rating, typically 1-10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Alcohol by volume, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,
}

/// Which date a trend query buckets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    CreatedAt,
    TastedAt,
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::CreatedAt => write!(f, "created_at"),
            DateField::TastedAt => write!(f, "tasted_at"),
        }
    }
}

/// Numeric attribute of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Rating,
    Price,
    Abv,
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericField::Rating => write!(f, "rating"),
            NumericField::Price => write!(f, "price"),
            NumericField::Abv => write!(f, "abv"),
        }
    }
}

impl CiderRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_created_at(mut self, date: impl Into<String>) -> Self {
        self.created_at = Some(date.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_abv(mut self, abv: f64) -> Self {
        self.abv = Some(abv);
        self
    }

    /// Raw date string for `field`, if present.
    pub fn date(&self, field: DateField) -> Option<&str> {
        match field {
            DateField::CreatedAt => self.created_at.as_deref(),
            DateField::TastedAt => self.tasted_at.as_deref(),
        }
    }

    /// Parsed date for `field`; unparseable strings count as missing.
    pub fn parsed_date(&self, field: DateField) -> Option<DateTime<Utc>> {
        self.date(field).and_then(parse_record_date)
    }

    pub fn value(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Rating => self.rating,
            NumericField::Price => self.price,
            NumericField::Abv => self.abv,
        }
    }
}
