use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vendor {
    Klook,
    Tripcom,
}

impl Vendor {
    /// Fetch order within a single date.
    pub const ALL: [Vendor; 2] = [Vendor::Klook, Vendor::Tripcom];
}

impl Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Klook => write!(f, "KLOOK"),
            Vendor::Tripcom => write!(f, "TRIPCOM"),
        }
    }
}

/// A single (vendor, date) pair with its interpolated URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub vendor: Vendor,
    pub date: NaiveDate,
    pub url: String,
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.vendor, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub vendor: Vendor,
    pub date: NaiveDate,
    pub url: String,
    #[serde(rename = "minPrice")]
    pub min_price: Option<f64>,
}

impl PriceObservation {
    pub fn new(target: &Target, min_price: Option<f64>) -> Self {
        Self {
            vendor: target.vendor,
            date: target.date,
            url: target.url.clone(),
            min_price,
        }
    }
}

impl Display for PriceObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.min_price {
            Some(price) => write!(f, "{:<8} {} -> {:.2}", self.vendor, self.date, price),
            None => write!(f, "{:<8} {} -> N/A", self.vendor, self.date),
        }
    }
}

/// The all-time cheapest observation across every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub price: f64,
    pub vendor: Vendor,
    pub date: NaiveDate,
    pub url: String,
}

impl BestRecord {
    /// `None` when the observation carries no price.
    pub fn from_observation(observation: &PriceObservation) -> Option<Self> {
        observation.min_price.map(|price| BestRecord {
            price,
            vendor: observation.vendor,
            date: observation.date,
            url: observation.url.clone(),
        })
    }
}

impl Display for BestRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} at {} for {} ({})",
            self.price, self.vendor, self.date, self.url
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub updated_at: DateTime<Utc>,
    pub latest: Vec<PriceObservation>,
    pub best: Option<BestRecord>,
}

impl Display for HistorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ Updated {}", self.updated_at.to_rfc3339())?;
        match &self.best {
            Some(best) => writeln!(f, "│  Best: {}", best)?,
            None => writeln!(f, "│  Best: none recorded")?,
        }
        writeln!(f, "└─ {} observation(s)", self.latest.len())?;
        for (i, observation) in self.latest.iter().enumerate() {
            writeln!(f, "{:>3}. {}", i + 1, observation)?;
        }
        Ok(())
    }
}
