use std::path::PathBuf;

use chrono::NaiveDate;

use crate::extractor::{PolicyError, PricePolicy};
use crate::notify::{NotifyError, SmtpConfig, parse_mailbox};
use crate::render::RenderConfig;
use crate::types::{Target, Vendor};

pub const DATE_PLACEHOLDER: &str = "{DATE}";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    MalformedDate(String),
    #[error("No target dates configured")]
    NoDates,
    #[error("URL template for {0} is missing the {{DATE}} placeholder")]
    MissingPlaceholder(Vendor),
    #[error("Invalid mail address: {0}")]
    InvalidAddress(#[from] NotifyError),
    #[error("Invalid price policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Parses a comma-separated list of `YYYY-MM-DD` dates, skipping blank entries.
pub fn parse_dates(list: &str) -> Result<Vec<NaiveDate>, ConfigError> {
    let dates = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ConfigError::MalformedDate(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if dates.is_empty() {
        return Err(ConfigError::NoDates);
    }
    Ok(dates)
}

#[derive(Debug, Clone)]
pub struct UrlTemplates {
    pub klook: String,
    pub tripcom: String,
}

impl UrlTemplates {
    pub fn template(&self, vendor: Vendor) -> &str {
        match vendor {
            Vendor::Klook => &self.klook,
            Vendor::Tripcom => &self.tripcom,
        }
    }

    pub fn url_for(&self, vendor: Vendor, date: NaiveDate) -> String {
        self.template(vendor)
            .replace(DATE_PLACEHOLDER, &date.format("%Y-%m-%d").to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub dates: Vec<NaiveDate>,
    pub urls: UrlTemplates,
    pub email_from: String,
    pub email_to: String,
    pub smtp: SmtpConfig,
    pub notifications_enabled: bool,
    /// Free-text party description embedded in every message.
    pub people: String,
    pub history_path: PathBuf,
    pub subject_prefix: String,
    pub render: RenderConfig,
    pub policy: PricePolicy,
}

impl TrackerConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.dates.is_empty() {
            return Err(ConfigError::NoDates);
        }
        for vendor in Vendor::ALL {
            if !self.urls.template(vendor).contains(DATE_PLACEHOLDER) {
                return Err(ConfigError::MissingPlaceholder(vendor));
            }
        }
        if self.notifications_enabled {
            parse_mailbox(&self.email_from)?;
            parse_mailbox(&self.email_to)?;
        }
        self.policy.validate()?;
        Ok(self)
    }

    /// Every (date, vendor) pair, date-major, in configured order.
    pub fn targets(&self) -> Vec<Target> {
        self.dates
            .iter()
            .flat_map(|&date| {
                Vendor::ALL.into_iter().map(move |vendor| Target {
                    vendor,
                    date,
                    url: self.urls.url_for(vendor, date),
                })
            })
            .collect()
    }
}
