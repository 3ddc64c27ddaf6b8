use std::fmt::Write;
use std::path::Path;

use crate::types::{BestRecord, PriceObservation};

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

pub fn alert_subject(prefix: &str) -> String {
    format!("{prefix} — New Cheapest Price")
}

pub fn snapshot_subject(prefix: &str) -> String {
    format!("{prefix} — Daily Snapshot")
}

pub fn alert_body(best: &BestRecord, people: &str, history_path: &Path) -> String {
    format!(
        "<h3>New Cheapest Price Found</h3>\
         <p><strong>Vendor:</strong> {vendor}<br/>\
         <strong>Date:</strong> {date}<br/>\
         <strong>Price:</strong> {price}<br/>\
         <strong>People:</strong> {people}<br/>\
         <strong>Link:</strong> <a href=\"{url}\">Open</a></p>\
         <hr/>\
         <p>Timeseries saved to {path}</p>",
        vendor = best.vendor,
        date = best.date,
        price = format_price(best.price),
        people = escape_html(people),
        url = escape_html(&best.url),
        path = escape_html(&history_path.display().to_string()),
    )
}

pub fn snapshot_body(observations: &[PriceObservation], people: &str) -> String {
    let mut rows = String::new();
    for observation in observations {
        let price = observation
            .min_price
            .map(format_price)
            .unwrap_or_else(|| "N/A".to_string());
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><a href=\"{}\">open</a></td></tr>",
            observation.vendor,
            observation.date,
            price,
            escape_html(&observation.url)
        );
    }

    format!(
        "<h3>Daily Snapshot</h3><p>{}</p>\
         <table border=\"1\" cellpadding=\"6\" cellspacing=\"0\">\
         <tr><th>Vendor</th><th>Date</th><th>Min Price</th><th>Link</th></tr>{}</table>",
        escape_html(people),
        rows
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vendor;
    use chrono::NaiveDate;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_subjects() {
        assert_eq!(
            alert_subject("Shanghai Disneyland"),
            "Shanghai Disneyland — New Cheapest Price"
        );
        assert_eq!(
            snapshot_subject("Shanghai Disneyland"),
            "Shanghai Disneyland — Daily Snapshot"
        );
    }

    #[test]
    fn test_alert_body() {
        let best = BestRecord {
            price: 449.5,
            vendor: Vendor::Tripcom,
            date: NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(),
            url: "https://trip.example/?date=2025-09-02&adults=2".to_string(),
        };

        let body = alert_body(&best, "2 adults + child", Path::new("data/history.json"));
        assert!(body.contains("<strong>Vendor:</strong> TRIPCOM"));
        assert!(body.contains("<strong>Date:</strong> 2025-09-02"));
        assert!(body.contains("<strong>Price:</strong> 449.50"));
        assert!(body.contains("href=\"https://trip.example/?date=2025-09-02&amp;adults=2\""));
        assert!(body.contains("Timeseries saved to data/history.json"));
    }

    #[test]
    fn test_snapshot_body_marks_missing_prices() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let observations = vec![
            PriceObservation {
                vendor: Vendor::Klook,
                date,
                url: "https://klook.example".to_string(),
                min_price: Some(475.0),
            },
            PriceObservation {
                vendor: Vendor::Tripcom,
                date,
                url: "https://trip.example".to_string(),
                min_price: None,
            },
        ];

        let body = snapshot_body(&observations, "2 adults");
        assert!(body.contains("<p>2 adults</p>"));
        assert!(body.contains("<td>KLOOK</td><td>2025-09-01</td><td>475</td>"));
        assert!(body.contains("<td>TRIPCOM</td><td>2025-09-01</td><td>N/A</td>"));
        assert_eq!(body.matches("<tr>").count(), 3);
    }
}
