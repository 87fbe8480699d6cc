//! Authorizer wire format.
//!
//! The external quota service answers authorize calls with an XML
//! status document. Only the fields consumed here are modeled; the
//! rest of the vendor format is opaque to the proxy.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    /// The authorizer answered with an `<error>` document; the payload
    /// is its text content.
    #[error("{0}")]
    ErrorDocument(String),
    #[error("malformed authorizer response: {0}")]
    Malformed(String),
}

/// Billing period of a usage report. Periods not consumed by the proxy
/// deserialize to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Month,
    #[serde(other)]
    Other,
}

/// One usage counter reading.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageReport {
    #[serde(rename = "@metric")]
    pub metric: String,
    #[serde(rename = "@period")]
    pub period: Period,
    #[serde(default)]
    pub period_start: String,
    #[serde(default)]
    pub period_end: String,
    pub max_value: i64,
    pub current_value: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageReports {
    #[serde(rename = "usage_report", default)]
    pub reports: Vec<UsageReport>,
}

/// The authorize response the proxy acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDocument {
    pub authorized: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub usage_reports: UsageReports,
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "$text", default)]
    text: String,
}

impl StatusDocument {
    /// Parse an authorizer response body.
    ///
    /// An `<error>` root is surfaced as [`WireError::ErrorDocument`]
    /// carrying the document text.
    pub fn parse(body: &str) -> Result<Self, WireError> {
        match root_element(body)?.as_str() {
            "error" => {
                let doc: ErrorDocument = quick_xml::de::from_str(body)
                    .map_err(|e| WireError::Malformed(e.to_string()))?;
                Err(WireError::ErrorDocument(doc.text.trim().to_string()))
            }
            "status" => {
                quick_xml::de::from_str(body).map_err(|e| WireError::Malformed(e.to_string()))
            }
            other => Err(WireError::Malformed(format!(
                "unexpected root element '{other}'"
            ))),
        }
    }

    /// Remaining credits and the next reset timestamp.
    ///
    /// Periods are consulted in order (day, then month): the first
    /// period with exactly one report wins. A period with several
    /// reports is ambiguous and skipped with a warning. `None` means
    /// the plan carries no consumable limit.
    pub fn credits(&self) -> Option<(i64, &str)> {
        for period in [Period::Day, Period::Month] {
            let mut matching = self.usage_reports.reports.iter().filter(|r| r.period == period);
            match (matching.next(), matching.next()) {
                (None, _) => continue,
                (Some(report), None) => {
                    return Some((report.max_value - report.current_value, &report.period_end));
                }
                (Some(_), Some(_)) => {
                    tracing::warn!(?period, "multiple usage reports for one period, skipping it");
                    continue;
                }
            }
        }
        None
    }
}

fn root_element(body: &str) -> Result<String, WireError> {
    let mut reader = quick_xml::Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(quick_xml::events::Event::Eof) => {
                return Err(WireError::Malformed("empty document".into()));
            }
            Ok(_) => continue,
            Err(e) => return Err(WireError::Malformed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <status>
            <authorized>true</authorized>
            <plan>Default</plan>
            <usage_reports>
                <usage_report metric="hits" period="day">
                    <period_start>2013-10-01 00:00:00 +0000</period_start>
                    <period_end>2013-10-02 00:00:00 +0000</period_end>
                    <max_value>10000000</max_value>
                    <current_value>2</current_value>
                </usage_report>
              </usage_reports>
        </status>"#;

    const MONTHLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <status>
            <authorized>true</authorized>
            <plan>Default</plan>
            <usage_reports>
                <usage_report metric="hits" period="month">
                    <period_start>2013-10-01 00:00:00 +0000</period_start>
                    <period_end>2013-11-01 00:00:00 +0000</period_end>
                    <max_value>100</max_value>
                    <current_value>10</current_value>
                </usage_report>
              </usage_reports>
        </status>"#;

    const DAILY_AND_MONTHLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <status>
            <authorized>true</authorized>
            <plan>Default</plan>
            <usage_reports>
                <usage_report metric="hits" period="month">
                    <period_start>2013-10-01 00:00:00 +0000</period_start>
                    <period_end>2013-11-01 00:00:00 +0000</period_end>
                    <max_value>100</max_value>
                    <current_value>10</current_value>
                </usage_report>
                <usage_report metric="hits" period="day">
                    <period_start>2013-10-01 00:00:00 +0000</period_start>
                    <period_end>2013-10-02 00:00:00 +0000</period_end>
                    <max_value>20</max_value>
                    <current_value>2</current_value>
                </usage_report>
              </usage_reports>
        </status>"#;

    #[test]
    fn reads_daily_credits() {
        let status = StatusDocument::parse(DAILY).unwrap();
        assert!(status.authorized);
        let (left, reset) = status.credits().unwrap();
        assert_eq!(left, 9_999_998);
        assert_eq!(reset, "2013-10-02 00:00:00 +0000");
    }

    #[test]
    fn reads_monthly_credits() {
        let status = StatusDocument::parse(MONTHLY).unwrap();
        let (left, reset) = status.credits().unwrap();
        assert_eq!(left, 90);
        assert_eq!(reset, "2013-11-01 00:00:00 +0000");
    }

    #[test]
    fn prefers_day_over_month() {
        let status = StatusDocument::parse(DAILY_AND_MONTHLY).unwrap();
        let (left, reset) = status.credits().unwrap();
        assert_eq!(left, 18);
        assert_eq!(reset, "2013-10-02 00:00:00 +0000");
    }

    #[test]
    fn ambiguous_period_is_skipped() {
        let body = r#"<status>
            <authorized>true</authorized>
            <usage_reports>
                <usage_report metric="hits" period="day">
                    <period_end>2013-10-02 00:00:00 +0000</period_end>
                    <max_value>10</max_value>
                    <current_value>1</current_value>
                </usage_report>
                <usage_report metric="other" period="day">
                    <period_end>2013-10-02 00:00:00 +0000</period_end>
                    <max_value>50</max_value>
                    <current_value>1</current_value>
                </usage_report>
                <usage_report metric="hits" period="month">
                    <period_end>2013-11-01 00:00:00 +0000</period_end>
                    <max_value>100</max_value>
                    <current_value>10</current_value>
                </usage_report>
            </usage_reports>
        </status>"#;

        let status = StatusDocument::parse(body).unwrap();
        let (left, reset) = status.credits().unwrap();
        assert_eq!(left, 90, "day period is ambiguous, month should win");
        assert_eq!(reset, "2013-11-01 00:00:00 +0000");
    }

    #[test]
    fn no_usage_reports_means_no_limit() {
        let body = r#"<status><authorized>true</authorized><plan>Unlimited</plan></status>"#;
        let status = StatusDocument::parse(body).unwrap();
        assert!(status.credits().is_none());
    }

    #[test]
    fn denial_carries_reason() {
        let body = r#"<status>
            <authorized>false</authorized>
            <reason>usage limits are exceeded</reason>
        </status>"#;
        let status = StatusDocument::parse(body).unwrap();
        assert!(!status.authorized);
        assert_eq!(status.reason, "usage limits are exceeded");
    }

    #[test]
    fn error_root_is_surfaced() {
        let body = r#"<error code="user.invalid_key">user key is invalid</error>"#;
        match StatusDocument::parse(body) {
            Err(WireError::ErrorDocument(text)) => assert_eq!(text, "user key is invalid"),
            other => panic!("expected error document, got {other:?}"),
        }
    }

    #[test]
    fn unknown_period_is_ignored() {
        let body = r#"<status>
            <authorized>true</authorized>
            <usage_reports>
                <usage_report metric="hits" period="week">
                    <period_end>2013-10-07 00:00:00 +0000</period_end>
                    <max_value>10</max_value>
                    <current_value>2</current_value>
                </usage_report>
            </usage_reports>
        </status>"#;
        let status = StatusDocument::parse(body).unwrap();
        assert!(status.credits().is_none());
    }
}
