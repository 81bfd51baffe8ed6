use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::models::JobRecord;

const MS_PER_DAY: i64 = 86_400_000;

/// Normalize one raw feed entry into a canonical `JobRecord`. Total over
/// arbitrary JSON: fields that are missing, null, or the wrong shape fall
/// back to their defaults instead of failing the cycle that carried them.
pub fn normalize(raw: &Value, index: usize) -> JobRecord {
    normalize_at(raw, index, Utc::now())
}

// Same as normalize with an explicit "now", so day math is testable.
pub fn normalize_at(raw: &Value, index: usize, now: DateTime<Utc>) -> JobRecord {
    JobRecord {
        id: id_field(raw, index),
        title: text_field(raw, &["title"], "Untitled role"),
        company: text_field(raw, &["company", "companyName"], "Unknown company"),
        salary: text_field(raw, &["salary"], "Salary not provided"),
        deadline: text_field(raw, &["deadline", "applicationDeadline"], "Rolling"),
        posted_days_ago: posted_days_ago(raw, now),
        location: text_field(raw, &["location"], "Location not specified"),
        employment_type: text_field(raw, &["employmentType"], "Not specified"),
        level: text_field(raw, &["level"], "Not specified"),
        description: text_field(raw, &["description"], "No description available yet."),
        responsibilities: list_field(
            raw,
            "responsibilities",
            "Responsibilities will be shared by the employer.",
        ),
        requirements: list_field(
            raw,
            "requirements",
            "Requirements will be shared by the employer.",
        ),
    }
}

// Feeds send ids as strings or numbers interchangeably.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(raw: &Value, keys: &[&str], fallback: &str) -> String {
    keys.iter()
        .find_map(|key| raw.get(key).and_then(as_text))
        .unwrap_or_else(|| fallback.to_string())
}

fn id_field(raw: &Value, index: usize) -> String {
    ["id", "_id"]
        .iter()
        .find_map(|key| raw.get(key).and_then(as_text))
        .unwrap_or_else(|| format!("job-{index}"))
}

fn posted_days_ago(raw: &Value, now: DateTime<Utc>) -> u32 {
    if let Some(days) = raw.get("postedDaysAgo").and_then(Value::as_f64) {
        if days.is_finite() && days > 0.0 {
            return days.floor() as u32;
        }
        return 0;
    }

    let Some(posted_at) = raw.get("postedAt").and_then(Value::as_str) else {
        return 0;
    };
    let Some(instant) = parse_instant(posted_at) else {
        return 0;
    };

    let elapsed_ms = now.signed_duration_since(instant).num_milliseconds();
    (elapsed_ms / MS_PER_DAY).max(0) as u32
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    // Some feeds send bare dates; treat them as midnight UTC.
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc())
}

fn list_field(raw: &Value, key: &str, fallback: &str) -> Vec<String> {
    let items: Vec<String> = match raw.get(key) {
        Some(Value::Array(values)) => values.iter().filter_map(as_text).collect(),
        _ => Vec::new(),
    };

    if items.is_empty() {
        vec![fallback.to_string()]
    } else {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_normalize_empty_object_uses_every_default() {
        let job = normalize_at(&json!({}), 3, fixed_now());
        assert_eq!(job.id, "job-3");
        assert_eq!(job.title, "Untitled role");
        assert_eq!(job.company, "Unknown company");
        assert_eq!(job.salary, "Salary not provided");
        assert_eq!(job.deadline, "Rolling");
        assert_eq!(job.posted_days_ago, 0);
        assert_eq!(job.location, "Location not specified");
        assert_eq!(job.employment_type, "Not specified");
        assert_eq!(job.level, "Not specified");
        assert_eq!(job.description, "No description available yet.");
        assert_eq!(
            job.responsibilities,
            vec!["Responsibilities will be shared by the employer.".to_string()]
        );
        assert_eq!(
            job.requirements,
            vec!["Requirements will be shared by the employer.".to_string()]
        );
    }

    #[test]
    fn test_normalize_is_total_over_non_object_input() {
        for raw in [json!(null), json!("nonsense"), json!(17), json!([1, 2])] {
            let job = normalize_at(&raw, 0, fixed_now());
            assert_eq!(job.id, "job-0");
            assert_eq!(job.title, "Untitled role");
        }
    }

    #[test]
    fn test_id_prefers_id_then_alternate_then_synthesized() {
        let now = fixed_now();
        let both = normalize_at(&json!({"id": "a", "_id": "b"}), 0, now);
        assert_eq!(both.id, "a");

        let alternate = normalize_at(&json!({"_id": "b"}), 0, now);
        assert_eq!(alternate.id, "b");

        let neither = normalize_at(&json!({"id": true}), 7, now);
        assert_eq!(neither.id, "job-7");
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let job = normalize_at(&json!({"id": 42}), 0, fixed_now());
        assert_eq!(job.id, "42");
    }

    #[test]
    fn test_company_and_deadline_aliases() {
        let job = normalize_at(
            &json!({"companyName": "Apex Digital Labs", "applicationDeadline": "May 30, 2026"}),
            0,
            fixed_now(),
        );
        assert_eq!(job.company, "Apex Digital Labs");
        assert_eq!(job.deadline, "May 30, 2026");
    }

    #[test]
    fn test_wrong_shape_field_falls_back() {
        let job = normalize_at(
            &json!({"title": {"nested": true}, "salary": ["x"], "location": null}),
            0,
            fixed_now(),
        );
        assert_eq!(job.title, "Untitled role");
        assert_eq!(job.salary, "Salary not provided");
        assert_eq!(job.location, "Location not specified");
    }

    #[test]
    fn test_provided_posted_days_ago_wins_over_timestamp() {
        let job = normalize_at(
            &json!({"postedDaysAgo": 5, "postedAt": "2026-03-01T00:00:00Z"}),
            0,
            fixed_now(),
        );
        assert_eq!(job.posted_days_ago, 5);
    }

    #[test]
    fn test_provided_posted_days_ago_is_floored_and_clamped() {
        let now = fixed_now();
        assert_eq!(
            normalize_at(&json!({"postedDaysAgo": 2.9}), 0, now).posted_days_ago,
            2
        );
        assert_eq!(
            normalize_at(&json!({"postedDaysAgo": -4}), 0, now).posted_days_ago,
            0
        );
    }

    #[test]
    fn test_posted_at_computes_whole_elapsed_days() {
        let now = fixed_now();
        // 2.5 days before "now" floors to 2.
        let job = normalize_at(&json!({"postedAt": "2026-03-08T00:00:00Z"}), 0, now);
        assert_eq!(job.posted_days_ago, 2);

        let bare_date = normalize_at(&json!({"postedAt": "2026-03-09"}), 0, now);
        assert_eq!(bare_date.posted_days_ago, 1);
    }

    #[test]
    fn test_future_posted_at_clamps_to_zero() {
        let job = normalize_at(&json!({"postedAt": "2026-04-01T00:00:00Z"}), 0, fixed_now());
        assert_eq!(job.posted_days_ago, 0);
    }

    #[test]
    fn test_unparsable_posted_at_is_zero_not_an_error() {
        let job = normalize_at(&json!({"postedAt": "last tuesday"}), 0, fixed_now());
        assert_eq!(job.posted_days_ago, 0);
    }

    #[test]
    fn test_normalize_is_deterministic_for_fixed_now() {
        let raw = json!({"id": "9", "postedAt": "2026-03-01T09:30:00Z"});
        let first = normalize_at(&raw, 2, fixed_now());
        let second = normalize_at(&raw, 2, fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_fields_keep_provided_sequences() {
        let job = normalize_at(
            &json!({"responsibilities": ["Ship features.", "Review code."]}),
            0,
            fixed_now(),
        );
        assert_eq!(
            job.responsibilities,
            vec!["Ship features.".to_string(), "Review code.".to_string()]
        );
    }

    #[test]
    fn test_list_fields_reject_non_sequences_and_empty_sequences() {
        let now = fixed_now();
        let scalar = normalize_at(&json!({"requirements": "five years"}), 0, now);
        assert_eq!(
            scalar.requirements,
            vec!["Requirements will be shared by the employer.".to_string()]
        );

        let empty = normalize_at(&json!({"requirements": []}), 0, now);
        assert_eq!(
            empty.requirements,
            vec!["Requirements will be shared by the employer.".to_string()]
        );

        // Unusable elements are dropped; numbers are kept as text.
        let mixed = normalize_at(&json!({"requirements": [7, {"x": 1}, "Rust"]}), 0, now);
        assert_eq!(mixed.requirements, vec!["7".to_string(), "Rust".to_string()]);
    }
}
