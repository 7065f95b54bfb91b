use time::{Duration, OffsetDateTime};

use super::error::TemplateError;
use super::stream::offset_seconds;
use super::template::{format_template, FieldValue};

/// A request for one channel selection over a time window.
///
/// `start`/`end` is the exact requested window; `pre_pad`/`post_pad` (seconds) widen the
/// window that is read from the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveQuery {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channels: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub pre_pad: f64,
    pub post_pad: f64,
}

impl ArchiveQuery {
    pub fn padded_start(&self) -> OffsetDateTime {
        offset_seconds(self.start, -self.pre_pad)
    }

    pub fn padded_end(&self) -> OffsetDateTime {
        offset_seconds(self.end, self.post_pad)
    }
}

/// Produce one glob pattern per calendar day touched by the padded query window.
///
/// Both end dates are included. Nothing here touches the filesystem.
pub fn resolve(query: &ArchiveQuery, template: &str) -> Result<Vec<String>, TemplateError> {
    let mut patterns = Vec::new();
    let last_date = query.padded_end().date();
    let mut read_from = query.padded_start();
    while read_from.date() <= last_date {
        let fields = [
            ("network", FieldValue::Text(&query.network)),
            ("station", FieldValue::Text(&query.station)),
            ("location", FieldValue::Text(&query.location)),
            ("channels", FieldValue::Text(&query.channels)),
            ("datetime", FieldValue::DateTime(read_from)),
            ("year", FieldValue::Integer(read_from.year() as i64)),
            ("jday", FieldValue::Integer(read_from.ordinal() as i64)),
        ];
        patterns.push(format_template(template, &fields)?);
        read_from += Duration::days(1);
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const TEMPLATE: &str = "{network}/{station}/{year}/{jday:03d}/*.{channels}.mseed";

    fn query(start: OffsetDateTime, end: OffsetDateTime, pre_pad: f64, post_pad: f64) -> ArchiveQuery {
        ArchiveQuery {
            network: String::from("XX"),
            station: String::from("ABC"),
            location: String::from(""),
            channels: String::from("HH?"),
            start,
            end,
            pre_pad,
            post_pad,
        }
    }

    #[test]
    fn test_one_day_touches_both_dates() {
        // A whole-day request ends at the following midnight, which is its own calendar day
        let q = query(
            datetime!(2024-01-05 00:00 UTC),
            datetime!(2024-01-06 00:00 UTC),
            0.0,
            0.0,
        );
        let patterns = resolve(&q, TEMPLATE).unwrap();
        assert_eq!(
            patterns,
            vec![
                "XX/ABC/2024/005/*.HH?.mseed".to_string(),
                "XX/ABC/2024/006/*.HH?.mseed".to_string(),
            ]
        );
    }

    #[test]
    fn test_pattern_count_matches_padded_day_span() {
        let cases = [
            (datetime!(2024-01-05 10:00 UTC), datetime!(2024-01-05 11:00 UTC), 0.0, 0.0),
            (datetime!(2024-01-05 00:00 UTC), datetime!(2024-01-06 00:00 UTC), 60.0, 60.0),
            (datetime!(2023-12-30 12:00 UTC), datetime!(2024-01-02 12:00 UTC), 0.0, 86_400.0),
            (datetime!(2024-02-28 00:00 UTC), datetime!(2024-03-01 00:00 UTC), 3_600.0, 0.0),
        ];
        for (start, end, pre, post) in cases {
            let q = query(start, end, pre, post);
            let expected = (q.padded_end().date() - q.padded_start().date()).whole_days() + 1;
            let patterns = resolve(&q, TEMPLATE).unwrap();
            assert_eq!(patterns.len() as i64, expected, "{start} -> {end}");
        }
    }

    #[test]
    fn test_pre_pad_reaches_previous_year() {
        let q = query(
            datetime!(2024-01-01 00:00 UTC),
            datetime!(2024-01-01 06:00 UTC),
            600.0,
            0.0,
        );
        let patterns = resolve(&q, TEMPLATE).unwrap();
        assert_eq!(patterns[0], "XX/ABC/2023/365/*.HH?.mseed");
        assert_eq!(patterns[1], "XX/ABC/2024/001/*.HH?.mseed");
    }
}
