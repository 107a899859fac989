//! Turns raw JSON post records into [`Post`]s.
//!
//! Accepts Twitter-shaped records (`id`/`id_str`, `user.id`, `created_at`,
//! GeoJSON `coordinates`, `text`) as well as flat records carrying
//! `user_id`, `longitude` and `latitude` directly.

use crate::error::ParseError;
use crate::ingest::post::{AuthorId, Point, Post, PostId};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeSet;

/// `created_at` format used by the Twitter v1.1 API.
const TWITTER_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Formats without an offset; interpreted in the parser's timezone.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Terms shorter than this are dropped.
const MIN_TERM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "this", "that", "with", "from", "they", "will", "just",
    "what", "when", "your", "there", "their", "about", "would", "been", "were", "who", "its",
    "into", "than", "then", "them", "some", "very", "get", "got", "now", "amp", "rt",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<u64> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<RawId>,
    id_str: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCoordinates {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: Option<RawId>,
    id_str: Option<String>,
    user: Option<RawUser>,
    user_id: Option<RawId>,
    created_at: Option<String>,
    text: Option<String>,
    full_text: Option<String>,
    coordinates: Option<RawCoordinates>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    needs_location_prediction: Option<bool>,
}

impl RawPost {
    fn post_id(&self) -> Option<PostId> {
        self.id_str
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .or_else(|| self.id.as_ref().and_then(RawId::value))
    }

    fn author_id(&self) -> Option<AuthorId> {
        let from_user = self.user.as_ref().and_then(|u| {
            u.id_str
                .as_deref()
                .and_then(|s| s.trim().parse().ok())
                .or_else(|| u.id.as_ref().and_then(RawId::value))
        });
        from_user.or_else(|| self.user_id.as_ref().and_then(RawId::value))
    }

    fn point(&self) -> Result<Option<Point>, ParseError> {
        let (lon, lat) = match (&self.coordinates, self.longitude, self.latitude) {
            (Some(c), _, _) => match c.coordinates.as_slice() {
                [lon, lat] => (*lon, *lat),
                other => {
                    return Err(ParseError::Coordinates(format!(
                        "expected [lon, lat], got {} values",
                        other.len()
                    )))
                }
            },
            (None, Some(lon), Some(lat)) => (lon, lat),
            _ => return Ok(None),
        };

        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ParseError::Coordinates(format!("longitude {lon}")));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ParseError::Coordinates(format!("latitude {lat}")));
        }
        Ok(Some(Point::new(lon, lat)))
    }
}

/// Parser for raw post records.
#[derive(Debug, Clone)]
pub struct PostParser {
    timezone: Tz,
}

impl Default for PostParser {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl PostParser {
    /// Create a parser that reads naive timestamps in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Parse one JSON record.
    pub fn parse_line(&self, line: &str) -> Result<Post, ParseError> {
        let raw: RawPost = serde_json::from_str(line)?;

        let id = raw.post_id().ok_or(ParseError::MissingField("id"))?;
        let author = raw.author_id().ok_or(ParseError::MissingField("user.id"))?;
        let created_at = raw
            .created_at
            .as_deref()
            .ok_or(ParseError::MissingField("created_at"))
            .and_then(|s| self.parse_timestamp(s))?;
        let text = raw
            .full_text
            .as_deref()
            .or(raw.text.as_deref())
            .ok_or(ParseError::MissingField("text"))?;
        let terms = extract_terms(text);

        let point = raw.point()?;
        let needs_prediction = raw
            .needs_location_prediction
            .unwrap_or(point.is_none());

        match point {
            Some(point) if !needs_prediction => {
                Ok(Post::geotagged(id, author, created_at, terms, point))
            }
            _ => Ok(Post::unlocated(id, author, created_at, terms)),
        }
    }

    /// Parse a timestamp in any of the accepted formats.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>, ParseError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(s, TWITTER_FORMAT) {
            return Ok(dt.with_timezone(&Utc));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return self
                    .timezone
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or_else(|| ParseError::Timestamp(s.to_string()));
            }
        }
        Err(ParseError::Timestamp(s.to_string()))
    }
}

/// Extract the term set of a post body.
pub fn extract_terms(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .filter(|token| !token.starts_with('@') && !is_url(token))
        .flat_map(|token| token.split(|c: char| !c.is_alphanumeric()))
        .map(str::to_lowercase)
        .filter(|term| {
            term.chars().count() >= MIN_TERM_LEN
                && !term.chars().all(|c| c.is_ascii_digit())
                && !STOPWORDS.contains(&term.as_str())
        })
        .collect()
}

fn is_url(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}
