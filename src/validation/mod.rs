/// Input validation for surf sessions and shared request parameters
///
/// Multipart session forms arrive as loose text fields; [`SessionFields::from_form`]
/// checks every field and reports all violations together.
use crate::error::{FieldError, SurfError, SurfResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Compass point the wind blew from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl WindDirection {
    pub const ALL: [WindDirection; 8] = [
        WindDirection::N,
        WindDirection::NE,
        WindDirection::E,
        WindDirection::SE,
        WindDirection::S,
        WindDirection::SW,
        WindDirection::W,
        WindDirection::NW,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::N => "N",
            WindDirection::NE => "NE",
            WindDirection::E => "E",
            WindDirection::SE => "SE",
            WindDirection::S => "S",
            WindDirection::SW => "SW",
            WindDirection::W => "W",
            WindDirection::NW => "NW",
        }
    }
}

impl FromStr for WindDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|direction| direction.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the tide during the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideType {
    Low,
    Rising,
    High,
    Falling,
}

impl TideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TideType::Low => "low",
            TideType::Rising => "rising",
            TideType::High => "high",
            TideType::Falling => "falling",
        }
    }
}

impl FromStr for TideType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TideType::Low),
            "rising" => Ok(TideType::Rising),
            "high" => Ok(TideType::High),
            "falling" => Ok(TideType::Falling),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated session attributes, shared by create and update
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFields {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub wave_height: f64,
    pub wave_period: f64,
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub tide_type: TideType,
    pub rating: i32,
}

impl SessionFields {
    /// Validate the text fields of a session form
    pub fn from_form(form: &HashMap<String, String>) -> SurfResult<Self> {
        let mut errors = Vec::new();
        let text = |name: &str| form.get(name).map(|v| v.trim()).unwrap_or("");

        let title = text("title");
        if !(1..=100).contains(&title.chars().count()) {
            errors.push(FieldError::new("title", "Title must be 1-100 characters"));
        }

        let description = text("description");
        if description.chars().count() > 500 {
            errors.push(FieldError::new(
                "description",
                "Description must be at most 500 characters",
            ));
        }

        let location = text("location");
        if !(1..=100).contains(&location.chars().count()) {
            errors.push(FieldError::new("location", "Location must be 1-100 characters"));
        }

        let wave_height = bounded_float(text("wave_height"), 0.0, 30.0);
        if wave_height.is_none() {
            errors.push(FieldError::new(
                "wave_height",
                "Wave height must be a number between 0 and 30",
            ));
        }

        let wave_period = bounded_float(text("wave_period"), 0.0, 30.0);
        if wave_period.is_none() {
            errors.push(FieldError::new(
                "wave_period",
                "Wave period must be a number between 0 and 30",
            ));
        }

        let wind_speed = bounded_float(text("wind_speed"), 0.0, 100.0);
        if wind_speed.is_none() {
            errors.push(FieldError::new(
                "wind_speed",
                "Wind speed must be a number between 0 and 100",
            ));
        }

        let wind_direction = text("wind_direction").parse::<WindDirection>().ok();
        if wind_direction.is_none() {
            errors.push(FieldError::new(
                "wind_direction",
                "Wind direction must be one of N, NE, E, SE, S, SW, W, NW",
            ));
        }

        let tide_type = text("tide_type").parse::<TideType>().ok();
        if tide_type.is_none() {
            errors.push(FieldError::new(
                "tide_type",
                "Tide type must be one of low, rising, high, falling",
            ));
        }

        let rating = text("rating")
            .parse::<i32>()
            .ok()
            .filter(|r| (1..=5).contains(r));
        if rating.is_none() {
            errors.push(FieldError::new(
                "rating",
                "Rating must be an integer between 1 and 5",
            ));
        }

        match (wave_height, wave_period, wind_speed, wind_direction, tide_type, rating) {
            (
                Some(wave_height),
                Some(wave_period),
                Some(wind_speed),
                Some(wind_direction),
                Some(tide_type),
                Some(rating),
            ) if errors.is_empty() => Ok(Self {
                title: title.to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
                location: location.to_string(),
                wave_height,
                wave_period,
                wind_speed,
                wind_direction,
                tide_type,
                rating,
            }),
            _ => Err(SurfError::Validation(errors)),
        }
    }
}

fn bounded_float(value: &str, min: f64, max: f64) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= min && *v <= max)
}

/// What to do with a session's image on create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    /// A new file was uploaded
    Replace(String),
    /// `keep_current_image=false` was sent without an upload
    Clear,
    Keep,
}

impl ImageChange {
    /// Only the exact value `false` clears; anything else keeps the image
    pub fn resolve(uploaded_url: Option<String>, keep_current_image: Option<&str>) -> Self {
        match (uploaded_url, keep_current_image) {
            (Some(url), _) => ImageChange::Replace(url),
            (None, Some("false")) => ImageChange::Clear,
            (None, _) => ImageChange::Keep,
        }
    }

    /// The image URL after applying this change to `current`
    pub fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            ImageChange::Replace(url) => Some(url.clone()),
            ImageChange::Clear => None,
            ImageChange::Keep => current,
        }
    }
}

/// Raw `page`/`limit` query parameters, parsed leniently
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// Resolve to `(page, limit)`; unparsable or non-positive values fall back to defaults
    pub fn resolve(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let positive = |v: &Option<String>| {
            v.as_deref()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .filter(|n| *n > 0)
        };

        let page = positive(&self.page).unwrap_or(1);
        let limit = positive(&self.limit).unwrap_or(default_limit).min(max_limit);
        (page, limit)
    }
}

/// Pagination metadata returned alongside list results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };

        Self {
            current_page: page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn offset(page: i64, limit: i64) -> i64 {
        (page - 1).saturating_mul(limit)
    }
}

/// Canonical key of the unordered pair of users in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub low: Uuid,
    pub high: Uuid,
}

impl ConversationKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// The participant that is not `me`
    pub fn other(&self, me: Uuid) -> Uuid {
        if self.low == me {
            self.high
        } else {
            self.low
        }
    }
}
