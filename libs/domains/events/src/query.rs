//! Validation of raw listing parameters

use crate::error::{EventError, Result};
use crate::models::ListEventsQuery;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use mongodb::bson::oid::ObjectId;
use std::str::FromStr;
use strum::{Display, EnumString};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 5;
/// Larger `limit` values are capped to this.
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only the literal `asc` sorts ascending.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// Fields a listing can be sorted by, named as they appear in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum SortField {
    #[strum(to_string = "_id", serialize = "id")]
    Id,
    #[strum(serialize = "userId")]
    UserId,
    #[strum(serialize = "name")]
    Name,
    #[strum(serialize = "location")]
    Location,
    #[default]
    #[strum(serialize = "start_date")]
    StartDate,
    #[strum(serialize = "end_date")]
    EndDate,
    #[strum(serialize = "description")]
    Description,
    #[strum(serialize = "category")]
    Category,
    #[strum(serialize = "category_name")]
    CategoryName,
    #[strum(serialize = "image")]
    Image,
    #[strum(serialize = "createdAt")]
    CreatedAt,
}

impl SortField {
    /// Document path before projection.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::UserId => "userId",
            Self::Name => "name",
            Self::Location => "location",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::Description => "description",
            Self::Category => "category",
            Self::CategoryName => "categories.name",
            Self::Image => "image",
            Self::CreatedAt => "createdAt",
        }
    }
}

/// Validated listing request
#[derive(Debug, Clone, PartialEq)]
pub struct ListingParams {
    pub search: Option<String>,
    pub is_search: bool,
    pub user: Option<ObjectId>,
    pub category: Option<ObjectId>,
    pub id: Option<ObjectId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub sort_by: SortField,
    pub sort_order: SortDirection,
    pub group: bool,
    pub page: u64,
    pub limit: u64,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            search: None,
            is_search: false,
            user: None,
            category: None,
            id: None,
            start: None,
            end: None,
            sort_by: SortField::default(),
            sort_order: SortDirection::default(),
            group: true,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TryFrom<ListEventsQuery> for ListingParams {
    type Error = EventError;

    fn try_from(query: ListEventsQuery) -> Result<Self> {
        let search = present(query.q);
        let sort_by = match present(query.sort_by) {
            Some(raw) => SortField::from_str(&raw).map_err(|_| EventError::InvalidSortField(raw))?,
            None => SortField::default(),
        };

        Ok(Self {
            is_search: search.is_some(),
            search,
            user: parse_object_id("user", query.user)?,
            category: parse_object_id("category", query.category)?,
            id: parse_object_id("id", query.id)?,
            start: parse_date("start", query.start)?,
            end: parse_date("end", query.end)?,
            sort_by,
            sort_order: SortDirection::from_param(query.sort_order.as_deref()),
            group: parse_group(query.group.as_deref()),
            page: parse_positive(query.page.as_deref(), DEFAULT_PAGE),
            limit: parse_positive(query.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_object_id(field: &'static str, raw: Option<String>) -> Result<Option<ObjectId>> {
    match present(raw) {
        Some(value) => ObjectId::parse_str(&value)
            .map(Some)
            .map_err(|_| EventError::InvalidId { field, value }),
        None => Ok(None),
    }
}

fn parse_date(field: &'static str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = present(raw) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&value, format) {
            return Ok(Some(Utc.from_utc_datetime(&naive)));
        }
    }
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(Utc.from_utc_datetime(&naive)))
        .ok_or(EventError::InvalidDate { field, value })
}

/// Integer value of the leading `[+-]digits` prefix, ignoring leading
/// whitespace. A `0x`/`0X` prefix reads hex digits instead. `None` when
/// there are no digits.
fn leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, rest) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let digits = rest
        .bytes()
        .take_while(|b| b.is_ascii_digit() || (radix == 16 && b.is_ascii_hexdigit()))
        .count();
    if digits == 0 {
        return None;
    }
    let value = i64::from_str_radix(&rest[..digits], radix).ok()?;
    Some(if negative { -value } else { value })
}

fn parse_group(raw: Option<&str>) -> bool {
    match raw {
        Some("false") => false,
        Some(value) => leading_int(value) != Some(0),
        None => true,
    }
}

fn parse_positive(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(leading_int)
        .filter(|value| *value > 0)
        .map(|value| value as u64)
        .unwrap_or(default)
}

pub fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
}

/// Last millisecond of the UTC day.
pub fn end_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(dt) + Duration::days(1) - Duration::milliseconds(1)
}
