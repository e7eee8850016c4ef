//! Turns free text into a structured booking request.
//!
//! Extraction is lenient: it records what it recognized and the first
//! malformed value it saw. `BookingRequest::quote_blocker` is the one place
//! that decides whether a request is complete enough to quote.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};

use courtside_core::availability::{local_instant, DEFAULT_MAX_DURATION_HOURS};
use courtside_core::domain::reservation::ReservationId;
use courtside_core::errors::ValidationIssue;
use courtside_core::text::{contains_phrase, words};

pub const DEFAULT_DURATION_HOURS: u32 = 1;

/// Canonical sport keyword and the phrases that select it. `futsal` precedes
/// `futebol` so "futebol de salão" resolves to futsal.
const SPORTS: &[(&str, &[&str])] = &[
    ("futsal", &["futsal", "futebol de salao", "futebol sala", "salao"]),
    ("futebol", &["futebol society", "society", "futebol", "soccer", "fut"]),
    ("volei", &["volei", "voleibol", "volleyball"]),
    ("basquete", &["basquete", "basquetebol", "basketball", "basket"]),
    ("tenis", &["tenis", "tennis"]),
];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("segunda", Weekday::Mon),
    ("terca", Weekday::Tue),
    ("quarta", Weekday::Wed),
    ("quinta", Weekday::Thu),
    ("sexta", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

const HOUR_MARKERS: &[&str] = &["as", "das"];
const DURATION_MARKERS: &[&str] = &["por", "durante"];
const HOUR_UNITS: &[&str] = &["hora", "horas", "h", "hrs"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub sport: Option<&'static str>,
    /// `N` from a "quadra N" mention.
    pub court_hint: Option<u32>,
    pub date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub duration_hours: u32,
    pub reference: Option<ReservationId>,
    /// First malformed value found while extracting (`25h`, `19:30`, `31/02`).
    pub issue: Option<ValidationIssue>,
}

impl Default for BookingRequest {
    fn default() -> Self {
        Self {
            sport: None,
            court_hint: None,
            date: None,
            hour: None,
            duration_hours: DEFAULT_DURATION_HOURS,
            reference: None,
            issue: None,
        }
    }
}

impl BookingRequest {
    /// Why this request cannot be quoted yet, if anything. Malformed values
    /// win over missing ones; the hour is never defaulted.
    pub fn quote_blocker(&self) -> Option<ValidationIssue> {
        if let Some(issue) = &self.issue {
            return Some(issue.clone());
        }
        if self.date.is_none() {
            return Some(ValidationIssue::MissingDate);
        }
        if self.hour.is_none() {
            return Some(ValidationIssue::MissingTime);
        }
        None
    }

    /// UTC start instant of the requested local date and hour.
    pub fn start(&self, offset: FixedOffset) -> Result<DateTime<Utc>, ValidationIssue> {
        if let Some(issue) = self.quote_blocker() {
            return Err(issue);
        }
        let (Some(date), Some(hour)) = (self.date, self.hour) else {
            return Err(ValidationIssue::MissingDate);
        };
        local_instant(offset, date, hour).ok_or(ValidationIssue::InvalidDate)
    }

    pub fn has_slot(&self) -> bool {
        self.date.is_some() && self.hour.is_some() && self.issue.is_none()
    }
}

/// An `N horas` mention and whether `por`/`durante` introduced it.
struct DurationMention {
    amount: u32,
    marked: bool,
}

#[derive(Clone, Debug)]
pub struct RequestExtractor {
    max_duration_hours: u32,
}

impl Default for RequestExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestExtractor {
    pub fn new() -> Self {
        Self { max_duration_hours: DEFAULT_MAX_DURATION_HOURS }
    }

    /// Longest bookable block; a bare `N horas` above it reads as a start time.
    pub fn with_max_duration(max_duration_hours: u32) -> Self {
        Self { max_duration_hours }
    }

    /// Extracts a request relative to the establishment-local `today`.
    pub fn extract(&self, text: &str, today: NaiveDate) -> BookingRequest {
        let tokens = words(text);
        let mut request = BookingRequest {
            sport: extract_sport(&tokens),
            court_hint: extract_court_hint(&tokens),
            reference: tokens.iter().find_map(|token| ReservationId::parse(token)),
            ..BookingRequest::default()
        };
        let mut issues = Vec::new();

        match extract_date(&tokens, today) {
            Ok(date) => request.date = date,
            Err(issue) => issues.push(issue),
        }

        let mut consumed = vec![false; tokens.len()];
        match extract_hour(&tokens, &mut consumed) {
            Ok(hour) => request.hour = hour,
            Err(issue) => issues.push(issue),
        }

        if let Some(mention) = extract_duration(&tokens, &consumed) {
            // "às 18 horas" is a start time: no duration marker and too long to book
            let reads_as_hour = !mention.marked
                && mention.amount > self.max_duration_hours
                && mention.amount <= 23
                && request.hour.is_none();
            if reads_as_hour {
                request.hour = Some(mention.amount);
            } else {
                request.duration_hours = mention.amount;
            }
        }

        request.issue = issues.into_iter().next();
        request
    }
}

fn extract_sport(tokens: &[String]) -> Option<&'static str> {
    SPORTS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| contains_phrase(tokens, phrase)))
        .map(|(keyword, _)| *keyword)
}

fn extract_court_hint(tokens: &[String]) -> Option<u32> {
    tokens.windows(2).find_map(|pair| match pair {
        [word, number] if word == "quadra" => number.parse::<u32>().ok(),
        _ => None,
    })
}

fn extract_date(tokens: &[String], today: NaiveDate) -> Result<Option<NaiveDate>, ValidationIssue> {
    if contains_phrase(tokens, "depois de amanha") {
        return Ok(Some(today + Duration::days(2)));
    }
    if contains_phrase(tokens, "amanha") {
        return Ok(Some(today + Duration::days(1)));
    }
    if contains_phrase(tokens, "hoje") {
        return Ok(Some(today));
    }

    for (index, token) in tokens.iter().enumerate() {
        if token.contains('/') {
            return parse_slash_date(token, today).map(Some);
        }
        if token == "dia" {
            if let Some(day) = tokens.get(index + 1).and_then(|next| next.parse::<u32>().ok()) {
                return next_day_of_month(day, today).map(Some);
            }
        }
    }

    for token in tokens {
        let stem = token.strip_suffix("-feira").unwrap_or(token);
        if let Some((_, weekday)) = WEEKDAYS.iter().find(|(name, _)| *name == stem) {
            return Ok(Some(next_weekday(*weekday, today)));
        }
    }

    Ok(None)
}

/// `dd/mm` or `dd/mm/yyyy` (two-digit years are 20yy). A `dd/mm` already past
/// this year rolls over to the next one.
fn parse_slash_date(token: &str, today: NaiveDate) -> Result<NaiveDate, ValidationIssue> {
    let parts = token.split('/').collect::<Vec<_>>();
    let parse = |value: &str| value.parse::<u32>().map_err(|_| ValidationIssue::InvalidDate);

    match parts.as_slice() {
        [day, month] => {
            let (day, month) = (parse(day)?, parse(month)?);
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Ok(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day)
                    .ok_or(ValidationIssue::InvalidDate),
            }
        }
        [day, month, year] => {
            let (day, month) = (parse(day)?, parse(month)?);
            let year = year.parse::<i32>().map_err(|_| ValidationIssue::InvalidDate)?;
            let year = if year < 100 { 2000 + year } else { year };
            NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationIssue::InvalidDate)
        }
        _ => Err(ValidationIssue::InvalidDate),
    }
}

fn next_day_of_month(day: u32, today: NaiveDate) -> Result<NaiveDate, ValidationIssue> {
    if let Some(date) = NaiveDate::from_ymd_opt(today.year(), today.month(), day) {
        if date >= today {
            return Ok(date);
        }
    }
    let (year, month) =
        if today.month() == 12 { (today.year() + 1, 1) } else { (today.year(), today.month() + 1) };
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationIssue::InvalidDate)
}

/// Today counts as the next occurrence of its own weekday.
fn next_weekday(weekday: Weekday, today: NaiveDate) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    today + Duration::days(i64::from(ahead))
}

fn extract_hour(tokens: &[String], consumed: &mut [bool]) -> Result<Option<u32>, ValidationIssue> {
    for (index, token) in tokens.iter().enumerate() {
        let previous = index.checked_sub(1).and_then(|prev| tokens.get(prev)).map(String::as_str);

        let clock = match token.as_str() {
            "meio-dia" => Some((12, 0)),
            "meia-noite" => Some((0, 0)),
            _ => parse_clock(token),
        };

        let candidate = match clock {
            // "por 2h" is a duration, not a start time
            Some(_) if previous.is_some_and(|word| DURATION_MARKERS.contains(&word)) => None,
            Some(clock) => Some(clock),
            None => match (previous, token.parse::<u32>()) {
                (Some(marker), Ok(hour))
                    if HOUR_MARKERS.contains(&marker) && token.len() <= 2 =>
                {
                    Some((hour, 0))
                }
                _ => None,
            },
        };

        if let Some((hour, minute)) = candidate {
            consumed[index] = true;
            if hour > 23 {
                return Err(ValidationIssue::InvalidHour { hour });
            }
            if minute != 0 {
                return Err(ValidationIssue::NotWholeHour { minute });
            }
            return Ok(Some(hour));
        }
    }
    Ok(None)
}

/// `19h`, `19hs`, `19h00`, `19:00`, `19:00h`.
fn parse_clock(token: &str) -> Option<(u32, u32)> {
    let all_digits = |value: &str| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit());

    let (hour_part, minute_part) = if let Some((hour, rest)) = token.split_once(':') {
        (hour, rest.trim_end_matches('h'))
    } else if let Some(hour) =
        ["hrs", "hs", "h"].iter().find_map(|suffix| token.strip_suffix(suffix))
    {
        (hour, "0")
    } else if let Some((hour, minute)) = token.split_once('h') {
        (hour, minute)
    } else {
        return None;
    };

    if !all_digits(hour_part) || hour_part.len() > 2 || !all_digits(minute_part) {
        return None;
    }
    if minute_part.len() > 2 {
        return None;
    }
    Some((hour_part.parse().ok()?, minute_part.parse().ok()?))
}

fn extract_duration(tokens: &[String], consumed: &[bool]) -> Option<DurationMention> {
    for (index, token) in tokens.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let previous = index.checked_sub(1).and_then(|prev| tokens.get(prev)).map(String::as_str);
        let next = tokens.get(index + 1).map(String::as_str);
        let marked = previous.is_some_and(|word| DURATION_MARKERS.contains(&word));

        if let Ok(amount) = token.parse::<u32>() {
            if next.is_some_and(|unit| HOUR_UNITS.contains(&unit)) {
                return Some(DurationMention { amount, marked });
            }
        }

        let compact = ["horas", "hora", "hrs", "hs", "h"]
            .iter()
            .find_map(|suffix| token.strip_suffix(suffix))
            .and_then(|amount| amount.parse::<u32>().ok());
        if let Some(amount) = compact {
            if marked || token.ends_with("hora") || token.ends_with("horas") {
                return Some(DurationMention { amount, marked });
            }
        }
    }
    None
}
