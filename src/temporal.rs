// ⏳ Temporal Extractor
// Resolves a calendar date and a clock time from free Portuguese text
// through a fixed precedence chain. Pure: the only input besides the text
// is the reference instant, and a miss is an absent field, never an error.
//
// Date chain (first match wins):
//   1. D/M/YY or D-M-YYYY          (two-digit years → 2000 + YY)
//   2. D/M                         (reference year)
//   3. "18 de dezembro"            (reference year)
//   4. depois de amanhã → amanhã → ontem
//   5. weekday name                (next occurrence, never today)
//   6. policy fallback             (today, or nothing under `Strict`)
//
// Time chain (first match wins):
//   1. 19:30 / 19h30
//   2. 19h / 19 horas / 19 hrs
//   3. às 19

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text::normalize;
use crate::weekday::{iso_weekday, next_occurrence};

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Month names → month number, accented and plain spellings
pub const MONTHS: &[(&str, u32)] = &[
    ("janeiro", 1),
    ("fevereiro", 2),
    ("marco", 3),
    ("março", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

fn month_number(name: &str) -> Option<u32> {
    let name = normalize(name);
    MONTHS
        .iter()
        .find(|(candidate, _)| normalize(candidate) == name)
        .map(|(_, number)| *number)
}

lazy_static! {
    static ref FULL_NUMERIC_DATE: Regex =
        Regex::new(r"\b([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{2,4})\b")
            .expect("full numeric date pattern");
    static ref PARTIAL_NUMERIC_DATE: Regex =
        Regex::new(r"\b([0-9]{1,2})[/-]([0-9]{1,2})\b").expect("partial numeric date pattern");
    static ref SPELLED_DATE: Regex = {
        let mut names: Vec<String> = MONTHS.iter().map(|(name, _)| normalize(name)).collect();
        names.dedup();
        let pattern = format!(r"\b([0-9]{{1,2}})\s*(?:de\s+)?({})\b", names.join("|"));
        Regex::new(&pattern).expect("spelled date pattern")
    };
    static ref WEEKDAY_NAME: Regex =
        Regex::new(r"\b(segunda|terca|quarta|quinta|sexta|sabado|domingo)(?:-feira)?\b")
            .expect("weekday pattern");
    static ref TODAY_WORD: Regex = Regex::new(r"\bhoje\b").expect("today pattern");
    static ref HOUR_MINUTE: Regex =
        Regex::new(r"\b([0-9]{1,2})[:h]([0-9]{1,2})\b").expect("hour:minute pattern");
    static ref HOUR_ONLY: Regex =
        Regex::new(r"\b([0-9]{1,2})\s*(?:h|horas|hrs)\b").expect("hour-only pattern");
    static ref AT_HOUR: Regex = Regex::new(r"\bas\s+([0-9]{1,2})\b").expect("at-hour pattern");
}

// ============================================================================
// TEMPORAL CANDIDATE
// ============================================================================

/// Best-effort date/time guess, produced per message and merged into the intent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalCandidate {
    #[serde(rename = "data")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "hora", with = "hhmm", default)]
    pub time: Option<NaiveTime>,
}

impl TemporalCandidate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none()
    }

    /// Time as the wire string ("07:05")
    pub fn time_string(&self) -> Option<String> {
        self.time.map(format_hhmm)
    }
}

/// Render a clock time as zero-padded 24h `HH:MM`
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse `HH:MM` / `H:MM` (seconds tolerated and dropped)
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .and_then(|t| t.with_second(0))
}

/// Serde adapter: `Option<NaiveTime>` ⇄ `"HH:MM"` or null
pub mod hhmm {
    use super::{format_hhmm, parse_hhmm};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => s.serialize_str(&format_hhmm(*time)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(parse_hhmm))
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// What to do when no date signal is found
///
/// The two policies coexist on purpose and are picked per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatePolicy {
    /// Primary path: no date signal means "today"
    #[default]
    AssumeToday,
    /// Only explicit signals count ("hoje" included); otherwise no date
    Strict,
}

/// Which strategy produced the date (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    FullNumeric,
    PartialNumeric,
    Spelled,
    Relative,
    Weekday,
    Today,
    Fallback,
}

// ============================================================================
// EXTRACTOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalExtractor {
    pub policy: DatePolicy,
}

impl TemporalExtractor {
    /// Primary extractor ("assume today")
    pub fn new() -> Self {
        TemporalExtractor {
            policy: DatePolicy::AssumeToday,
        }
    }

    /// Extractor that returns no date when nothing is recognizable
    pub fn strict() -> Self {
        TemporalExtractor {
            policy: DatePolicy::Strict,
        }
    }

    /// Extract date and time from `text` relative to `now`
    pub fn extract(&self, text: &str, now: NaiveDateTime) -> TemporalCandidate {
        let normalized = normalize(text);
        let today = now.date();

        let date = self.resolve_date(&normalized, today);
        let time = resolve_time(&normalized);

        if let Some((value, source)) = date {
            debug!(date = %value, ?source, policy = ?self.policy, "temporal date resolved");
        }

        TemporalCandidate {
            date: date.map(|(value, _)| value),
            time,
        }
    }

    fn resolve_date(&self, normalized: &str, today: NaiveDate) -> Option<(NaiveDate, DateSource)> {
        if let Some(date) = full_numeric_date(normalized) {
            return Some((date, DateSource::FullNumeric));
        }
        if let Some(date) = partial_numeric_date(normalized, today.year()) {
            return Some((date, DateSource::PartialNumeric));
        }
        if let Some(date) = spelled_date(normalized, today.year()) {
            return Some((date, DateSource::Spelled));
        }
        if let Some(date) = relative_date(normalized, today) {
            return Some((date, DateSource::Relative));
        }
        if let Some(date) = weekday_date(normalized, today) {
            return Some((date, DateSource::Weekday));
        }

        match self.policy {
            DatePolicy::AssumeToday => Some((today, DateSource::Fallback)),
            DatePolicy::Strict if TODAY_WORD.is_match(normalized) => Some((today, DateSource::Today)),
            DatePolicy::Strict => None,
        }
    }
}

// ============================================================================
// DATE STRATEGIES
// ============================================================================

fn number(caps: &Captures, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn full_numeric_date(normalized: &str) -> Option<NaiveDate> {
    let caps = FULL_NUMERIC_DATE.captures(normalized)?;
    let day = number(&caps, 1)?;
    let month = number(&caps, 2)?;
    let raw_year = caps.get(3)?.as_str();
    let year: i32 = raw_year.parse().ok()?;
    let year = if raw_year.len() == 2 { 2000 + year } else { year };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn partial_numeric_date(normalized: &str, year: i32) -> Option<NaiveDate> {
    let caps = PARTIAL_NUMERIC_DATE.captures(normalized)?;
    NaiveDate::from_ymd_opt(year, number(&caps, 2)?, number(&caps, 1)?)
}

fn spelled_date(normalized: &str, year: i32) -> Option<NaiveDate> {
    let caps = SPELLED_DATE.captures(normalized)?;
    let day = number(&caps, 1)?;
    let month = month_number(caps.get(2)?.as_str())?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn relative_date(normalized: &str, today: NaiveDate) -> Option<NaiveDate> {
    if normalized.contains("depois de amanha") {
        Some(today + Duration::days(2))
    } else if normalized.contains("amanha") {
        Some(today + Duration::days(1))
    } else if normalized.contains("ontem") {
        Some(today - Duration::days(1))
    } else {
        None
    }
}

fn weekday_date(normalized: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = WEEKDAY_NAME.captures(normalized)?;
    let iso = iso_weekday(caps.get(1)?.as_str())?;
    Some(next_occurrence(iso, today))
}

// ============================================================================
// TIME STRATEGIES
// ============================================================================

fn resolve_time(normalized: &str) -> Option<NaiveTime> {
    hour_minute(normalized)
        .or_else(|| hour_only(normalized))
        .or_else(|| at_hour(normalized))
}

/// A single captured minute digit counts as tens: "19h3" → 19:30
fn clock_time(hour: &str, minute: Option<&str>) -> Option<NaiveTime> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = match minute {
        None => 0,
        Some(raw) if raw.len() == 1 => raw.parse::<u32>().ok()? * 10,
        Some(raw) => raw.parse().ok()?,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn hour_minute(normalized: &str) -> Option<NaiveTime> {
    let caps = HOUR_MINUTE.captures(normalized)?;
    clock_time(caps.get(1)?.as_str(), Some(caps.get(2)?.as_str()))
}

fn hour_only(normalized: &str) -> Option<NaiveTime> {
    let caps = HOUR_ONLY.captures(normalized)?;
    clock_time(caps.get(1)?.as_str(), None)
}

fn at_hour(normalized: &str) -> Option<NaiveTime> {
    let caps = AT_HOUR.captures(normalized)?;
    clock_time(caps.get(1)?.as_str(), None)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Tuesday 2025-06-10, 09:00
    fn reference() -> NaiveDateTime {
        date(2025, 6, 10).and_hms_opt(9, 0, 0).unwrap()
    }

    fn extract(text: &str) -> TemporalCandidate {
        TemporalExtractor::new().extract(text, reference())
    }

    fn strict(text: &str) -> TemporalCandidate {
        TemporalExtractor::strict().extract(text, reference())
    }

    #[test]
    fn test_full_numeric_two_digit_year() {
        assert_eq!(extract("pagamento 18/12/25").date, Some(date(2025, 12, 18)));
        assert_eq!(extract("boleto 01-02-30").date, Some(date(2030, 2, 1)));
    }

    #[test]
    fn test_full_numeric_four_digit_year() {
        assert_eq!(extract("aluguel 5-1-2026").date, Some(date(2026, 1, 5)));
    }

    #[test]
    fn test_full_numeric_rejects_impossible_date() {
        // Day 32 fails every numeric strategy, then falls back to today
        assert_eq!(extract("conta 32/12/25").date, Some(date(2025, 6, 10)));
        assert_eq!(strict("conta 32/12/25").date, None);
        assert_eq!(strict("conta 31/04/2025").date, None);
    }

    #[test]
    fn test_partial_numeric_uses_reference_year() {
        assert_eq!(extract("reunião 05/03").date, Some(date(2025, 3, 5)));
        assert_eq!(extract("dentista 5-3").date, Some(date(2025, 3, 5)));
    }

    #[test]
    fn test_spelled_date_with_and_without_de() {
        let with_de = extract("18 de dezembro");
        let without_de = extract("18 dezembro");

        assert_eq!(with_de.date, Some(date(2025, 12, 18)));
        assert_eq!(with_de.date, without_de.date);
    }

    #[test]
    fn test_spelled_date_is_diacritic_insensitive() {
        assert_eq!(extract("dia 3 de março").date, Some(date(2025, 3, 3)));
        assert_eq!(extract("dia 3 de marco").date, Some(date(2025, 3, 3)));
        assert_eq!(extract("dia 3 de MARÇO").date, Some(date(2025, 3, 3)));
    }

    #[test]
    fn test_spelled_date_rejects_impossible_day() {
        assert_eq!(strict("31 de fevereiro").date, None);
    }

    #[test]
    fn test_numeric_beats_spelled() {
        assert_eq!(
            extract("18 de dezembro, ou melhor 20/12").date,
            Some(date(2025, 12, 20))
        );
    }

    #[test]
    fn test_relative_expressions() {
        assert_eq!(extract("depois de amanhã").date, Some(date(2025, 6, 12)));
        assert_eq!(extract("amanhã").date, Some(date(2025, 6, 11)));
        assert_eq!(extract("amanha cedo").date, Some(date(2025, 6, 11)));
        assert_eq!(extract("gastei ontem").date, Some(date(2025, 6, 9)));
    }

    #[test]
    fn test_relative_beats_weekday() {
        assert_eq!(extract("amanhã, sexta").date, Some(date(2025, 6, 11)));
    }

    #[test]
    fn test_weekday_next_occurrence() {
        assert_eq!(extract("academia na sexta").date, Some(date(2025, 6, 13)));
        assert_eq!(extract("reunião segunda-feira").date, Some(date(2025, 6, 16)));
        assert_eq!(extract("feira no sábado").date, Some(date(2025, 6, 14)));
    }

    #[test]
    fn test_weekday_same_day_goes_to_next_week() {
        assert_eq!(extract("terça tem aula").date, Some(date(2025, 6, 17)));
    }

    #[test]
    fn test_weekday_requires_whole_word() {
        // "quintal" is not "quinta"
        assert_eq!(strict("limpar o quintal").date, None);
    }

    #[test]
    fn test_fallback_policies_differ() {
        assert_eq!(extract("comprar pão").date, Some(date(2025, 6, 10)));
        assert_eq!(strict("comprar pão").date, None);
        assert_eq!(strict("comprar pão hoje").date, Some(date(2025, 6, 10)));
    }

    #[test]
    fn test_time_hour_minute() {
        assert_eq!(extract("reunião 19:30").time, Some(time(19, 30)));
        assert_eq!(extract("reunião 19h30").time, Some(time(19, 30)));
        assert_eq!(extract("café 7:05").time, Some(time(7, 5)));
    }

    #[test]
    fn test_time_single_minute_digit_is_tens() {
        assert_eq!(extract("jantar 19h3").time, Some(time(19, 30)));
        assert_eq!(extract("treino 6:5").time, Some(time(6, 50)));
    }

    #[test]
    fn test_time_hour_only() {
        assert_eq!(extract("dentista 9h").time, Some(time(9, 0)));
        assert_eq!(extract("dentista 14 horas").time, Some(time(14, 0)));
        assert_eq!(extract("dentista 8 hrs").time, Some(time(8, 0)));
    }

    #[test]
    fn test_time_preposition_hour() {
        assert_eq!(extract("amanhã às 7").time, Some(time(7, 0)));
        assert_eq!(extract("amanha as 21").time, Some(time(21, 0)));
    }

    #[test]
    fn test_time_precedence() {
        let candidate = extract("às 19, na verdade 19:30");
        assert_eq!(candidate.time, Some(time(19, 30)));
        assert_eq!(candidate.time_string(), Some("19:30".to_string()));
    }

    #[test]
    fn test_time_invalid_hour_falls_through() {
        assert_eq!(extract("às 25").time, None);
        assert_eq!(extract("código 99:99 às 8").time, Some(time(8, 0)));
    }

    #[test]
    fn test_no_time() {
        let candidate = extract("comprar leite");
        assert_eq!(candidate.time, None);
        assert_eq!(candidate.time_string(), None);
    }

    #[test]
    fn test_date_and_time_together() {
        let candidate = extract("consulta 18/12 às 15h30");
        assert_eq!(candidate.date, Some(date(2025, 12, 18)));
        assert_eq!(candidate.time, Some(time(15, 30)));
    }

    #[test]
    fn test_candidate_serializes_as_wire_strings() {
        let candidate = extract("18/12/25 9h");
        let json = serde_json::to_value(candidate).unwrap();

        assert_eq!(json["data"], "2025-12-18");
        assert_eq!(json["hora"], "09:00");

        let empty = serde_json::to_value(strict("nada")).unwrap();
        assert!(empty["data"].is_null());
        assert!(empty["hora"].is_null());
        assert!(strict("nada").is_empty());
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("7:05"), Some(time(7, 5)));
        assert_eq!(parse_hhmm("19:30:00"), Some(time(19, 30)));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("null"), None);
    }
}
