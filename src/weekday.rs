// 📅 Weekday Resolver
// Portuguese weekday names → ISO weekday (Monday = 1 … Sunday = 7)
// and the "next occurrence" arithmetic used by the temporal extractor.

use chrono::{Datelike, Duration, NaiveDate};

use crate::text::normalize_token;

/// Immutable lookup table, accented and unaccented spellings
pub const WEEKDAYS: &[(&str, u32)] = &[
    ("segunda", 1),
    ("terca", 2),
    ("terça", 2),
    ("quarta", 3),
    ("quinta", 4),
    ("sexta", 5),
    ("sabado", 6),
    ("sábado", 6),
    ("domingo", 7),
];

/// Look up the ISO weekday for a localized name
///
/// Accepts the bare name or the "-feira" form ("terça-feira").
pub fn iso_weekday(name: &str) -> Option<u32> {
    let token = normalize_token(name);
    let token = token.strip_suffix("-feira").unwrap_or(&token);

    WEEKDAYS
        .iter()
        .find(|(candidate, _)| normalize_token(candidate) == token)
        .map(|(_, iso)| *iso)
}

/// Next date falling on `iso`, strictly after `today`
///
/// When today already is that weekday the result is one week later.
pub fn next_occurrence(iso: u32, today: NaiveDate) -> NaiveDate {
    let current = today.weekday().number_from_monday() as i64;
    let mut diff = iso as i64 - current;
    if diff <= 0 {
        diff += 7;
    }
    today + Duration::days(diff)
}
