//! Time expressions
//!
//! Pulls timeframe and comparison phrases out of an utterance. Relative phrases
//! go through fixed lookup tables; absolute dates parse to ranges. Every
//! consumed span is blanked in the working text so later extraction passes do
//! not see it again.

use crate::entities::{CompareTo, DateRange, RelativePeriod, Timeframe};
use chrono::{Duration, Months, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::ops::Range;

const MONTH: &str = concat!(
    r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|",
    r"aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?"
);
const COMPARE_LEAD: &str = concat!(
    r"(?:vs\.?|versus|compared\s+(?:to|with)|compare\s+(?:to|with)|against|relative\s+to)",
    r"\s+(?:the\s+)?"
);

fn date_pattern() -> String {
    format!(
        concat!(
            r"(?:\d{{4}}-\d{{1,2}}-\d{{1,2}}|\d{{1,2}}/\d{{1,2}}/\d{{4}}",
            r"|\d{{1,2}}(?:st|nd|rd|th)?\s+{m},?\s+\d{{4}}",
            r"|{m}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}})"
        ),
        m = MONTH
    )
}

lazy_static! {
    static ref DATE_RANGE: Regex = Regex::new(&format!(
        r"\b(?:from\s+|between\s+)?({d})\s*(?:to|and|until|till|through|-)\s*({d})",
        d = date_pattern()
    ))
    .unwrap();
    static ref SINCE_DATE: Regex = Regex::new(&format!(r"\bsince\s+({d})", d = date_pattern())).unwrap();
    static ref SINGLE_DATE: Regex =
        Regex::new(&format!(r"\b(?:on\s+|as\s+of\s+)?({d})", d = date_pattern())).unwrap();
    static ref MONTH_YEAR: Regex =
        Regex::new(&format!(r"\b(?:in\s+|during\s+)?({m})\s+(\d{{4}})\b", m = MONTH)).unwrap();
    static ref PAST_N: Regex = Regex::new(concat!(
        r"\b(?:past|last|previous|trailing)\s+",
        r"(\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|fourteen|thirty|sixty|ninety)",
        r"\s+(hours?|days?|weeks?|months?)\b"
    ))
    .unwrap();
    static ref PAST_N_BN: Regex = Regex::new(r"(?:গত|বিগত)\s*(\d{1,3})\s*(ঘণ্টা|দিন|সপ্তাহ|মাস)\S*").unwrap();

    /// Relative period lookup table, most specific phrases first
    static ref RELATIVE_PERIODS: Vec<(Regex, RelativePeriod)> = [
        (r"\btoday(?:'s)?\b", RelativePeriod::Today),
        (r"\byesterday(?:'s)?\b", RelativePeriod::Yesterday),
        (r"\bmonth\s+to\s+date\b|\bmtd\b", RelativePeriod::MonthToDate),
        (r"\byear\s+to\s+date\b|\bytd\b", RelativePeriod::YearToDate),
        (r"\b(?:this|current)\s+week\b", RelativePeriod::ThisWeek),
        (r"\b(?:last|previous|past)\s+week\b", RelativePeriod::LastWeek),
        (r"\b(?:this|current)\s+month\b", RelativePeriod::ThisMonth),
        (r"\b(?:last|previous|past)\s+month\b", RelativePeriod::LastMonth),
        (r"\b(?:this|current)\s+quarter\b", RelativePeriod::ThisQuarter),
        (r"\b(?:last|previous|past)\s+quarter\b", RelativePeriod::LastQuarter),
        (r"\b(?:this|current)\s+year\b", RelativePeriod::ThisYear),
        (r"\b(?:last|previous|past)\s+year\b", RelativePeriod::LastYear),
        (r"গতকাল\S*", RelativePeriod::Yesterday),
        (r"\bআজ\S*", RelativePeriod::Today),
        (r"এই\s+সপ্তাহ\S*", RelativePeriod::ThisWeek),
        (r"গত\s+সপ্তাহ\S*", RelativePeriod::LastWeek),
        (r"এই\s+মাস\S*", RelativePeriod::ThisMonth),
        (r"গত\s+মাস\S*", RelativePeriod::LastMonth),
        (r"এই\s+বছর\S*", RelativePeriod::ThisYear),
        (r"গত\s+বছর\S*", RelativePeriod::LastYear),
    ]
    .iter()
    .map(|(p, v)| (Regex::new(p).unwrap(), *v))
    .collect();

    /// Comparison lookup table
    static ref COMPARISONS: Vec<(Regex, CompareTo)> = {
        let led = [
            (r"same\s+day\s+last\s+week", CompareTo::SameDayLastWeek),
            (r"same\s+day\s+last\s+year", CompareTo::SameDayLastYear),
            (r"same\s+(?:period|time|week|month|quarter)\s+last\s+year", CompareTo::SamePeriodLastYear),
            (r"(?:previous|prior|last)\s+period|period\s+before", CompareTo::PreviousPeriod),
            (r"yesterday|(?:previous|prior)\s+day|day\s+before", CompareTo::PreviousDay),
            (r"(?:last|previous|prior)\s+week|week\s+before", CompareTo::PreviousWeek),
            (r"(?:last|previous|prior)\s+month|month\s+before", CompareTo::PreviousMonth),
            (r"(?:last|previous|prior)\s+quarter|quarter\s+before", CompareTo::PreviousQuarter),
            (r"(?:last|previous|prior)\s+year|year\s+before", CompareTo::PreviousYear),
        ];
        let standalone = [
            (r"\b(?:year\s+over\s+year|yoy)\b", CompareTo::SamePeriodLastYear),
            (r"\bquarter\s+over\s+quarter\b", CompareTo::PreviousQuarter),
            (r"\bmonth\s+over\s+month\b", CompareTo::PreviousMonth),
            (r"\bweek\s+over\s+week\b", CompareTo::PreviousWeek),
            (r"\bday\s+over\s+day\b", CompareTo::PreviousDay),
            (r"গতকাল\S*\s*(?:এর\s*)?তুলনায়", CompareTo::PreviousDay),
            (r"(?:গত|আগের)\s*দিন\S*\s*(?:এর\s*)?তুলনায়", CompareTo::PreviousDay),
            (r"(?:গত|আগের)\s*সপ্তাহ\S*\s*(?:এর\s*)?তুলনায়", CompareTo::PreviousWeek),
            (r"(?:গত|আগের)\s*মাস\S*\s*(?:এর\s*)?তুলনায়", CompareTo::PreviousMonth),
            (r"(?:গত|আগের)\s*বছর\S*\s*(?:এর\s*)?তুলনায়", CompareTo::PreviousYear),
        ];
        led.iter()
            .map(|(p, v)| (Regex::new(&format!(r"\b{}(?:{})\b", COMPARE_LEAD, p)).unwrap(), *v))
            .chain(standalone.iter().map(|(p, v)| (Regex::new(p).unwrap(), *v)))
            .collect()
    };
}

/// What the time passes found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeExpressions {
    pub timeframe: Option<Timeframe>,
    pub compare_to: Option<CompareTo>,
    /// Time phrases that matched but give no usable window: impossible
    /// dates, or "past N hours" shorter than a day
    pub malformed: Vec<String>,
    /// Extra time phrases beyond the first one that was used
    pub ignored: Vec<String>,
}

/// Replace a span with a boundary marker of identical byte length
pub(crate) fn blank_span(work: &mut String, range: Range<usize>) {
    let len = range.end - range.start;
    if len == 0 {
        return;
    }
    let filler = format!("|{}", " ".repeat(len - 1));
    work.replace_range(range, &filler);
}

/// Extract time expressions from lowercased working text, blanking what is consumed
pub fn extract_time_expressions(work: &mut String, reference: NaiveDate) -> TimeExpressions {
    let mut found = TimeExpressions::default();

    // Comparisons first: "vs last month" must not be read as a timeframe
    for (re, compare) in COMPARISONS.iter() {
        for range in match_ranges(re, work) {
            let phrase = work[range.clone()].trim().to_string();
            if found.compare_to.is_none() {
                found.compare_to = Some(*compare);
            } else {
                found.ignored.push(phrase);
            }
            blank_span(work, range);
        }
    }

    let mut candidates: Vec<(Option<Timeframe>, String)> = Vec::new();

    collect(&DATE_RANGE, work, &mut candidates, |caps| {
        let start = parse_date(&caps[1])?;
        let end = parse_date(&caps[2])?;
        Some(Timeframe::Absolute(DateRange::new(start, end)))
    });
    collect(&SINCE_DATE, work, &mut candidates, |caps| {
        let start = parse_date(&caps[1])?;
        Some(Timeframe::Absolute(DateRange::new(start, reference)))
    });
    collect(&SINGLE_DATE, work, &mut candidates, |caps| {
        let day = parse_date(&caps[1])?;
        Some(Timeframe::Absolute(DateRange::new(day, day)))
    });
    collect(&MONTH_YEAR, work, &mut candidates, |caps| {
        let month = month_number(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        month_range(year, month).map(Timeframe::Absolute)
    });
    collect(&PAST_N, work, &mut candidates, |caps| {
        let n = parse_count(&caps[1])?;
        past_n(n, &caps[2], reference)
    });
    collect(&PAST_N_BN, work, &mut candidates, |caps| {
        let n = parse_count(&caps[1])?;
        let unit = match &caps[2] {
            "ঘণ্টা" => "hours",
            "দিন" => "days",
            "সপ্তাহ" => "weeks",
            _ => "months",
        };
        past_n(n, unit, reference)
    });
    for (re, period) in RELATIVE_PERIODS.iter() {
        collect(re, work, &mut candidates, |_| Some(Timeframe::Relative(*period)));
    }

    for (parsed, phrase) in candidates {
        match parsed {
            Some(tf) if found.timeframe.is_none() => found.timeframe = Some(tf),
            Some(_) => found.ignored.push(phrase),
            None => found.malformed.push(phrase),
        }
    }

    found
}

/// Run one pass: record every match (parsed or not) and blank it
fn collect<F>(re: &Regex, work: &mut String, out: &mut Vec<(Option<Timeframe>, String)>, parse: F)
where
    F: Fn(&Captures) -> Option<Timeframe>,
{
    let snapshot = work.clone();
    for caps in re.captures_iter(&snapshot) {
        let Some(whole) = caps.get(0) else { continue };
        let phrase = whole.as_str().trim().to_string();
        out.push((parse(&caps), phrase));
        blank_span(work, whole.range());
    }
}

fn match_ranges(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.range()).collect()
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.trim_end_matches('.').chars().take(3).collect();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// Parse one date token; `None` when the shape matched but the date is impossible
pub fn parse_date(token: &str) -> Option<NaiveDate> {
    let token = token.trim();

    if let Some((y, rest)) = token.split_once('-') {
        let mut parts = rest.split('-');
        let year: i32 = y.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        let day: u32 = parts.next()?.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if token.contains('/') {
        let parts: Vec<&str> = token.split('/').collect();
        if parts.len() != 3 {
            return None;
        }
        let day: u32 = parts[0].parse().ok()?;
        let month: u32 = parts[1].parse().ok()?;
        let year: i32 = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // "5th march, 2024" or "march 5, 2024"
    let cleaned = token.replace(',', " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() != 3 {
        return None;
    }
    let year: i32 = words[2].parse().ok()?;
    let (day_word, month_word) = if words[0].starts_with(|c: char| c.is_ascii_digit()) {
        (words[0], words[1])
    } else {
        (words[1], words[0])
    };
    let day: u32 = day_word
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()?;
    NaiveDate::from_ymd_opt(year, month_number(month_word)?, day)
}

fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(DateRange::new(first, next - Duration::days(1)))
}

fn parse_count(word: &str) -> Option<u32> {
    let n = match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "fourteen" => 14,
        "thirty" => 30,
        "sixty" => 60,
        "ninety" => 90,
        digits => digits.parse().ok()?,
    };
    (n > 0).then_some(n)
}

/// "past N units": enumerated where the table has a period, otherwise a range
/// ending on the reference date
fn past_n(n: u32, unit: &str, reference: NaiveDate) -> Option<Timeframe> {
    let unit = unit.trim_end_matches('s');
    match (n, unit) {
        (24, "hour") => Some(Timeframe::Relative(RelativePeriod::Past24Hours)),
        // No sub-day window exists; widening to a whole day would misreport the range
        (h, "hour") if h < 24 => None,
        (7, "day") => Some(Timeframe::Relative(RelativePeriod::Past7Days)),
        (30, "day") => Some(Timeframe::Relative(RelativePeriod::Past30Days)),
        (90, "day") => Some(Timeframe::Relative(RelativePeriod::Past90Days)),
        (h, "hour") => {
            let days = (h + 23) / 24;
            days_back(days, reference)
        }
        (d, "day") => days_back(d, reference),
        (w, "week") => days_back(w * 7, reference),
        (m, "month") => {
            let start = reference.checked_sub_months(Months::new(m))?;
            Some(Timeframe::Absolute(DateRange::new(start, reference)))
        }
        _ => None,
    }
}

fn days_back(days: u32, reference: NaiveDate) -> Option<Timeframe> {
    let start = reference.checked_sub_signed(Duration::days(i64::from(days) - 1))?;
    Some(Timeframe::Absolute(DateRange::new(start, reference)))
}
