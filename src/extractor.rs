//! Entity Extractor
//!
//! Turns an utterance into raw slot candidates. Closed-vocabulary slots
//! (timeframe, comparison, granularity, visualization, threshold) come out as
//! enumeration values; business unit and metric mentions stay as text spans
//! for the resolver. The snapshot is only a span hint here: exact registry
//! surface forms are cut out first so time and chart words inside a name are
//! not misread.

use crate::entities::{CompareTo, Granularity, Threshold, ThresholdOperator, Timeframe, Visualization, Vocabulary};
use crate::error::Result;
use crate::normalizer::{is_bengali, Utterance};
use crate::taxonomy::{TaxonomySnapshot, TermKind};
use crate::time::{blank_span, extract_time_expressions};
use async_trait::async_trait;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// Raw slot candidates for one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateBag {
    /// Business unit mentions in order of appearance
    pub business_units: Vec<String>,
    /// Metric mentions in order of appearance
    pub metrics: Vec<String>,
    pub timeframe: Option<Timeframe>,
    pub compare_to: Option<CompareTo>,
    pub granularity: Option<Granularity>,
    pub visualization: Option<Visualization>,
    pub threshold: Option<Threshold>,
    /// Explanations for things that were seen but not used
    pub notes: Vec<String>,
}

impl CandidateBag {
    pub fn is_empty(&self) -> bool {
        self.business_units.is_empty()
            && self.metrics.is_empty()
            && self.timeframe.is_none()
            && self.compare_to.is_none()
            && self.granularity.is_none()
            && self.visualization.is_none()
            && self.threshold.is_none()
    }
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        utterance: &Utterance,
        snapshot: &TaxonomySnapshot,
        reference: NaiveDate,
    ) -> Result<CandidateBag>;
}

const NUM: &str = concat!(
    r"(?:৳\s*|tk\.?\s*|bdt\s*|\$\s*)?",
    r"(?P<value>\d+(?:,\d{3})*(?:\.\d+)?)\s*(?P<pct>%|percent\b|pc\b)?",
    r"(?:\s*(?:litres?|liters?|units?|taka|tk|bdt|pcs|pieces|kg|items?)\b)?"
);
const NUM_BN: &str = r"(?P<value>\d+(?:,\d{3})*(?:\.\d+)?)\s*(?P<pct>%|শতাংশ)?(?:\s*(?:লিটার|টাকা|ইউনিট|পিস)\S*)?";

lazy_static! {
    static ref GRANULARITIES: Vec<(Regex, Granularity)> = [
        (r"\b(?:by|per|each|every)\s+hour\b|\bhourly\b|\bhour\s+by\s+hour\b|প্রতি\s*ঘণ্টা\S*", Granularity::Hour),
        (
            r"\b(?:by|per|each|every)\s+day\b|\bdaily\b|\bday\s+by\s+day\b|\bday[\s-]wise\b|প্রতিদিন\S*|দৈনিক",
            Granularity::Day,
        ),
        (
            concat!(
                r"\b(?:by|per|each|every)\s+week\b|\bweekly\b|\bweek\s+by\s+week\b|\bweek[\s-]wise\b",
                r"|সাপ্তাহিক|প্রতি\s*সপ্তাহ\S*"
            ),
            Granularity::Week,
        ),
        (
            concat!(
                r"\b(?:by|per|each|every)\s+month\b|\bmonthly\b|\bmonth\s+by\s+month\b|\bmonth[\s-]wise\b",
                r"|মাসিক|প্রতি\s*মাস\S*"
            ),
            Granularity::Month,
        ),
    ]
    .iter()
    .map(|(p, g)| (Regex::new(p).unwrap(), *g))
    .collect();

    static ref VISUALIZATION_PHRASES: Vec<(Regex, Visualization)> = [
        (r"\bline\s*(?:chart|graph|plot)s?\b|\btrend\s*line\b|লাইন\s*চার্ট", Visualization::Line),
        (r"\bbar\s*(?:chart|graph|plot)s?\b|\bcolumn\s*chart\b|\bhistogram\b|বার\s*চার্ট", Visualization::Bar),
        (r"\barea\s*(?:chart|graph|plot)s?\b", Visualization::Area),
        (r"\btabular\b|\bgrid\b|টেবিল\S*", Visualization::Table),
        (r"\bkpi\s*(?:card|tile)s?\b|\bbig\s+number\b|\bsingle\s+number\b", Visualization::Kpi),
    ]
    .iter()
    .map(|(p, v)| (Regex::new(p).unwrap(), *v))
    .collect();

    /// Threshold phrases; earlier entries win when several overlap
    static ref THRESHOLDS: Vec<(Regex, ThresholdOperator)> = {
        let led = [
            (
                concat!(
                    r"\b(?:rises?|rising|increases?|increasing|goes\s+up|grows?|jumps?|climbs?)",
                    r"\s+(?:by\s+)?(?:more\s+than\s+)?"
                ),
                ThresholdOperator::IncreasesBy,
            ),
            (
                concat!(
                    r"\b(?:drops?|dropping|falls?|falling|decreases?|decreasing|declines?|goes\s+down|dips?)",
                    r"\s+(?:by\s+)?(?:more\s+than\s+)?"
                ),
                ThresholdOperator::DecreasesBy,
            ),
            (
                r"(?:\bat\s+least|\bno\s+less\s+than|\bnot\s+below|>=|\bminimum(?:\s+of)?)\s*",
                ThresholdOperator::AtLeast,
            ),
            (
                r"(?:\bat\s+most|\bno\s+more\s+than|\bnot\s+above|<=|\bmaximum(?:\s+of)?)\s*",
                ThresholdOperator::AtMost,
            ),
            (
                concat!(
                    r"(?:\b(?:goes|is|gets|rises|climbs|crosses)\s+)?",
                    r"(?:\babove|\bover|\bmore\s+than|\bgreater\s+than|\bhigher\s+than|\bexceeds?|\bcrosses|>)\s*"
                ),
                ThresholdOperator::Above,
            ),
            (
                concat!(
                    r"(?:\b(?:drops?|falls?|goes|is|gets|dips?)\s+)?",
                    r"(?:\bbelow|\bunder|\bless\s+than|\blower\s+than|<)\s*"
                ),
                ThresholdOperator::Below,
            ),
        ];
        let trailed = [
            (r"\s*(?:এর\s*)?(?:বেশি|উপরে|ওপরে)\S*", ThresholdOperator::Above),
            (r"\s*(?:এর\s*)?(?:কম|নিচে|নীচে)\S*", ThresholdOperator::Below),
        ];
        led.iter()
            .map(|(p, op)| (format!("{}{}", p, NUM), *op))
            .chain(trailed.iter().map(|(p, op)| (format!("{}{}", NUM_BN, p), *op)))
            .map(|(p, op)| (Regex::new(&p).unwrap(), op))
            .collect()
    };

    static ref STOPWORDS: HashSet<&'static str> = [
        // requests and verbs
        "show", "me", "us", "what", "whats", "is", "are", "was", "were", "be", "been", "how", "much",
        "many", "please", "can", "could", "would", "will", "you", "i", "we", "give", "get", "tell",
        "list", "fetch", "display", "see", "view", "pull", "report", "total", "add", "create", "set",
        "make", "put", "build", "up", "let", "know", "do", "does", "did", "have", "has", "need",
        "want", "like", "look", "looking", "doing", "going", "hey", "hi", "okay", "ok", "hmm",
        "thanks", "thank", "now", "currently", "latest", "current", "new", "with", "to", "into",
        "on", "as", "by", "per", "than", "there", "this", "that", "these", "those", "it", "its",
        "about", "over", "time", "period", "breakdown", "split", "broken", "down", "each", "every",
        "numbers", "figures", "stats", "statistics", "status", "overview", "summary", "details",
        "data", "value", "values", "trend", "trends", "compare", "comparison", "vs", "versus",
        // dashboard and alert vocabulary
        "chart", "charts", "graph", "graphs", "plot", "plots", "dashboard", "widget", "pin",
        "visualize", "visualise", "alert", "alerts", "notify", "notification", "notifications",
        "remind", "warn", "alarm", "threshold", "when", "whenever", "if", "goes", "drops", "falls",
        "rises", "reaches", "hits",
        // Bengali
        "দেখাও", "দেখান", "দাও", "দিন", "কত", "কি", "কী", "আমাকে", "আমার", "জানাও", "জানিও",
        "যখন", "যদি", "হলে", "হয়", "করো", "করুন", "এর", "টা", "টি", "সতর্ক", "সতর্কতা",
        "ড্যাশবোর্ড", "চার্ট", "গ্রাফ", "মোট", "সব", "সকল",
    ]
    .into_iter()
    .collect();
}

/// Words that put the following mention in business-unit position
const MARKERS: &[&str] = &["for", "at", "in", "of", "from", "across", "within"];
/// List joiners; a pending marker carries across them
const CONNECTORS: &[&str] = &["and", "or", "&", "plus", "এবং", "ও", "আর", "বা"];
/// Articles and determiners: end a chunk but keep a pending marker
const FILLERS: &[&str] = &["the", "a", "an", "our", "my", "all", "both", "each"];

/// Deterministic extractor built on lookup tables and the registry's surface forms
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_candidates(
        &self,
        utterance: &Utterance,
        snapshot: &TaxonomySnapshot,
        reference: NaiveDate,
    ) -> CandidateBag {
        let mut work = utterance.text().to_lowercase();
        let mut bag = CandidateBag::default();
        let mut mentions: Vec<(usize, TermKind, String)> = Vec::new();

        protect_registry_terms(&mut work, snapshot, &mut mentions);

        let time = extract_time_expressions(&mut work, reference);
        bag.timeframe = time.timeframe;
        bag.compare_to = time.compare_to;
        for phrase in time.malformed {
            bag.notes.push(format!("Could not use the time expression \"{}\"; no timeframe applied.", phrase));
        }
        for phrase in time.ignored {
            bag.notes.push(format!("Ignored additional time expression \"{}\".", phrase));
        }

        bag.granularity = first_match(&GRANULARITIES, &mut work, &mut bag.notes, "granularity");
        bag.visualization = extract_visualization(&mut work, snapshot, &mut bag.notes);
        bag.threshold = extract_threshold(&mut work, &mut bag.notes);

        chunk_mentions(&work, snapshot, &mut mentions);
        mentions.sort_by_key(|(offset, _, _)| *offset);

        for (_, kind, text) in mentions {
            match kind {
                TermKind::BusinessUnit => bag.business_units.push(text),
                TermKind::Metric => bag.metrics.push(text),
            }
        }

        debug!(
            "Extracted {} business unit and {} metric mentions, timeframe={:?}, compare_to={:?}",
            bag.business_units.len(),
            bag.metrics.len(),
            bag.timeframe,
            bag.compare_to
        );
        bag
    }
}

#[async_trait]
impl EntityExtractor for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract(
        &self,
        utterance: &Utterance,
        snapshot: &TaxonomySnapshot,
        reference: NaiveDate,
    ) -> Result<CandidateBag> {
        Ok(self.extract_candidates(utterance, snapshot, reference))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_bengali(c)
}

/// Whole-word occurrences of `term`. A Bengali term may carry a short
/// inflection suffix ("পাম্পের"), which is included in the range.
fn find_words(work: &str, term: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    if term.is_empty() {
        return found;
    }
    let bengali_tail = term.chars().next_back().map(is_bengali).unwrap_or(false);

    let mut from = 0;
    while let Some(pos) = work[from..].find(term) {
        let start = from + pos;
        let mut end = start + term.len();

        let clean_start = work[..start].chars().next_back().map(|c| !is_word_char(c)).unwrap_or(true);
        let mut clean_end = work[end..].chars().next().map(|c| !is_word_char(c)).unwrap_or(true);

        if clean_start && !clean_end && bengali_tail {
            let suffix: Vec<char> = work[end..].chars().take_while(|c| is_bengali(*c)).collect();
            let next = work[end..].chars().nth(suffix.len());
            if suffix.len() <= 3 && next.map(|c| !is_word_char(c)).unwrap_or(true) {
                end += suffix.iter().map(|c| c.len_utf8()).sum::<usize>();
                clean_end = true;
            }
        }

        if clean_start && clean_end {
            found.push(start..end);
            from = end;
        } else {
            from = start + work[start..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        }
    }
    found
}

fn preceded_by_marker(work: &str, offset: usize) -> bool {
    work[..offset]
        .split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty() && !FILLERS.contains(w))
        .next_back()
        .map(|w| MARKERS.contains(&w))
        .unwrap_or(false)
}

fn protect_registry_terms(
    work: &mut String,
    snapshot: &TaxonomySnapshot,
    mentions: &mut Vec<(usize, TermKind, String)>,
) {
    let forms = snapshot.surface_forms();
    let mut kinds_per_form: std::collections::BTreeMap<&str, HashSet<TermKind>> = Default::default();
    for (form, kind) in &forms {
        kinds_per_form.entry(form.as_str()).or_default().insert(*kind);
    }

    let mut done: HashSet<&str> = HashSet::new();
    for (form, kind) in &forms {
        if !done.insert(form.as_str()) {
            continue;
        }
        let dual = kinds_per_form.get(form.as_str()).map(|k| k.len() > 1).unwrap_or(false);
        for range in find_words(work, form) {
            let kind = if dual {
                if preceded_by_marker(work, range.start) {
                    TermKind::BusinessUnit
                } else {
                    TermKind::Metric
                }
            } else {
                *kind
            };
            mentions.push((range.start, kind, form.clone()));
            blank_span(work, range);
        }
    }
}

/// Earliest match across a table wins; later distinct values are noted
fn first_match<T: Copy + PartialEq + Vocabulary>(
    table: &[(Regex, T)],
    work: &mut String,
    notes: &mut Vec<String>,
    slot: &str,
) -> Option<T> {
    let mut hits: Vec<(usize, T, Range<usize>)> = Vec::new();
    for (re, value) in table {
        for m in re.find_iter(work) {
            hits.push((m.start(), *value, m.range()));
        }
    }
    pick_earliest(hits, work, notes, slot)
}

fn pick_earliest<T: Copy + PartialEq + Vocabulary>(
    mut hits: Vec<(usize, T, Range<usize>)>,
    work: &mut String,
    notes: &mut Vec<String>,
    slot: &str,
) -> Option<T> {
    hits.sort_by_key(|(start, _, _)| *start);
    let chosen = hits.first().map(|(_, v, _)| *v);
    for (_, value, range) in hits {
        if Some(value) != chosen {
            notes.push(format!("Ignored additional {} \"{}\".", slot, value.key()));
        }
        // Ranges from different patterns can overlap; blank only what is still text
        if !work[range.clone()].starts_with('|') {
            blank_span(work, range);
        }
    }
    chosen
}

fn extract_visualization(
    work: &mut String,
    snapshot: &TaxonomySnapshot,
    notes: &mut Vec<String>,
) -> Option<Visualization> {
    let mut hits: Vec<(usize, Visualization, Range<usize>)> = Vec::new();
    for (re, value) in VISUALIZATION_PHRASES.iter() {
        for m in re.find_iter(work) {
            hits.push((m.start(), *value, m.range()));
        }
    }

    let mut aliases: Vec<(&String, &Visualization)> = snapshot.visualization_aliases().iter().collect();
    aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
    for (alias, value) in aliases {
        for range in find_words(work, alias) {
            let covered = hits.iter().any(|(_, _, r)| r.start <= range.start && range.end <= r.end);
            if !covered {
                hits.push((range.start, *value, range));
            }
        }
    }

    pick_earliest(hits, work, notes, "visualization")
}

fn extract_threshold(work: &mut String, notes: &mut Vec<String>) -> Option<Threshold> {
    let mut found: Option<(usize, Threshold)> = None;

    for (re, operator) in THRESHOLDS.iter() {
        let snapshot = work.clone();
        for caps in re.captures_iter(&snapshot) {
            let (Some(whole), Some(value)) = (caps.get(0), caps.name("value")) else {
                continue;
            };
            let parsed: Option<f64> = value.as_str().replace(',', "").parse().ok().filter(|v: &f64| v.is_finite());
            let Some(parsed) = parsed else {
                notes.push(format!("Could not read the number in \"{}\".", whole.as_str().trim()));
                continue;
            };

            let threshold = Threshold {
                operator: *operator,
                value: parsed,
                percent: caps.name("pct").is_some(),
            };
            match found {
                Some((start, _)) if start <= whole.start() => {
                    notes.push(format!("Ignored additional threshold \"{}\".", whole.as_str().trim()));
                }
                Some((_, previous)) => {
                    notes.push(format!(
                        "Ignored additional threshold \"{} {}\".",
                        previous.operator.key(),
                        previous.value
                    ));
                    found = Some((whole.start(), threshold));
                }
                None => found = Some((whole.start(), threshold)),
            }
            blank_span(work, whole.range());
        }
    }

    found.map(|(_, t)| t)
}

struct Chunk {
    start: usize,
    words: Vec<String>,
    marked: bool,
}

/// Split what is left into mention chunks and give each a slot
fn chunk_mentions(work: &str, snapshot: &TaxonomySnapshot, mentions: &mut Vec<(usize, TermKind, String)>) {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Option<Chunk> = None;
    let mut marker_pending = false;

    let flush = |current: &mut Option<Chunk>, chunks: &mut Vec<Chunk>| {
        if let Some(chunk) = current.take() {
            if !chunk.words.is_empty() {
                chunks.push(chunk);
            }
        }
    };

    for (offset, token) in tokenize(work) {
        let Some(word) = token else {
            flush(&mut current, &mut chunks);
            marker_pending = false;
            continue;
        };
        let word = word
            .trim_end_matches("'s")
            .trim_end_matches("’s")
            .trim_matches(|c: char| c == '\'' || c == '’');
        if word.is_empty() {
            continue;
        }

        if MARKERS.contains(&word) {
            flush(&mut current, &mut chunks);
            marker_pending = true;
        } else if CONNECTORS.contains(&word) || FILLERS.contains(&word) {
            flush(&mut current, &mut chunks);
        } else if STOPWORDS.contains(word) || word.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
            flush(&mut current, &mut chunks);
            marker_pending = false;
        } else {
            current
                .get_or_insert_with(|| Chunk {
                    start: offset,
                    words: Vec::new(),
                    marked: marker_pending,
                })
                .words
                .push(word.to_string());
        }
    }
    flush(&mut current, &mut chunks);

    for chunk in chunks {
        let text = chunk.words.join(" ");
        if text.chars().count() < 2 {
            continue;
        }
        let kind = match snapshot.best_scores(&text) {
            (Some(bu), Some(metric)) if (bu - metric).abs() > 1e-9 => {
                if bu > metric {
                    TermKind::BusinessUnit
                } else {
                    TermKind::Metric
                }
            }
            (Some(_), None) => TermKind::BusinessUnit,
            (None, Some(_)) => TermKind::Metric,
            _ if chunk.marked => TermKind::BusinessUnit,
            _ => TermKind::Metric,
        };
        mentions.push((chunk.start, kind, text));
    }
}

/// Word tokens with their byte offsets; `None` marks a hard boundary
fn tokenize(work: &str) -> Vec<(usize, Option<&str>)> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, c) in work.char_indices() {
        let in_word = is_word_char(c) || matches!(c, '\'' | '’' | '-' | '_' | '/');
        if in_word {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = word_start.take() {
            tokens.push((start, Some(&work[start..i])));
        }
        if c == '&' {
            tokens.push((i, Some("&")));
        } else if !c.is_whitespace() {
            tokens.push((i, None));
        }
    }
    if let Some(start) = word_start {
        tokens.push((start, Some(&work[start..])));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DateRange, RelativePeriod};
    use crate::normalizer::{normalize, Language};
    use crate::taxonomy::registry::tests::sample_snapshot;

    fn extract(text: &str) -> CandidateBag {
        let utterance = normalize(text, None, Language::En);
        let reference = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        RuleBasedExtractor::new().extract_candidates(&utterance, &sample_snapshot(), reference)
    }

    #[test]
    fn test_full_retrieval_utterance() {
        let bag = extract("show fuel stock for Setu Filling Station last week vs last month");
        assert_eq!(bag.business_units, vec!["setu filling station"]);
        assert_eq!(bag.metrics, vec!["fuel stock"]);
        assert_eq!(bag.timeframe, Some(Timeframe::Relative(RelativePeriod::LastWeek)));
        assert_eq!(bag.compare_to, Some(CompareTo::PreviousMonth));
    }

    #[test]
    fn test_marker_carries_across_list() {
        let bag = extract("show sales for setu fuel north and rupa pharmacy");
        assert_eq!(bag.business_units, vec!["setu fuel north", "rupa pharmacy"]);
        assert_eq!(bag.metrics, vec!["sales"]);
    }

    #[test]
    fn test_unknown_metric_stays_a_metric_mention() {
        let bag = extract("show happiness index for Rupa Pharmacy");
        assert_eq!(bag.metrics, vec!["happiness index"]);
        assert_eq!(bag.business_units, vec!["rupa pharmacy"]);
    }

    #[test]
    fn test_partial_name_is_a_business_unit() {
        let bag = extract("show sales for setu fuel");
        assert_eq!(bag.business_units, vec!["setu fuel"]);
    }

    #[test]
    fn test_dashboard_slots() {
        let bag = extract("add a bar chart of sales by month for rupa pharmacy to the dashboard");
        assert_eq!(bag.visualization, Some(Visualization::Bar));
        assert_eq!(bag.granularity, Some(Granularity::Month));
        assert_eq!(bag.business_units, vec!["rupa pharmacy"]);
        assert_eq!(bag.metrics, vec!["sales"]);
    }

    #[test]
    fn test_registry_visualization_alias() {
        let bag = extract("put payroll cost on a scorecard");
        assert_eq!(bag.visualization, Some(Visualization::Kpi));
        assert_eq!(bag.metrics, vec!["payroll cost"]);
    }

    #[test]
    fn test_threshold_phrases() {
        let bag = extract("alert me when fuel stock at Setu Filling Station drops below 500 litres");
        let threshold = bag.threshold.unwrap();
        assert_eq!(threshold.operator, ThresholdOperator::Below);
        assert_eq!(threshold.value, 500.0);
        assert!(!threshold.percent);
        assert_eq!(bag.metrics, vec!["fuel stock"]);
        assert_eq!(bag.business_units, vec!["setu filling station"]);

        let bag = extract("notify me if sales drops by 10% compared to last week");
        let threshold = bag.threshold.unwrap();
        assert_eq!(threshold.operator, ThresholdOperator::DecreasesBy);
        assert!(threshold.percent);
        assert_eq!(bag.compare_to, Some(CompareTo::PreviousWeek));

        let bag = extract("alert when rent collected is at least 1,200");
        assert_eq!(bag.threshold.map(|t| (t.operator, t.value)), Some((ThresholdOperator::AtLeast, 1200.0)));
    }

    #[test]
    fn test_split_patterns_still_match() {
        let bag = extract("alert me if sales rises by 15% week over week");
        assert_eq!(bag.threshold.map(|t| (t.operator, t.percent)), Some((ThresholdOperator::IncreasesBy, true)));

        let bag = extract("notify me when payroll cost exceeds 90000 taka");
        assert_eq!(bag.threshold.map(|t| (t.operator, t.value)), Some((ThresholdOperator::Above, 90000.0)));

        let bag = extract("alert when fuel stock is at most 300");
        assert_eq!(bag.threshold.map(|t| t.operator), Some(ThresholdOperator::AtMost));

        let bag = extract("show weekly sales for rupa pharmacy since 3 march 2024");
        assert_eq!(bag.granularity, Some(Granularity::Week));
        let start = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(bag.timeframe, Some(Timeframe::Absolute(DateRange::new(start, end))));
    }

    #[test]
    fn test_bengali_utterance() {
        let bag = extract("সেতু পাম্পের গত সপ্তাহের বিক্রি দেখাও");
        assert_eq!(bag.business_units, vec!["সেতু পাম্প"]);
        assert_eq!(bag.metrics, vec!["বিক্রি"]);
        assert_eq!(bag.timeframe, Some(Timeframe::Relative(RelativePeriod::LastWeek)));
    }

    #[test]
    fn test_bengali_threshold() {
        let bag = extract("সেতু পাম্পের জ্বালানি ৫০০ লিটারের নিচে হলে জানাও");
        let threshold = bag.threshold.unwrap();
        assert_eq!(threshold.operator, ThresholdOperator::Below);
        assert_eq!(threshold.value, 500.0);
    }

    #[test]
    fn test_malformed_date_is_noted() {
        let bag = extract("show sales on 2024-02-30");
        assert_eq!(bag.timeframe, None);
        assert_eq!(bag.notes.len(), 1);
        assert_eq!(bag.metrics, vec!["sales"]);
    }

    #[test]
    fn test_nothing_to_extract() {
        assert!(extract("hmm okay").is_empty());
    }
}
