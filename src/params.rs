//! Search parameters, partial updates, and the query-string codec shared by
//! the URL synchronizer and the catalog client.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SORT: &str = "last_index_update_time";

/// Query keys in the order they are written to a URL.
pub const QUERY_KEYS: &[&str] = &[
    "curr",
    "limit",
    "keyword",
    "tag",
    "source",
    "sort",
    "bookStatus",
    "wordCountMin",
    "wordCountMax",
    "purity",
    "updatePeriod",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub curr: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count_min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count_max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_period: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            curr: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_SIZE,
            keyword: None,
            tag: None,
            source: None,
            sort: Some(DEFAULT_SORT.to_owned()),
            book_status: None,
            word_count_min: None,
            word_count_max: None,
            purity: None,
            update_period: None,
        }
    }
}

/// Partial update merged into [`SearchParams`].
///
/// `None` leaves a field alone. For the optional text fields `Some("")` (or
/// whitespace) clears the field. Page numbers and sizes of zero are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsPatch {
    pub curr: Option<u32>,
    pub limit: Option<u32>,
    pub keyword: Option<String>,
    pub tag: Option<String>,
    pub source: Option<String>,
    pub sort: Option<String>,
    pub book_status: Option<String>,
    pub word_count_min: Option<String>,
    pub word_count_max: Option<String>,
    pub purity: Option<String>,
    pub update_period: Option<String>,
}

impl ParamsPatch {
    pub fn page(curr: u32) -> Self {
        Self {
            curr: Some(curr),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl SearchParams {
    /// Shallow merge: every field present in `patch` overwrites the current one.
    pub fn merge(&self, patch: &ParamsPatch) -> Self {
        fn text(current: &Option<String>, incoming: &Option<String>) -> Option<String> {
            match incoming {
                None => current.clone(),
                Some(value) => non_empty(value),
            }
        }

        Self {
            curr: patch.curr.filter(|n| *n >= 1).unwrap_or(self.curr),
            limit: patch.limit.filter(|n| *n >= 1).unwrap_or(self.limit),
            keyword: text(&self.keyword, &patch.keyword),
            tag: text(&self.tag, &patch.tag),
            source: text(&self.source, &patch.source),
            sort: text(&self.sort, &patch.sort),
            book_status: text(&self.book_status, &patch.book_status),
            word_count_min: text(&self.word_count_min, &patch.word_count_min),
            word_count_max: text(&self.word_count_max, &patch.word_count_max),
            purity: text(&self.purity, &patch.purity),
            update_period: text(&self.update_period, &patch.update_period),
        }
    }

    /// The non-empty fields as a patch.
    pub fn to_patch(&self) -> ParamsPatch {
        let keep = |v: &Option<String>| v.as_deref().and_then(non_empty);
        ParamsPatch {
            curr: Some(self.curr),
            limit: Some(self.limit),
            keyword: keep(&self.keyword),
            tag: keep(&self.tag),
            source: keep(&self.source),
            sort: keep(&self.sort),
            book_status: keep(&self.book_status),
            word_count_min: keep(&self.word_count_min),
            word_count_max: keep(&self.word_count_max),
            purity: keep(&self.purity),
            update_period: keep(&self.update_period),
        }
    }

    /// Whether `other` differs only in `curr`.
    pub fn same_filters(&self, other: &SearchParams) -> bool {
        let mut a = self.clone();
        a.curr = other.curr;
        &a == other
    }

    /// `(key, value)` pairs for every non-empty field, in [`QUERY_KEYS`] order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let curr = self.curr.to_string();
        let limit = self.limit.to_string();
        let fields: [(&'static str, Option<&str>); 11] = [
            ("curr", Some(curr.as_str())),
            ("limit", Some(limit.as_str())),
            ("keyword", self.keyword.as_deref()),
            ("tag", self.tag.as_deref()),
            ("source", self.source.as_deref()),
            ("sort", self.sort.as_deref()),
            ("bookStatus", self.book_status.as_deref()),
            ("wordCountMin", self.word_count_min.as_deref()),
            ("wordCountMax", self.word_count_max.as_deref()),
            ("purity", self.purity.as_deref()),
            ("updatePeriod", self.update_period.as_deref()),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| value.and_then(non_empty).map(|v| (key, v)))
            .collect()
    }
}

/// Serializes the non-empty fields as an `application/x-www-form-urlencoded` string.
pub fn to_query_string(params: &SearchParams) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.query_pairs() {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

/// Result of parsing a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub patch: ParamsPatch,
    /// Numeric keys whose values could not be used, with the raw value.
    pub rejected: Vec<(&'static str, String)>,
}

/// Parses a query string (with or without the leading `?`).
///
/// Unknown keys are ignored; for repeated keys the first occurrence wins.
/// `curr` and `limit` must be positive integers, anything else is reported
/// in [`ParsedQuery::rejected`] and left out of the patch.
pub fn parse_query(query: &str) -> ParsedQuery {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut parsed = ParsedQuery::default();
    let mut seen: Vec<&'static str> = Vec::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let Some(key) = QUERY_KEYS.iter().copied().find(|k| *k == key) else {
            continue;
        };
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        let patch = &mut parsed.patch;
        match key {
            "curr" | "limit" => match value.trim().parse::<u32>() {
                Ok(n) if n >= 1 => {
                    if key == "curr" {
                        patch.curr = Some(n);
                    } else {
                        patch.limit = Some(n);
                    }
                }
                _ => parsed.rejected.push((key, value.into_owned())),
            },
            _ => {
                let Some(value) = non_empty(&value) else {
                    continue;
                };
                let slot = match key {
                    "keyword" => &mut patch.keyword,
                    "tag" => &mut patch.tag,
                    "source" => &mut patch.source,
                    "sort" => &mut patch.sort,
                    "bookStatus" => &mut patch.book_status,
                    "wordCountMin" => &mut patch.word_count_min,
                    "wordCountMax" => &mut patch.word_count_max,
                    "purity" => &mut patch.purity,
                    _ => &mut patch.update_period,
                };
                *slot = Some(value);
            }
        }
    }

    parsed
}

/// Joins list values (tags, sources) into the single comma separated value
/// the catalog expects.
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> Option<String> {
    let joined = items
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    non_empty(&joined)
}

pub fn decode_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Values collected from the search form.
///
/// Submitting a form replaces every filter: fields left empty clear the
/// corresponding parameter rather than keeping the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchForm {
    pub keyword: String,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub sort: String,
    pub word_count_min: String,
    pub word_count_max: String,
    pub purity: String,
    pub update_period: String,
    pub book_status: String,
}

impl SearchForm {
    pub fn into_patch(self, page_size: u32) -> ParamsPatch {
        let sort = if self.sort.trim().is_empty() {
            DEFAULT_SORT.to_owned()
        } else {
            self.sort
        };
        ParamsPatch {
            curr: Some(DEFAULT_PAGE),
            limit: Some(page_size),
            keyword: Some(self.keyword),
            tag: Some(encode_list(&self.tags).unwrap_or_default()),
            source: Some(encode_list(&self.sources).unwrap_or_default()),
            sort: Some(sort),
            book_status: Some(self.book_status),
            word_count_min: Some(self.word_count_min),
            word_count_max: Some(self.word_count_max),
            purity: Some(self.purity),
            update_period: Some(self.update_period),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
        None
    } else {
        Some(value.to_owned())
    }
}
