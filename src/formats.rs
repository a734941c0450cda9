use serde::{Deserialize, Deserializer, Serialize};

/// Codes the catalog uses to signal success inside the response body.
pub const SUCCESS_CODES: &[&str] = &["200", "0"];

/// Response envelope returned by `GET /book/searchByPage`.
///
/// `data` is absent or `null` on most failures, so it stays optional here and
/// the client decides what a missing payload means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        SUCCESS_CODES.contains(&self.code.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(deserialize_with = "lenient_u64")]
    pub page_num: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub page_size: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<Book>,
}

impl SearchPage {
    /// Whether pages beyond this one exist on the server.
    pub fn has_more(&self) -> bool {
        self.page_num.saturating_mul(self.page_size) < self.total
    }
}

/// Read-only projection of one catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub book_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pic_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub book_desc: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tag: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub word_count: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub book_status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub crawl_source_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_index_update_time: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purity: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_index_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub visit_count: Option<u64>,
}

impl Book {
    /// Tags as individual entries; the catalog stores them comma separated.
    pub fn tags(&self) -> Vec<&str> {
        self.tag
            .split([',', '，'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        None => String::new(),
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Scalar::Int(n)) => u64::try_from(n).map_err(serde::de::Error::custom),
        Some(Scalar::Float(n)) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
        Some(Scalar::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|err| serde::de::Error::custom(format!("invalid number {s:?}: {err}"))),
        Some(_) => Err(serde::de::Error::custom("expected a number or numeric string")),
    }
}

/// Optional counters: null, empty or unparsable text reads as absent.
fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(n)) => u64::try_from(n).ok(),
        Some(Scalar::Float(n)) if n >= 0.0 && n.fract() == 0.0 => Some(n as u64),
        Some(Scalar::Text(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(n)) => Some(n as f64),
        Some(Scalar::Float(n)) => Some(n),
        Some(Scalar::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}
