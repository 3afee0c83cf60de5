//! Row types that flow between stages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical timestamp rendering used in every CSV artifact.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One visited page as read from a browser's history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub url: String,
    pub title: Option<String>,
    #[serde(rename = "last_visit_time", with = "visit_time_format")]
    pub visit_time: Option<NaiveDateTime>,
}

/// A [`HistoryRecord`] plus its normalized text. At least one of the cleaned
/// fields is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub url: String,
    pub title: Option<String>,
    #[serde(rename = "last_visit_time", with = "visit_time_format")]
    pub visit_time: Option<NaiveDateTime>,
    pub cleaned_title: String,
    pub cleaned_url: String,
}

impl CleanedRecord {
    pub fn from_history(record: HistoryRecord, cleaned_title: String, cleaned_url: String) -> Self {
        Self {
            url: record.url,
            title: record.title,
            visit_time: record.visit_time,
            cleaned_title,
            cleaned_url,
        }
    }

    pub fn has_signal(&self) -> bool {
        !self.cleaned_title.is_empty() || !self.cleaned_url.is_empty()
    }
}

/// Binary class assigned by the keyword rule. `1` is class A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    ClassB = 0,
    ClassA = 1,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::ClassB),
            1 => Ok(Label::ClassA),
            other => Err(format!("label must be 0 or 1, got {other}")),
        }
    }
}

mod visit_time_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&t.format(TIME_FORMAT).to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveDateTime::parse_from_str(text, TIME_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_rejects_other_integers() {
        assert_eq!(Label::try_from(1u8), Ok(Label::ClassA));
        assert_eq!(Label::try_from(0u8), Ok(Label::ClassB));
        assert!(Label::try_from(2u8).is_err());
    }

    #[test]
    fn cleaned_record_signal() {
        let base = HistoryRecord {
            url: "https://example.com".to_string(),
            title: None,
            visit_time: None,
        };
        let empty = CleanedRecord::from_history(base.clone(), String::new(), String::new());
        assert!(!empty.has_signal());
        let url_only = CleanedRecord::from_history(base, String::new(), "example".to_string());
        assert!(url_only.has_signal());
    }
}
