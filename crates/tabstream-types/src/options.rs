use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Options forwarded to the record parser for every block.
///
/// Only `header` is interpreted by the decoder itself (it switches on the
/// header cache). Everything else is read by the parser capability.
/// Hosts usually send these as camelCase JSON:
///
/// ```json
/// { "header": true, "delimiter": ";", "dynamicTyping": true,
///   "skipEmptyLines": "greedy" }
/// ```
///
/// ```text
/// ┌────────────────┬─────────────┬──────────────────────────────────────┐
/// │ Field          │ Default     │ Meaning                              │
/// ├────────────────┼─────────────┼──────────────────────────────────────┤
/// │ header         │ false       │ First line names the columns         │
/// │ delimiter      │ ','         │ Field separator (single ASCII char)  │
/// │ quote_char     │ '"'         │ Field quoting character              │
/// │ escape_char    │ quote_char  │ Escape inside quoted fields          │
/// │ comments       │ none        │ Lines starting with this are skipped │
/// │ skip_empty_lines│ Off        │ Off / On / Greedy                    │
/// │ dynamic_typing │ false       │ Numbers, bools, nulls from text      │
/// │ extra          │ {}          │ Unrecognised keys, kept opaque       │
/// └────────────────┴─────────────┴──────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    pub header: bool,
    pub delimiter: Option<char>,
    pub quote_char: Option<char>,
    pub escape_char: Option<char>,
    pub comments: Option<char>,
    pub skip_empty_lines: SkipEmptyLines,
    pub dynamic_typing: bool,

    /// Keys this crate does not recognise. Custom parsers may read them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    #[must_use]
    pub fn with_dynamic_typing(mut self, dynamic_typing: bool) -> Self {
        self.dynamic_typing = dynamic_typing;
        self
    }

    #[must_use]
    pub fn with_skip_empty_lines(mut self, mode: SkipEmptyLines) -> Self {
        self.skip_empty_lines = mode;
        self
    }

    #[must_use]
    pub fn with_comments(mut self, prefix: char) -> Self {
        self.comments = Some(prefix);
        self
    }
}

/// How the parser treats blank records.
///
/// On the wire this is `false`, `true` or the string `"greedy"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkipEmptyLines {
    /// Keep every record. A blank line is a record of one empty field.
    #[default]
    Off,
    /// Drop records made of a single empty field.
    On,
    /// Drop records whose fields are all empty or whitespace.
    Greedy,
}

impl Serialize for SkipEmptyLines {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Off => serializer.serialize_bool(false),
            Self::On => serializer.serialize_bool(true),
            Self::Greedy => serializer.serialize_str("greedy"),
        }
    }
}

impl<'de> Deserialize<'de> for SkipEmptyLines {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Mode(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(false) => Ok(Self::Off),
            Repr::Flag(true) => Ok(Self::On),
            Repr::Mode(mode) if mode == "greedy" => Ok(Self::Greedy),
            Repr::Mode(other) => Err(de::Error::invalid_value(
                Unexpected::Str(&other),
                &"true, false or \"greedy\"",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_host_json() {
        let options: ParseOptions = serde_json::from_value(json!({
            "header": true,
            "delimiter": ";",
            "dynamicTyping": true,
            "skipEmptyLines": "greedy",
            "worker": true
        }))
        .unwrap();

        assert!(options.header);
        assert_eq!(options.delimiter, Some(';'));
        assert!(options.dynamic_typing);
        assert_eq!(options.skip_empty_lines, SkipEmptyLines::Greedy);
        assert_eq!(options.extra.get("worker"), Some(&json!(true)));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let options: ParseOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options, ParseOptions::default());
    }

    #[test]
    fn skip_empty_lines_accepts_bool() {
        let options: ParseOptions =
            serde_json::from_value(json!({ "skipEmptyLines": true })).unwrap();
        assert_eq!(options.skip_empty_lines, SkipEmptyLines::On);
    }

    #[test]
    fn skip_empty_lines_rejects_unknown_mode() {
        let result: Result<ParseOptions, _> =
            serde_json::from_value(json!({ "skipEmptyLines": "always" }));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_back_to_camel_case() {
        let options = ParseOptions::new()
            .with_header(true)
            .with_skip_empty_lines(SkipEmptyLines::Greedy);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["header"], json!(true));
        assert_eq!(value["skipEmptyLines"], json!("greedy"));
        assert_eq!(value["dynamicTyping"], json!(false));
    }
}
