// ABOUTME: Decoding of command result frames received on the result topic
// Accepts structured JSON {result, err} first and falls back to tagged "res:"/"err:" strings

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    // Servers emit "ESC[NN;0m" and "ESC[m" where a plain reset is meant; the
    // introducer is either a real escape or a literal backslash
    static ref MALFORMED_RESET: Regex =
        Regex::new(r"(\x1b|\\)\[([0-9]{1,2};0m|m)").expect("reset pattern is a valid regex");
}

const RESET: &str = "${1}[0m";

/// A decoded result frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Result(String),
    Error(String),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct StructuredFrame {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

impl StructuredFrame {
    fn into_frame(self) -> Frame {
        match (self.err, self.result) {
            (Some(err), _) => Frame::Error(normalize_ansi(&err)),
            (None, Some(result)) => Frame::Result(normalize_ansi(&result)),
            (None, None) => Frame::Unrecognized,
        }
    }
}

/// Rewrites malformed reset sequences into the standard reset
pub fn normalize_ansi(text: &str) -> String {
    MALFORMED_RESET.replace_all(text, RESET).into_owned()
}

/// Decodes a `res:<text>` / `err:<text>` frame: a 3-character tag and one separator
fn decode_tagged(raw: &str) -> Frame {
    let Some(tag) = raw.get(..3) else {
        return Frame::Unrecognized;
    };
    let payload = raw.get(4..).unwrap_or_default();

    match tag {
        "res" => Frame::Result(normalize_ansi(payload)),
        "err" => Frame::Error(normalize_ansi(payload)),
        _ => Frame::Unrecognized,
    }
}

pub fn decode_frame(raw: &str) -> Frame {
    if let Ok(structured) = serde_json::from_str::<StructuredFrame>(raw) {
        return structured.into_frame();
    }
    if let Ok(inner) = serde_json::from_str::<String>(raw) {
        return decode_tagged(&inner);
    }
    decode_tagged(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_result() {
        assert_eq!(decode_frame("res:hello"), Frame::Result("hello".to_string()));
        assert_eq!(decode_frame("err:boom"), Frame::Error("boom".to_string()));
    }

    #[test]
    fn test_malformed_reset_is_normalized() {
        assert_eq!(
            decode_frame("res:te\\[31;0mst"),
            Frame::Result("te\\[0mst".to_string())
        );
        assert_eq!(
            decode_frame("res:\u{1b}[1mbold\u{1b}[m"),
            Frame::Result("\u{1b}[1mbold\u{1b}[0m".to_string())
        );
    }

    #[test]
    fn test_bracketed_plain_text_untouched() {
        assert_eq!(
            decode_frame("res:[main] started"),
            Frame::Result("[main] started".to_string())
        );
        assert_eq!(
            decode_frame("res:[mvn] build ok [31;0m"),
            Frame::Result("[mvn] build ok [31;0m".to_string())
        );
    }

    #[test]
    fn test_valid_sequences_untouched() {
        let text = "\u{1b}[1;33mwarn\u{1b}[0m";
        assert_eq!(normalize_ansi(text), text);
    }

    #[test]
    fn test_unknown_tag_is_unrecognized() {
        assert_eq!(decode_frame("xyz:whatever"), Frame::Unrecognized);
        assert_eq!(decode_frame("re"), Frame::Unrecognized);
        assert_eq!(decode_frame(""), Frame::Unrecognized);
    }

    #[test]
    fn test_tag_without_payload() {
        assert_eq!(decode_frame("res"), Frame::Result(String::new()));
        assert_eq!(decode_frame("res:"), Frame::Result(String::new()));
    }

    #[test]
    fn test_structured_frames() {
        assert_eq!(
            decode_frame(r#"{"result":"ok"}"#),
            Frame::Result("ok".to_string())
        );
        assert_eq!(
            decode_frame(r#"{"err":"bad"}"#),
            Frame::Error("bad".to_string())
        );
        assert_eq!(
            decode_frame(r#"{"result":"ok","err":"bad"}"#),
            Frame::Error("bad".to_string())
        );
        assert_eq!(decode_frame("{}"), Frame::Unrecognized);
    }

    #[test]
    fn test_json_encoded_tagged_string() {
        assert_eq!(
            decode_frame(r#""res:listed""#),
            Frame::Result("listed".to_string())
        );
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        assert_eq!(decode_frame("é"), Frame::Unrecognized);
        assert_eq!(decode_frame("reé"), Frame::Unrecognized);
    }
}
