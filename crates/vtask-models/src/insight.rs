//! Structured extraction output.
//!
//! These types double as the response schema handed to the model
//! (`JsonSchema`) and as the typed task result. Model output is checked with
//! `validator` before it leaves the job body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::timestamp::Timestamp;

/// Maximum length of a single insight or summary paragraph.
pub const MAX_CONTENT_LEN: u64 = 2000;

/// One timestamped key insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct KeyInsight {
    /// The insight itself
    #[validate(length(min = 1, max = 2000))] // = MAX_CONTENT_LEN (schemars derive requires a literal)
    pub content: String,
    /// Source video URL
    #[validate(length(min = 1))]
    pub video_url: String,
    /// Where the insight starts in the video
    pub begin_timestamp: Timestamp,
    /// Where the insight ends in the video
    pub end_timestamp: Timestamp,
}

/// One timestamped summary segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct SummarySegment {
    /// Summary of this part of the video
    #[validate(length(min = 1, max = 2000))] // = MAX_CONTENT_LEN (schemars derive requires a literal)
    pub content: String,
    /// Source video URL
    #[validate(length(min = 1))]
    pub video_url: String,
    /// Segment start
    pub begin_timestamp: Timestamp,
    /// Segment end
    pub end_timestamp: Timestamp,
}

/// Result of the key-insights extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct KeyInsightsResult {
    /// Short title for the whole set of insights
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    /// Insights in video order
    #[validate(nested)]
    pub insights: Vec<KeyInsight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(content: &str) -> KeyInsight {
        KeyInsight {
            content: content.to_string(),
            video_url: "https://youtube.com/watch?v=abc".to_string(),
            begin_timestamp: Timestamp::new(0, 0, 10),
            end_timestamp: Timestamp::new(0, 1, 0),
        }
    }

    #[test]
    fn valid_result_passes() {
        let result = KeyInsightsResult {
            title: "Takeaways".to_string(),
            insights: vec![insight("Sleep matters")],
        };
        assert!(result.validate().is_ok());
    }

    #[test]
    fn empty_content_is_rejected() {
        let result = KeyInsightsResult {
            title: "Takeaways".to_string(),
            insights: vec![insight("")],
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn oversized_content_is_rejected() {
        let long = "x".repeat(MAX_CONTENT_LEN as usize + 1);
        assert!(insight(&long).validate().is_err());
    }

    #[test]
    fn content_at_length_limit_is_accepted() {
        let at_limit = "x".repeat(MAX_CONTENT_LEN as usize);
        assert!(insight(&at_limit).validate().is_ok());

        let segment = SummarySegment {
            content: at_limit.clone() + "x",
            video_url: "https://youtube.com/watch?v=abc".to_string(),
            begin_timestamp: Timestamp::new(0, 0, 0),
            end_timestamp: Timestamp::new(0, 1, 0),
        };
        assert!(segment.validate().is_err());
    }

    #[test]
    fn empty_title_is_rejected() {
        let result = KeyInsightsResult {
            title: String::new(),
            insights: vec![],
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn summary_segment_parses_nested_timestamps() {
        let json = r#"{
            "content": "Intro",
            "video_url": "https://youtube.com/watch?v=abc",
            "begin_timestamp": {"hour": 0, "minute": 0, "second": 0},
            "end_timestamp": {"hour": 0, "minute": 1, "second": 30}
        }"#;
        let segment: SummarySegment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.end_timestamp.total_seconds(), 90);
        assert!(segment.validate().is_ok());
    }
}
