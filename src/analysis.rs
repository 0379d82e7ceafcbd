//! Structured sentiment analysis: one completion, parsed into a fixed schema.

use crate::provider::ChatProvider;
use crate::store::{NewRecord, RecordStore};
use crate::{Error, Prompt};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "你是一个幽默且专业的文本分析助手。请分析用户发来的文本，并返回JSON格式结果。";

const ANALYSIS_TEMPERATURE: f32 = 0.7;

/// Sentiment reported when the analysis could not be produced.
pub const ERROR_SENTIMENT: &str = "Error";

const REQUIRED_FIELDS: [&str; 5] = ["length", "is_question", "sentiment", "keywords", "ai_reply"];

/// The analysis returned to clients. Exactly these five fields are ever sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(deserialize_with = "deserialize_length")]
    pub length: i64,
    pub is_question: bool,
    pub sentiment: String,
    pub keywords: Vec<String>,
    pub ai_reply: String,
}

impl AnalysisResult {
    /// Validate a raw model reply against the schema.
    ///
    /// Markdown code fences are stripped first; the remainder must be a JSON
    /// object carrying every required field with the expected type. Extra
    /// fields are ignored.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let cleaned = strip_code_fences(raw);
        let value: Value = serde_json::from_str(cleaned)
            .map_err(|e| Error::parse(format!("reply is not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::parse("reply is not a JSON object"))?;
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(Error::parse(format!("missing field `{missing}`")));
        }

        serde_json::from_value(value).map_err(|e| Error::parse(e.to_string()))
    }

    /// The payload sent back when analysis fails for any upstream or parse reason.
    pub fn fallback(error: &Error) -> Self {
        Self {
            length: 0,
            is_question: false,
            sentiment: ERROR_SENTIMENT.to_string(),
            keywords: Vec::new(),
            ai_reply: format!("系统错误: {error}"),
        }
    }

    fn to_record(&self, text: &str) -> NewRecord {
        NewRecord {
            text_content: text.to_string(),
            ai_reply: self.ai_reply.clone(),
            sentiment: self.sentiment.clone(),
            word_count: self.length,
        }
    }
}

/// Models sometimes report the count as a float (`6.0`); any JSON number is
/// accepted and truncated toward zero.
fn deserialize_length<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        .ok_or_else(|| de::Error::custom(format!("length {number} is out of range")))
}

/// Remove ```` ```json ```` / ```` ``` ```` markers and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

pub fn analysis_prompt(text: &str) -> Prompt {
    let instruction = format!(
        "请分析这段话：'{text}'\n\n\
         请直接返回纯 JSON 格式（不要用 ```json 包裹），必须包含以下字段：\n\
         1. length (数字): 字数\n\
         2. is_question (布尔值): 是否包含疑问\n\
         3. sentiment (字符串): 情感倾向（积极/消极/中性/愤怒等）\n\
         4. keywords (数组): 提取3个关键词\n\
         5. ai_reply (字符串): 你对这段话的幽默回复"
    );
    Prompt::system(ANALYSIS_SYSTEM_PROMPT)
        .with_user(instruction)
        .with_temperature(ANALYSIS_TEMPERATURE)
}

/// Run one analysis.
///
/// Upstream and parse failures are folded into [`AnalysisResult::fallback`]
/// and nothing is stored. Only a failure to persist a successful analysis is
/// returned as an error.
pub async fn analyze(
    provider: &dyn ChatProvider,
    store: &RecordStore,
    text: &str,
) -> Result<AnalysisResult, Error> {
    let parsed = match provider.complete(&analysis_prompt(text)).await {
        Ok(raw) => AnalysisResult::parse(&raw),
        Err(e) => Err(e),
    };

    let result = match parsed {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "analysis failed, returning fallback");
            return Ok(AnalysisResult::fallback(&e));
        }
    };

    tracing::debug!(text = %preview(text), "saving analysis record");
    let record = store.insert(result.to_record(text)).await?;
    tracing::info!(record_id = record.id, sentiment = %record.sentiment, "analysis saved");

    Ok(result)
}

/// First few characters of user text, for log lines.
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"length": 5, "is_question": true, "sentiment": "积极", "keywords": ["a", "b", "c"], "ai_reply": "哈哈"}"#;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_parse_valid_reply() {
        let result = AnalysisResult::parse(VALID).unwrap();
        assert_eq!(result.length, 5);
        assert!(result.is_question);
        assert_eq!(result.keywords, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_fenced_reply_with_extra_fields() {
        let raw = r#"```json
{"length": 2, "is_question": false, "sentiment": "中性", "keywords": [], "ai_reply": "ok", "confidence": 0.9}
```"#;
        let result = AnalysisResult::parse(raw).unwrap();
        assert_eq!(result.sentiment, "中性");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_parse_missing_field() {
        let err = AnalysisResult::parse(r#"{"length": 1, "is_question": false}"#).unwrap_err();
        assert!(matches!(err, Error::Parse(ref m) if m.contains("sentiment")));
    }

    #[test]
    fn test_parse_wrong_type_and_not_json() {
        let wrong = VALID.replace("true", "\"yes\"");
        assert!(matches!(AnalysisResult::parse(&wrong), Err(Error::Parse(_))));
        assert!(matches!(AnalysisResult::parse("I cannot help"), Err(Error::Parse(_))));
        assert!(matches!(AnalysisResult::parse("[1, 2]"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_float_length() {
        let raw = VALID.replace("\"length\": 5", "\"length\": 6.0");
        assert_eq!(AnalysisResult::parse(&raw).unwrap().length, 6);

        let raw = VALID.replace("\"length\": 5", "\"length\": 7.9");
        assert_eq!(AnalysisResult::parse(&raw).unwrap().length, 7);

        let raw = VALID.replace("\"length\": 5", "\"length\": \"5\"");
        assert!(matches!(AnalysisResult::parse(&raw), Err(Error::Parse(_))));
    }

    #[test]
    fn test_fallback_shape() {
        let fallback = AnalysisResult::fallback(&Error::streaming("boom"));
        assert_eq!(fallback.length, 0);
        assert!(!fallback.is_question);
        assert_eq!(fallback.sentiment, ERROR_SENTIMENT);
        assert!(fallback.keywords.is_empty());
        assert!(fallback.ai_reply.starts_with("系统错误: "));
        assert!(fallback.ai_reply.contains("boom"));
    }

    #[test]
    fn test_analysis_prompt() {
        let prompt = analysis_prompt("今天天气不错");
        assert_eq!(prompt.messages().len(), 2);
        assert_eq!(prompt.messages()[0].content, ANALYSIS_SYSTEM_PROMPT);
        assert!(prompt.messages()[1].content.contains("'今天天气不错'"));
        assert_eq!(prompt.temperature(), Some(0.7));
    }
}
