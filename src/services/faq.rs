use crate::api::error::AppError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One question/answer pair shown on a service page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// Parses FAQs supplied by a client. Must be a JSON array whose elements all
/// carry a non-empty `question` and `answer`.
pub fn parse_faqs(raw: &str) -> Result<Vec<Faq>, AppError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("faqs must be valid JSON: {}", e)))?;

    let items = value
        .as_array()
        .ok_or_else(|| AppError::Validation("faqs must be a JSON array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = |key: &str| {
                item.get(key)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            match (field("question"), field("answer")) {
                (Some(question), Some(answer)) => Ok(Faq { question, answer }),
                _ => Err(AppError::Validation(format!(
                    "faqs[{}] needs a non-empty question and answer",
                    i
                ))),
            }
        })
        .collect()
}

pub fn encode_faqs(faqs: &[Faq]) -> String {
    serde_json::to_string(faqs).unwrap_or_else(|_| "[]".to_string())
}

/// Reads a stored FAQ column. Rows written before validation existed may hold
/// anything, so undecodable content yields an empty list instead of an error.
pub fn decode_stored(raw: Option<&str>) -> Vec<Faq> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<Faq>>(raw) {
        Ok(faqs) => faqs,
        Err(e) => {
            tracing::warn!("Ignoring undecodable stored faqs ({}): {:.80}", e, raw);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_faqs() {
        let faqs = parse_faqs(r#"[{"question":"Q1","answer":"A1"}]"#).unwrap();
        assert_eq!(
            faqs,
            vec![Faq {
                question: "Q1".into(),
                answer: "A1".into()
            }]
        );
        assert!(parse_faqs("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_structure() {
        assert!(parse_faqs("not json").is_err());
        assert!(parse_faqs(r#"{"question":"Q","answer":"A"}"#).is_err());
        assert!(parse_faqs(r#"[{"question":"Q"}]"#).is_err());
        assert!(parse_faqs(r#"[{"question":"  ","answer":"A"}]"#).is_err());
        assert!(parse_faqs(r#"[{"question":"Q","answer":1}]"#).is_err());
    }

    #[test]
    fn test_decode_stored_is_lenient() {
        assert!(decode_stored(None).is_empty());
        assert!(decode_stored(Some("")).is_empty());
        assert!(decode_stored(Some("{broken")).is_empty());
        assert!(decode_stored(Some(r#"{"question":"Q"}"#)).is_empty());

        let stored = encode_faqs(&[Faq {
            question: "Q".into(),
            answer: "A".into(),
        }]);
        assert_eq!(decode_stored(Some(&stored)).len(), 1);
    }
}
