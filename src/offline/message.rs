use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages pages post to the offline layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SkipWaiting,
    CacheData { key: String, data: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting,
    Cached { key: String },
    Ignored { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_page_messages() {
        let skip: WorkerMessage = serde_json::from_value(json!({"type": "SKIP_WAITING"})).unwrap();
        assert_eq!(skip, WorkerMessage::SkipWaiting);

        let cache: WorkerMessage = serde_json::from_value(json!({
            "type": "CACHE_DATA",
            "key": "tasks",
            "data": [{"name": "Buy milk"}]
        }))
        .unwrap();
        assert_eq!(
            cache,
            WorkerMessage::CacheData {
                key: "tasks".to_string(),
                data: json!([{"name": "Buy milk"}])
            }
        );
    }
}
