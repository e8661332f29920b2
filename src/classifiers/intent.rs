//! Intent classification — what kind of work does the query ask for?
//!
//! The primary path asks the small model for a structured JSON verdict; any
//! failure along the way (transport, timeout, unparseable reply, unknown
//! label, confidence outside [0,1]) degrades to the keyword rules. Both
//! paths honour the same output contract, so the router never sees the
//! difference.

use serde_json::Value;
use tracing::warn;

use crate::models::IntentLabel;

use super::slm::{extract_json_object, SlmChatClient};

/// Confidence reported by the rule-based path on a keyword match.
pub const RULE_CONFIDENCE: f64 = 0.70;
/// Confidence reported when no rule matches and we default to GENERAL.
pub const RULE_DEFAULT_CONFIDENCE: f64 = 0.60;

const INTENT_SYSTEM_PROMPT: &str = "\
You are a query intent classifier for a data analytics platform.
Classify the user query into exactly ONE of these intent categories:

EDA       - exploratory data analysis, statistics, profiling, distributions
SQL       - requesting specific SQL queries or database lookups
FORECAST  - time-series prediction, trends, future values
ANOMALY   - outlier detection, unusual patterns, alerts
REPORT    - generate a report, summary, document, presentation
VISUALISE - create a chart, graph, plot, visualisation
CLEAN     - data cleaning, fixing errors, deduplication, imputation
MODEL     - machine learning, training a model, AutoML, feature engineering
EXPLAIN   - explain a concept, method, result, or code
SEARCH    - search knowledge base, find documents, semantic search
CODE      - write, review, debug, or explain code
GENERAL   - general question, greeting, or unclear intent

Respond ONLY with valid JSON:
{\"intent\": \"<LABEL>\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<1 sentence>\"}
";

/// Keyword sets per label, checked in priority order. First hit wins.
const KEYWORD_RULES: &[(&[&str], IntentLabel)] = &[
    (&["forecast", "predict", "future", "trend", "arima", "prophet"], IntentLabel::Forecast),
    (&["anomaly", "outlier", "unusual", "spike", "alert", "drift"], IntentLabel::Anomaly),
    (&["report", "summary", "document", "presentation", "pptx"], IntentLabel::Report),
    (&["chart", "plot", "graph", "visualis", "dashboard", "bar chart", "pie"], IntentLabel::Visualise),
    (&["clean", "deduplic", "missing", "null", "impute", "fix"], IntentLabel::Clean),
    (&["train", "model", "automl", "feature", "sklearn", "xgboost"], IntentLabel::Model),
    (&["explain", "what is", "how does", "why"], IntentLabel::Explain),
    (&["search", "find documents", "knowledge base", "rag"], IntentLabel::Search),
    (&["sql", "query", "select", "join", "where", "group by"], IntentLabel::Sql),
    (&["eda", "profile", "distribution", "statistics", "describe"], IntentLabel::Eda),
    (&["code", "python", "function", "script", "debug"], IntentLabel::Code),
];

/// Deterministic keyword classification. Zero dependencies, zero I/O.
pub fn rule_based_intent(query: &str) -> (IntentLabel, f64) {
    let q = query.to_lowercase();
    for (keywords, label) in KEYWORD_RULES {
        if keywords.iter().any(|kw| q.contains(kw)) {
            return (*label, RULE_CONFIDENCE);
        }
    }
    (IntentLabel::General, RULE_DEFAULT_CONFIDENCE)
}

/// SLM-backed intent classifier with the rule-based fallback built in.
pub struct SlmIntentClassifier {
    chat: SlmChatClient,
    model: String,
}

impl SlmIntentClassifier {
    pub fn new(chat: SlmChatClient, model: String) -> Self {
        Self { chat, model }
    }

    /// Classify a query. Infallible: failures degrade to the keyword rules.
    pub async fn classify(&self, query: &str) -> (IntentLabel, f64) {
        match self.primary(query).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, fallback = "rule_based", "intent classifier SLM call failed");
                rule_based_intent(query)
            }
        }
    }

    async fn primary(&self, query: &str) -> anyhow::Result<(IntentLabel, f64)> {
        let content = self.chat.chat(&self.model, INTENT_SYSTEM_PROMPT, query).await?;

        let object = extract_json_object(&content)
            .ok_or_else(|| anyhow::anyhow!("no JSON object in reply: {:.200}", content))?;
        let data: Value = serde_json::from_str(object)?;

        let label = data
            .get("intent")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("reply missing intent field"))?;
        let label = IntentLabel::parse(label)
            .ok_or_else(|| anyhow::anyhow!("unknown intent label `{label}`"))?;

        let confidence = data.get("confidence").and_then(Value::as_f64).unwrap_or(0.75);
        anyhow::ensure!(
            (0.0..=1.0).contains(&confidence),
            "confidence {confidence} out of range"
        );
        Ok((label, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -----------------------------------------------------------------------
    // Rule-based fallback — pure, no I/O
    // -----------------------------------------------------------------------

    #[test]
    fn sql_keywords_classify_as_sql() {
        let (label, conf) = rule_based_intent("Show me all customers from the database with SQL");
        assert_eq!(label, IntentLabel::Sql);
        assert!(conf >= 0.60);
    }

    #[test]
    fn forecast_keywords_classify_as_forecast() {
        let (label, _) = rule_based_intent("Predict next quarter revenue using Prophet");
        assert_eq!(label, IntentLabel::Forecast);
    }

    #[test]
    fn anomaly_keywords_classify_as_anomaly() {
        let (label, _) = rule_based_intent("Detect outliers and anomalies in the sales data");
        assert_eq!(label, IntentLabel::Anomaly);
    }

    #[test]
    fn chart_keywords_classify_as_visualise() {
        let (label, _) = rule_based_intent("Create a bar chart of revenue by region");
        assert_eq!(label, IntentLabel::Visualise);
    }

    #[test]
    fn report_keywords_classify_as_report() {
        let (label, _) = rule_based_intent("Generate a monthly executive summary for the board");
        assert_eq!(label, IntentLabel::Report);
    }

    #[test]
    fn eda_keywords_classify_as_eda() {
        let (label, _) = rule_based_intent("Show me the distribution and statistics of the dataset");
        assert_eq!(label, IntentLabel::Eda);
    }

    #[test]
    fn unmatched_query_defaults_to_general() {
        let (label, conf) = rule_based_intent("Hello, how are you?");
        assert_eq!(label, IntentLabel::General);
        assert!((conf - RULE_DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn earlier_rules_take_priority() {
        // "forecast" (first rule) beats "sql" (ninth rule) in the same query
        let (label, _) = rule_based_intent("forecast the results of this sql query");
        assert_eq!(label, IntentLabel::Forecast);
    }

    // -----------------------------------------------------------------------
    // SLM path — mocked backend
    // -----------------------------------------------------------------------

    fn chat_reply(content: &str) -> serde_json::Value {
        serde_json::json!({ "message": { "content": content } })
    }

    async fn classifier_for(server: &MockServer) -> SlmIntentClassifier {
        SlmIntentClassifier::new(SlmChatClient::new(&server.uri(), 5_000), "phi3.5".into())
    }

    #[tokio::test]
    async fn slm_verdict_is_used_when_well_formed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                r#"{"intent": "FORECAST", "confidence": 0.93, "reasoning": "asks about future values"}"#,
            )))
            .mount(&server)
            .await;

        let (label, conf) = classifier_for(&server).await.classify("will sales grow?").await;
        assert_eq!(label, IntentLabel::Forecast);
        assert!((conf - 0.93).abs() < 1e-9);
    }

    #[tokio::test]
    async fn lowercase_label_in_reply_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                r#"{"intent": "visualise", "confidence": 0.8}"#,
            )))
            .mount(&server)
            .await;

        let (label, _) = classifier_for(&server).await.classify("chart this").await;
        assert_eq!(label, IntentLabel::Visualise);
    }

    #[tokio::test]
    async fn out_of_range_confidence_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                r#"{"intent": "FORECAST", "confidence": 1.7}"#,
            )))
            .mount(&server)
            .await;

        // The reply is discarded wholesale: the keyword rules decide.
        let (label, conf) = classifier_for(&server).await.classify("select 1").await;
        assert_eq!(label, IntentLabel::Sql);
        assert!((conf - RULE_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn backend_error_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (label, conf) = classifier_for(&server)
            .await
            .classify("predict next month revenue")
            .await;
        assert_eq!(label, IntentLabel::Forecast);
        assert!((conf - RULE_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn garbage_reply_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                "I think this is probably about databases?",
            )))
            .mount(&server)
            .await;

        let (label, _) = classifier_for(&server)
            .await
            .classify("write a sql query for me")
            .await;
        assert_eq!(label, IntentLabel::Sql);
    }

    #[tokio::test]
    async fn unknown_label_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                r#"{"intent": "DATABASE_STUFF", "confidence": 0.9}"#,
            )))
            .mount(&server)
            .await;

        let (label, conf) = classifier_for(&server).await.classify("hello there").await;
        assert_eq!(label, IntentLabel::General);
        assert!((conf - RULE_DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }
}
