use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{error::TurnError, llm::Oracle, model::Field, surface::GroupRow};

pub const NO_RESULTS: &str = "No results found for your query.";

/// Phrases grouped answers to ranking and average questions.
pub struct Explainer {
    oracle: Arc<dyn Oracle>,
}

impl Explainer {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Answers `question` in a sentence or two from the grouped `rows`.
    ///
    /// # Errors
    ///
    /// Returns an error if the oracle fails.
    pub async fn explain(
        &self,
        question: &str,
        group_by: Field,
        rows: &[GroupRow],
    ) -> Result<String, TurnError> {
        if rows.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        let data: Vec<Value> = rows
            .iter()
            .map(|row| Value::Object(row.to_record(group_by)))
            .collect();
        let data = serde_json::to_string_pretty(&data)
            .map_err(|e| TurnError::Explanation(e.to_string()))?;
        let prompt = format!(
            "You are a helpful assistant. The user asked: \"{question}\"\n\n\
            Here is the data returned from the API, ordered as the question requested:\n\n\
            {data}\n\n\
            Answer the user's question in one or two clear sentences. \
            If the user asks for the highest, lowest, second highest, second lowest, average or a similar rank, \
            find and report the matching group and its value from the data.\n"
        );
        debug!(%prompt, "Explaining grouped rows");
        let answer = self
            .oracle
            .complete(&prompt)
            .await
            .map_err(|e| TurnError::Explanation(format!("{e:#}")))?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{llm::tests::ScriptedOracle, surface::Metric};

    #[tokio::test]
    async fn empty_rows_need_no_oracle() {
        let oracle = Arc::new(ScriptedOracle::new([]));
        let explainer = Explainer::new(oracle.clone());
        let text = explainer
            .explain("which state has the most routers", Field::StateName, &[])
            .await
            .unwrap();
        assert_eq!(text, NO_RESULTS);
        assert!(oracle.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_and_question_reach_the_oracle() {
        let oracle = Arc::new(ScriptedOracle::new([
            "  Connaught Place has the second highest number of routers, with 2.\n",
        ]));
        let explainer = Explainer::new(oracle.clone());
        let rows = [
            GroupRow {
                key: json!("Lucknow"),
                metric: Metric::Count(3),
            },
            GroupRow {
                key: json!("Connaught Place"),
                metric: Metric::Count(2),
            },
        ];
        let text = explainer
            .explain("second highest number of routers", Field::PopName, &rows)
            .await
            .unwrap();
        assert_eq!(
            text,
            "Connaught Place has the second highest number of routers, with 2."
        );
        let prompt = oracle.prompt(0);
        assert!(prompt.contains("The user asked: \"second highest number of routers\""));
        assert!(prompt.contains("\"pop_name\": \"Connaught Place\""));
        assert!(prompt.contains("\"count\": 2"));
    }

    #[tokio::test]
    async fn oracle_failure_is_reported() {
        let explainer = Explainer::new(Arc::new(ScriptedOracle::new([])));
        let rows = [GroupRow {
            key: json!("Delhi"),
            metric: Metric::Average(Some(28.6)),
        }];
        assert!(matches!(
            explainer.explain("average latitude", Field::StateName, &rows).await,
            Err(TurnError::Explanation(_))
        ));
    }
}
