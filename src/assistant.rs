use std::fmt;

use tracing::info;

use crate::{
    error::TurnError,
    executor::Executor,
    explainer::Explainer,
    normalizer::Normalizer,
    reducer::{reduce, ReducedResult},
    semantic_parsing::Interpreter,
    surface::DataSurface,
    vocabulary::CategoryVocabulary,
};

/// What one user turn produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Results(Vec<ReducedResult>),
    Explanation(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Results(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n\n")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Reply::Explanation(text) => f.write_str(text),
        }
    }
}

/// Whether `text` asks for a number of kinds rather than the kinds.
fn asks_for_count(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("how many") || text.contains("number of")
}

/// Answers questions end to end: interpret, normalize, execute, reduce, and
/// explain grouped answers.
pub struct Assistant {
    interpreter: Box<dyn Interpreter>,
    surface: Box<dyn DataSurface>,
    explainer: Explainer,
    vocabulary: CategoryVocabulary,
}

impl Assistant {
    pub fn new(
        interpreter: Box<dyn Interpreter>,
        surface: Box<dyn DataSurface>,
        explainer: Explainer,
        vocabulary: CategoryVocabulary,
    ) -> Self {
        Self {
            interpreter,
            surface,
            explainer,
            vocabulary,
        }
    }

    /// Builds an assistant whose category vocabulary is read from `surface`.
    pub async fn start(
        interpreter: Box<dyn Interpreter>,
        surface: Box<dyn DataSurface>,
        explainer: Explainer,
    ) -> Self {
        let vocabulary = CategoryVocabulary::resolve(surface.as_ref()).await;
        Self::new(interpreter, surface, explainer, vocabulary)
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.vocabulary
    }

    /// Runs one turn for the question `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the question cannot be interpreted, a query fails,
    /// or a grouped answer cannot be explained.
    pub async fn answer(&self, text: &str) -> Result<Reply, TurnError> {
        let intents = self.interpreter.interpret(text, &self.vocabulary).await?;
        let normalizer = Normalizer::new(&self.vocabulary);
        let executor = Executor::new(self.surface.as_ref());
        let count_distinct = asks_for_count(text);

        let mut parts = Vec::with_capacity(intents.len());
        for intent in &intents {
            let normalized = normalizer.normalize(intent)?;
            let raw = executor.execute(&normalized).await?;
            let reduced = reduce(
                raw,
                &normalized.query,
                &normalized.output_fields,
                count_distinct,
            );
            if intents.len() == 1 {
                if let ReducedResult::GroupedRows { group_by, rows } = &reduced {
                    let text = self.explainer.explain(text, *group_by, rows).await?;
                    return Ok(Reply::Explanation(text));
                }
            }
            parts.push(reduced);
        }
        info!("Answered {} intent(s)", parts.len());
        Ok(Reply::Results(ReducedResult::combine(parts)))
    }
}
