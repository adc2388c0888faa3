use crate::{
    error::ExecutionError,
    intent::{NormalizedIntent, QueryIntent, DEFAULT_ROW_LIMIT},
    model::FieldKind,
    vocabulary::{Category, CategoryVocabulary},
};

/// Rewrites interpreted intents into their canonical, bounded form.
pub struct Normalizer<'v> {
    vocabulary: &'v CategoryVocabulary,
}

impl<'v> Normalizer<'v> {
    pub fn new(vocabulary: &'v CategoryVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Validates `intent`, expands category tokens in classification filters,
    /// lower-cases identifier-like filter values, and caps list-shaped
    /// queries at [`DEFAULT_ROW_LIMIT`] rows unless a limit was given.
    ///
    /// # Errors
    ///
    /// Returns an error if the intent names a field its entity does not have
    /// or lacks a parameter its operation requires.
    pub fn normalize(&self, intent: &QueryIntent) -> Result<NormalizedIntent, ExecutionError> {
        let mut normalized = NormalizedIntent::validate(intent)?;
        for (field, value) in &mut normalized.filters {
            if field.kind() == FieldKind::Classification {
                if let Some(expanded) = self.expand(value) {
                    *value = expanded;
                }
            }
            if field.is_case_folded() {
                *value = value.to_lowercase();
            }
        }
        if normalized.query.is_list_shaped() && normalized.row_limit.is_none() {
            normalized.row_limit = Some(DEFAULT_ROW_LIMIT);
        }
        Ok(normalized)
    }

    /// The comma-joined members of the category `value` names, if it names one
    /// with known members.
    fn expand(&self, value: &str) -> Option<String> {
        let category = Category::from_token(value)?;
        let members = self.vocabulary.members(category);
        if members.is_empty() {
            return None;
        }
        Some(members.join(","))
    }
}
