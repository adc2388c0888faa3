use tracing::{debug, info};

use crate::{
    error::ExecutionError,
    intent::{NormalizedIntent, PLACE_FILTER},
    surface::{DataSurface, RawResult},
};

/// Runs normalized intents against a data surface.
pub struct Executor<'s, S: ?Sized> {
    surface: &'s S,
}

impl<'s, S> Executor<'s, S>
where
    S: DataSurface + ?Sized,
{
    pub fn new(surface: &'s S) -> Self {
        Self { surface }
    }

    /// Answers `intent`. An empty list, count, or distinct answer to a query
    /// filtered by place is retried once without the place filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface rejects the query or cannot be reached.
    pub async fn execute(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError> {
        debug!(?intent, "Executing intent");
        let result = self.surface.fetch(intent).await?;
        if !result.is_empty() || !intent.query.is_relaxable() {
            return Ok(result);
        }
        let Some(relaxed) = intent.without_place_filter() else {
            return Ok(result);
        };
        info!(
            "No {} rows matched {}={:?}; retrying without it",
            intent.entity,
            PLACE_FILTER,
            intent.filters.get(&PLACE_FILTER)
        );
        self.surface.fetch(&relaxed).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        database::TestDatabase,
        intent::{Operation, QueryIntent},
        model::{Entity, Field},
        normalizer::Normalizer,
        vocabulary::CategoryVocabulary,
    };

    /// Answers every query with nothing and remembers what it was asked.
    #[derive(Default)]
    struct Barren {
        seen: Mutex<Vec<NormalizedIntent>>,
    }

    #[async_trait]
    impl DataSurface for Barren {
        async fn fetch(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError> {
            self.seen.lock().unwrap().push(intent.clone());
            Ok(RawResult::Records(Vec::new()))
        }
    }

    fn normalize(intent: &QueryIntent) -> NormalizedIntent {
        Normalizer::new(&CategoryVocabulary::default())
            .normalize(intent)
            .unwrap()
    }

    #[tokio::test]
    async fn relaxes_at_most_once() {
        let surface = Barren::default();
        let intent = normalize(
            &QueryIntent::new(Entity::Equipment, Operation::List)
                .with_filter("pop_name", "Agartala")
                .with_filter("oem_name", "Juniper"),
        );
        let result = Executor::new(&surface).execute(&intent).await.unwrap();
        assert!(result.is_empty());

        let seen = surface.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].filters.contains_key(&Field::PopName));
        assert!(!seen[1].filters.contains_key(&Field::PopName));
        assert!(seen[1].filters.contains_key(&Field::OemName));
    }

    #[tokio::test]
    async fn no_retry_without_place_filter() {
        let surface = Barren::default();
        let intent = normalize(
            &QueryIntent::new(Entity::Equipment, Operation::Count).with_filter("oem_name", "Cisco"),
        );
        Executor::new(&surface).execute(&intent).await.unwrap();
        assert_eq!(surface.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn grouped_queries_are_not_relaxed() {
        let surface = Barren::default();
        let mut raw = QueryIntent::new(Entity::Equipment, Operation::GroupCount)
            .with_filter("pop_name", "Agartala");
        raw.group_by = Some("oem_name".to_string());
        Executor::new(&surface).execute(&normalize(&raw)).await.unwrap();
        assert_eq!(surface.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unmatched_place_falls_back_to_all_places() {
        let test = TestDatabase::seeded();
        let executor = Executor::new(&test.db);

        let list = normalize(
            &QueryIntent::new(Entity::Equipment, Operation::List)
                .with_filter("pop_name", "Agartala")
                .with_filter("oem_name", "juniper"),
        );
        let RawResult::Records(rows) = executor.execute(&list).await.unwrap() else {
            panic!("not a list");
        };
        let ids: Vec<_> = rows.iter().map(|r| r["equipment_id"].clone()).collect();
        assert_eq!(ids, [json!(3), json!(4)]);

        let count = normalize(
            &QueryIntent::new(Entity::Equipment, Operation::Count).with_filter("pop_name", "Agartala"),
        );
        assert_eq!(executor.execute(&count).await.unwrap(), RawResult::Count(6));

        let mut distinct = QueryIntent::new(Entity::Equipment, Operation::Distinct)
            .with_filter("pop_name", "Agartala")
            .with_filter("oem_name", "juniper");
        distinct.distinct_field = Some("pop_name".to_string());
        assert_eq!(
            executor.execute(&normalize(&distinct)).await.unwrap(),
            RawResult::Distinct(vec![json!("Lucknow"), json!("Connaught Place")])
        );

        let matched = normalize(
            &QueryIntent::new(Entity::Equipment, Operation::Count).with_filter("pop_name", "Lucknow"),
        );
        assert_eq!(executor.execute(&matched).await.unwrap(), RawResult::Count(3));
    }

    #[tokio::test]
    async fn errors_are_not_relaxed_away() {
        let test = TestDatabase::seeded();
        let intent = normalize(
            &QueryIntent::new(Entity::Pop, Operation::List)
                .with_filter("pop_name", "Agartala")
                .with_filter("latitude", "north"),
        );
        assert!(matches!(
            Executor::new(&test.db).execute(&intent).await,
            Err(ExecutionError::InvalidValue { field: Field::Latitude, .. })
        ));
    }
}
