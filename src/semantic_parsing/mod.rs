mod aliases;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

pub use aliases::{Alias, AliasTable};

use crate::{
    endpoint,
    error::InterpretError,
    intent::{Operation, QueryIntent},
    llm::Oracle,
    model::Entity,
    vocabulary::CategoryVocabulary,
};

/// Turns a user's question into query intents.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        text: &str,
        vocabulary: &CategoryVocabulary,
    ) -> Result<Vec<QueryIntent>, InterpretError>;
}

fn field_list(entity: Entity) -> String {
    entity
        .fields()
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn instruction(vocabulary: &CategoryVocabulary, aliases: &AliasTable) -> String {
    format!(
        "You are an API query interpreter for a backend with two entities: 'equipment' and 'pop'.\n\n\
        Endpoints:\n\
        - /{{entity}}/ lists records; any field is a filter, `fields` is a comma list of fields to return, `limit` caps the rows.\n\
        - /{{entity}}/{{id}} returns one record by id (e.g. /pop/1010010).\n\
        - /{{entity}}/count/ counts the records matching the filters.\n\
        - /{{entity}}/groupcount/?group_by=<field>&order=<asc|desc>&limit=<n> counts records per value of a field.\n\
        - /{{entity}}/groupavg/?group_by=<field>&avg_field=<numeric field>&order=<asc|desc>&limit=<n> averages a numeric field per group.\n\
        - /{{entity}}/distinct/?field=<field> returns the unique values of a field.\n\n\
        Rules:\n\
        - For count questions (\"how many X with Y\") use /equipment/count/ or /pop/count/ with every relevant filter.\n\
        - For lists add limit=10 unless the user asks for a different number.\n\
        - If the user asks for specific fields, put them in `fields` (e.g. /equipment/?pop_name=Agartala&fields=ip_address&limit=10).\n\
        - Place names, addresses and other filters become query parameters (e.g. /pop/?state_name=Delhi&limit=10).\n\
        - For highest, second highest, lowest, least or top/bottom N questions over a dimension use groupcount with group_by set to that dimension; use order=desc for the highest family and order=asc for the lowest family, and limit=3 for top or bottom 3. For averages use groupavg with avg_field.\n\
        - For \"list all types of X\", \"what are the types of X\" or \"unique values of X\" use /{{entity}}/distinct/?field=X on the entity that has X.\n\
        - For \"how many types of X\" or \"number of unique X\" also use /{{entity}}/distinct/?field=X.\n\
        - For devices of one manufacturer use /equipment/?oem_name=<name>&limit=10.\n\n\
        Device categories:\n\
        - When the user says switches, write equipment_subtype=switch.\n\
        - When the user says routers, write equipment_subtype=router.\n\
        - When the user says devices in general, write equipment_subtype=devices.\n\
        - Known switch subtypes: {switches}\n\
        - Known router subtypes: {routers}\n\n\
        Value normalization:\n\
        Always rewrite user-provided values to their spelling in the database, even when they are partial, lowercase, hyphenated, misspelled, abbreviated or space-separated. This applies to every queryable field such as model_name, oem_name, hostname, pop_name, pop_code and state_name. Known spellings:\n\
        {aliases}\n\n\
        Available fields for 'equipment': {equipment}\n\
        Available fields for 'pop': {pop}\n\n\
        Answer with JSON only, no explanation: an object with exactly the keys \"entity\", \"endpoint\" and \"fields\", or an array of such objects when the question needs several queries.\n",
        switches = vocabulary.switches().join(", "),
        routers = vocabulary.routers().join(", "),
        aliases = aliases.instructions(),
        equipment = field_list(Entity::Equipment),
        pop = field_list(Entity::Pop),
    )
}

#[derive(Debug, Deserialize)]
struct Interpretation {
    #[serde(default)]
    entity: Option<String>,
    endpoint: String,
    #[serde(default)]
    fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Answer {
    One(Interpretation),
    Many(Vec<Interpretation>),
}

/// An interpreter asking a language oracle to phrase the question as
/// endpoints of the data surface.
pub struct OracleInterpreter {
    oracle: Arc<dyn Oracle>,
    aliases: AliasTable,
    code_fence: Regex,
}

impl OracleInterpreter {
    /// # Errors
    ///
    /// Returns an error if the code fence pattern fails to compile.
    pub fn new(oracle: Arc<dyn Oracle>, aliases: AliasTable) -> Result<Self> {
        Ok(Self {
            oracle,
            aliases,
            code_fence: Regex::new(r"(?s)```[[:alpha:]]*[ \t]*\n?(.*?)(?:```|$)")?,
        })
    }

    /// The contents of the first markdown code block in `text`, or all of
    /// `text` when it has none.
    fn strip_code_fences<'a>(&self, text: &'a str) -> &'a str {
        self.code_fence
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map_or(text, |m| m.as_str())
            .trim()
    }

    fn parse(&self, text: &str) -> Result<Vec<QueryIntent>, InterpretError> {
        let body = self.strip_code_fences(text);
        let answer: Answer =
            serde_json::from_str(body).map_err(|e| InterpretError::Malformed(e.to_string()))?;
        let items = match answer {
            Answer::One(item) => vec![item],
            Answer::Many(items) => items,
        };
        if items.is_empty() {
            return Err(InterpretError::Malformed(
                "the interpretation holds no query".to_string(),
            ));
        }
        items.into_iter().map(|item| self.intent(item)).collect()
    }

    fn intent(&self, item: Interpretation) -> Result<QueryIntent, InterpretError> {
        let mut intent = endpoint::parse(&item.endpoint)?;
        if let Some(name) = item.entity.as_deref() {
            if Entity::from_name(name) != Some(intent.entity) {
                return Err(InterpretError::Malformed(format!(
                    "entity `{name}` does not match endpoint {}",
                    item.endpoint
                )));
            }
        }
        // Only row-returning operations project; other operations may name
        // pseudo-fields such as "count".
        if intent.output_fields.is_empty()
            && matches!(intent.operation, Operation::List | Operation::GetById(_))
        {
            intent.output_fields = item.fields.unwrap_or_default();
        }
        self.aliases.canonicalize(&mut intent);
        Ok(intent)
    }
}

#[async_trait]
impl Interpreter for OracleInterpreter {
    async fn interpret(
        &self,
        text: &str,
        vocabulary: &CategoryVocabulary,
    ) -> Result<Vec<QueryIntent>, InterpretError> {
        let prompt = format!(
            "{}\nUser query: {text}\n",
            instruction(vocabulary, &self.aliases)
        );
        debug!(%prompt, "Interpreting");
        let answer = self
            .oracle
            .complete(&prompt)
            .await
            .map_err(|e| InterpretError::Oracle(format!("{e:#}")))?;
        debug!(%answer, "Oracle interpretation");
        let intents = self.parse(&answer)?;
        info!("Interpreted the question as {} intent(s)", intents.len());
        Ok(intents)
    }
}
