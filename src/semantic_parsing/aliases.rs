use serde::{Deserialize, Serialize};

use crate::intent::QueryIntent;

/// A canonical database value and the spellings users write it as.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alias {
    pub canonical: String,
    pub variants: Vec<String>,
    /// Filter keys the alias rewrites. When empty, every filter key except
    /// codes and identifiers.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Alias {
    fn new(canonical: &str, variants: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            variants: variants.iter().map(ToString::to_string).collect(),
            fields: Vec::new(),
        }
    }

    fn on(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    fn applies_to(&self, key: &str) -> bool {
        let key = key.trim();
        if self.fields.is_empty() {
            !key.ends_with("_code") && !key.ends_with("_id")
        } else {
            self.fields.iter().any(|f| f.trim().eq_ignore_ascii_case(key))
        }
    }

    fn matches(&self, value: &str) -> bool {
        let value = value.trim();
        self.canonical.eq_ignore_ascii_case(value)
            || self.variants.iter().any(|v| v.trim().eq_ignore_ascii_case(value))
    }
}

/// Known spellings of filter values, given to the oracle as normalization
/// rules and applied again to the values it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    aliases: Vec<Alias>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(vec![
            Alias::new("D-Link", &["d link", "dlink", "d-link", "drink"]).on(&["oem_name"]),
            Alias::new("ECS-2100", &["ecs2100", "ecs-2100", "ecs 2100"]).on(&["model_name"]),
            Alias::new("Juniper", &["juniper", "junipr", "jun per"]).on(&["oem_name"]),
            Alias::new("Fiberhome", &["fiberhome", "fiber home", "fiber-home"]).on(&["oem_name"]),
            Alias::new("Broadband Network Gateway", &["bng"]).on(&["equipment_subtype"]),
            Alias::new("Uttar Pradesh", &["uttarpradesh", "uttar pradesh", "up"])
                .on(&["state_name"]),
            Alias::new("Delhi", &["delhi", "dilli"]).on(&["state_name"]),
            Alias::new("Agartala", &["agartla", "agartaala", "agartala"]).on(&["pop_name"]),
        ])
    }
}

impl AliasTable {
    pub fn new(aliases: Vec<Alias>) -> Self {
        Self { aliases }
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// The canonical spelling of `value`, if the table knows it.
    pub fn canonical(&self, value: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|alias| alias.matches(value))
            .map(|alias| alias.canonical.as_str())
    }

    /// Replaces each filter value of `intent` the table knows for that
    /// filter key with its canonical spelling.
    pub fn canonicalize(&self, intent: &mut QueryIntent) {
        for (key, value) in intent.filters.iter_mut() {
            let canonical = self
                .aliases
                .iter()
                .find(|alias| alias.applies_to(key) && alias.matches(value))
                .map(|alias| alias.canonical.as_str());
            if let Some(canonical) = canonical {
                if canonical != value.as_str() {
                    *value = canonical.to_string();
                }
            }
        }
    }

    /// One prompt line per alias, e.g. `- "dlink", "d link" → "D-Link"`.
    pub(super) fn instructions(&self) -> String {
        self.aliases
            .iter()
            .map(|alias| {
                let variants: Vec<String> =
                    alias.variants.iter().map(|v| format!("\"{v}\"")).collect();
                let line = format!("- {} → \"{}\"", variants.join(", "), alias.canonical);
                if alias.fields.is_empty() {
                    line
                } else {
                    format!("{line} (in {})", alias.fields.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
