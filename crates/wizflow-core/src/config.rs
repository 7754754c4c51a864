use serde::{Deserialize, Serialize};

/// Tunables of flow execution and validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Classes whose subclass spells must show up as always prepared
    #[serde(default = "default_always_prepared_classes")]
    pub always_prepared_classes: Vec<String>,

    /// Character level subclass grants are checked at
    #[serde(default = "default_subclass_level")]
    pub subclass_level: u32,

    /// Upper bound on re-fetch passes when resolving every required choice
    #[serde(default = "default_max_resolve_passes")]
    pub max_resolve_passes: u32,
}

fn default_always_prepared_classes() -> Vec<String> {
    ["cleric", "druid", "paladin", "artificer"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_subclass_level() -> u32 {
    1
}

fn default_max_resolve_passes() -> u32 {
    10
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            always_prepared_classes: default_always_prepared_classes(),
            subclass_level: default_subclass_level(),
            max_resolve_passes: default_max_resolve_passes(),
        }
    }
}

impl HarnessConfig {
    /// Matches on the last path segment, so `phb:cleric` counts as `cleric`.
    pub fn is_always_prepared_class(&self, class_slug: &str) -> bool {
        let base = class_slug.rsplit(':').next().unwrap_or(class_slug);
        self.always_prepared_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(base))
    }
}
