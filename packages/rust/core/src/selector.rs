//! Category → retrieval plan mapping.

use std::collections::{BTreeMap, BTreeSet};

use graphqna_shared::{Category, GraphQnaError, MethodId, Result, RetrievalPlan};

/// Built-in plan for a category: primary method first, then fallbacks in order.
pub fn default_plan(category: Category) -> Vec<MethodId> {
    use MethodId::*;
    match category {
        Category::Factual | Category::Procedural => vec![GraphEnhanced, Vector],
        Category::Entity => vec![SchemaGuidedKnowledgeGraph, GraphEnhanced],
        Category::Relationship => vec![SchemaGuidedKnowledgeGraph, KnowledgeGraph],
        Category::Unknown => vec![GraphEnhanced, Vector, KnowledgeGraph],
    }
}

/// Maps a category (or an explicit override) to an ordered plan.
///
/// Plans are resolved once at construction; `select` is a pure lookup.
#[derive(Debug, Clone)]
pub struct MethodSelector {
    plans: BTreeMap<Category, RetrievalPlan>,
    enabled: BTreeSet<MethodId>,
}

impl MethodSelector {
    /// Resolve every category's plan: the override if given, else the
    /// built-in plan, with disabled methods removed.
    ///
    /// Fails if the enabled set is empty or any category ends up with an
    /// empty or repeating plan.
    pub fn new(
        overrides: &BTreeMap<Category, Vec<MethodId>>,
        enabled: &[MethodId],
    ) -> Result<Self> {
        let enabled: BTreeSet<MethodId> = enabled.iter().copied().collect();
        if enabled.is_empty() {
            return Err(GraphQnaError::config("no retrieval methods are enabled"));
        }

        let mut plans = BTreeMap::new();
        for category in Category::ALL {
            let configured = overrides
                .get(&category)
                .cloned()
                .unwrap_or_else(|| default_plan(category));
            if overrides.contains_key(&category) {
                // Explicit plans may not name disabled methods.
                if let Some(disabled) = configured.iter().find(|m| !enabled.contains(m)) {
                    return Err(GraphQnaError::config(format!(
                        "plan for '{category}' uses '{disabled}', which is not enabled"
                    )));
                }
            }
            let methods: Vec<MethodId> = configured
                .into_iter()
                .filter(|m| enabled.contains(m))
                .collect();
            let plan = RetrievalPlan::new(methods).map_err(|e| {
                GraphQnaError::config(format!("invalid plan for '{category}': {e}"))
            })?;
            plans.insert(category, plan);
        }

        Ok(Self { plans, enabled })
    }

    /// Plan for a question. An override yields exactly `[override]`.
    pub fn select(
        &self,
        category: Category,
        method_override: Option<MethodId>,
    ) -> Result<RetrievalPlan> {
        match method_override {
            Some(method) if self.enabled.contains(&method) => Ok(RetrievalPlan::single(method)),
            Some(method) => Err(GraphQnaError::config(format!(
                "retrieval method '{method}' is not enabled"
            ))),
            None => Ok(self.plans[&category].clone()),
        }
    }

    /// The resolved plan for every category.
    pub fn plans(&self) -> &BTreeMap<Category, RetrievalPlan> {
        &self.plans
    }

    pub fn enabled(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.enabled.iter().copied()
    }
}
