//! Expansion of checks into concrete, ordered cases.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Fixture, Parametrization, Target};
use crate::checks::{Check, CheckParam};

/// One runnable case: a check, a target and an optional check parameter
#[derive(Clone, Serialize)]
pub struct Case {
    /// `module::check[target-param]`
    pub id: String,
    pub module: &'static str,
    pub check: &'static str,
    pub fixture: Fixture,
    pub target_id: String,
    pub target: Target,
    pub param: Option<CheckParam>,
    #[serde(skip)]
    pub runner: Arc<dyn Check>,
}

impl std::fmt::Debug for Case {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case").field("id", &self.id).finish()
    }
}

/// Selects which collected cases run
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Substring every selected case id must contain
    pub keyword: Option<String>,
    /// Modules to keep; empty keeps all
    pub modules: Vec<String>,
}

impl CaseFilter {
    pub fn matches(&self, module: &str, id: &str) -> bool {
        let module_ok = self.modules.is_empty() || self.modules.iter().any(|m| m == module);
        let keyword_ok = self.keyword.as_deref().is_none_or(|k| id.contains(k));
        module_ok && keyword_ok
    }

    /// Whether any check of `module` can be selected
    pub fn selects_module(&self, module: &str) -> bool {
        self.modules.is_empty() || self.modules.iter().any(|m| m == module)
    }
}

/// Fixtures needed by the checks the filter keeps
pub fn requested_fixtures(checks: &[Arc<dyn Check>], filter: &CaseFilter) -> BTreeSet<Fixture> {
    checks
        .iter()
        .filter(|c| filter.selects_module(c.module()))
        .map(|c| c.fixture())
        .collect()
}

fn case_id(module: &str, check: &str, target: &str, param: Option<&CheckParam>) -> String {
    match param {
        Some(param) => format!("{module}::{check}[{target}-{}]", param.id),
        None => format!("{module}::{check}[{target}]"),
    }
}

/// Expand every check over its fixture's cases and its own parameters.
///
/// Cases come out in check registration order, then target order, then
/// parameter order.
pub fn collect(
    checks: &[Arc<dyn Check>],
    parametrizations: &[Parametrization],
    filter: &CaseFilter,
) -> Vec<Case> {
    let mut cases = Vec::new();

    for check in checks {
        let Some(parametrization) = parametrizations
            .iter()
            .find(|p| p.fixture == check.fixture())
        else {
            continue;
        };

        let params = check.params();
        let params: Vec<Option<CheckParam>> = if params.is_empty() {
            vec![None]
        } else {
            params.into_iter().map(Some).collect()
        };

        for fixture_case in &parametrization.cases {
            for param in &params {
                let id = case_id(check.module(), check.name(), &fixture_case.id, param.as_ref());
                if !filter.matches(check.module(), &id) {
                    continue;
                }
                cases.push(Case {
                    id,
                    module: check.module(),
                    check: check.name(),
                    fixture: check.fixture(),
                    target_id: fixture_case.id.clone(),
                    target: fixture_case.target.clone(),
                    param: param.clone(),
                    runner: Arc::clone(check),
                });
            }
        }
    }

    cases
}
