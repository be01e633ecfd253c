use std::fmt;

use crate::models::KinaseName;

/// Portal search expression for one kinase, restricted to human studies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn build_query(kinase: &KinaseName) -> SearchQuery {
    SearchQuery(format!(
        "({}[Title/Abstract]) AND (human[Title/Abstract] OR humans[MeSH Terms])",
        kinase.as_str()
    ))
}
