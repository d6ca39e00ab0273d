use bookfuse_core::config::SurvivorshipConfig;
use bookfuse_core::{CanonicalField, SourceKind};

/// How an absent text attribute on the winner is back-filled from siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// Longest sibling value; ties go to the earlier-ranked sibling.
    Longest,
    /// First sibling in rank order that has a value.
    FirstRanked,
}

/// Heuristics the merger consults while picking and completing a winner.
pub trait SurvivorshipPolicy {
    /// Lower ranks win ties on completeness.
    fn source_rank(&self, source: SourceKind) -> usize;

    fn fill_rule(&self, field: CanonicalField) -> FillRule;
}

#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    priority: Vec<SourceKind>,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::from_config(&SurvivorshipConfig::default())
    }
}

impl DefaultPolicy {
    pub fn from_config(config: &SurvivorshipConfig) -> Self {
        let mut priority = Vec::with_capacity(SourceKind::ALL.len());
        for source in config.source_priority.iter().chain(SourceKind::ALL.iter()) {
            if !priority.contains(source) {
                priority.push(*source);
            }
        }
        Self { priority }
    }

    pub fn priority(&self) -> &[SourceKind] {
        &self.priority
    }
}

impl SurvivorshipPolicy for DefaultPolicy {
    fn source_rank(&self, source: SourceKind) -> usize {
        self.priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.priority.len())
    }

    fn fill_rule(&self, _field: CanonicalField) -> FillRule {
        FillRule::Longest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefers_bibliographic_api() {
        let policy = DefaultPolicy::default();
        assert!(
            policy.source_rank(SourceKind::BibliographicApi)
                < policy.source_rank(SourceKind::CatalogScrape)
        );
    }

    #[test]
    fn test_configured_priority_is_completed_with_missing_sources() {
        let config = SurvivorshipConfig {
            source_priority: vec![SourceKind::CatalogScrape],
        };
        let policy = DefaultPolicy::from_config(&config);
        assert_eq!(
            policy.priority(),
            &[SourceKind::CatalogScrape, SourceKind::BibliographicApi]
        );
    }
}
