//! Endpoint resolver: picks the CRM resource a free-text query refers to.
//!
//! Scoring is deliberately plain substring containment:
//! - the query is lower-cased and split on whitespace,
//! - a descriptor scores one point for every (token, term) pair where either string contains the
//!   other,
//! - the strictly highest score wins; ties go to the descriptor declared first,
//! - an all-zero board falls back to the catalog default.
//!
//! Short tokens over-match (`"a"` is contained in most terms). Callers rely on these exact
//! matches; do not tighten the rule.

use crate::catalog::{ResourceCatalog, ResourceDescriptor};
use serde::Serialize;
use tracing::{debug, warn};

/// Score of one descriptor for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceScore {
    pub key: String,
    pub score: usize,
}

/// Why a descriptor was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionReason {
    /// The caller named the resource key explicitly.
    Explicit,
    /// The query was absent or empty.
    EmptyQuery,
    /// The descriptor had the highest term score.
    Matched,
    /// No descriptor scored; the default was used.
    Fallback,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub descriptor: &'a ResourceDescriptor,
    pub reason: ResolutionReason,
    pub score: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointResolver<'a> {
    catalog: &'a ResourceCatalog,
}

impl<'a> EndpointResolver<'a> {
    #[must_use]
    pub fn new(catalog: &'a ResourceCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the resource for a query and an optional explicit resource key. Never fails.
    #[must_use]
    pub fn resolve(
        &self,
        query: Option<&str>,
        explicit_key: Option<&str>,
    ) -> &'a ResourceDescriptor {
        self.resolve_detailed(query, explicit_key).descriptor
    }

    /// Like [`EndpointResolver::resolve`], also reporting why and with which score.
    #[must_use]
    pub fn resolve_detailed(
        &self,
        query: Option<&str>,
        explicit_key: Option<&str>,
    ) -> Resolution<'a> {
        if let Some(key) = explicit_key {
            if let Some(descriptor) = self.catalog.lookup(key) {
                return Resolution {
                    descriptor,
                    reason: ResolutionReason::Explicit,
                    score: 0,
                };
            }
            warn!(
                endpoint = %key,
                "explicit endpoint does not name a catalog resource; inferring from query"
            );
        }

        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Resolution {
                descriptor: self.catalog.default_resource(),
                reason: ResolutionReason::EmptyQuery,
                score: 0,
            };
        };

        let tokens = tokenize(query);
        let mut best: Option<(&'a ResourceDescriptor, usize)> = None;
        for descriptor in self.catalog.all() {
            let score = score_tokens(&tokens, descriptor);
            // Strictly greater: earlier declarations keep ties.
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((descriptor, score));
            }
        }

        match best {
            Some((descriptor, score)) => {
                debug!(resource = %descriptor.key(), score, "resolved query to resource");
                Resolution {
                    descriptor,
                    reason: ResolutionReason::Matched,
                    score,
                }
            }
            None => {
                debug!(
                    resource = %self.catalog.default_resource().key(),
                    "no resource terms matched; using default"
                );
                Resolution {
                    descriptor: self.catalog.default_resource(),
                    reason: ResolutionReason::Fallback,
                    score: 0,
                }
            }
        }
    }

    /// Every descriptor's score for `query`, in declaration order.
    #[must_use]
    pub fn explain(&self, query: &str) -> Vec<ResourceScore> {
        let tokens = tokenize(query);
        self.catalog
            .all()
            .iter()
            .map(|d| ResourceScore {
                key: d.key().to_string(),
                score: score_tokens(&tokens, d),
            })
            .collect()
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn score_tokens(tokens: &[String], descriptor: &ResourceDescriptor) -> usize {
    descriptor
        .terms()
        .iter()
        .map(|term| {
            tokens
                .iter()
                .filter(|token| token.contains(term.as_str()) || term.contains(token.as_str()))
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSpec, ResourceCatalog, ResourceDescriptor};

    fn builtin() -> EndpointResolver<'static> {
        EndpointResolver::new(ResourceCatalog::builtin())
    }

    #[test]
    fn single_resource_terms_resolve_to_that_resource() {
        let r = builtin();
        for (query, expected) in [
            ("show all contacts please", "contacts"),
            ("contact", "contacts"),
            ("who are the new leads", "contacts"),
            ("campaign", "campaigns"),
            ("running automations", "campaigns"),
            ("segments", "segments"),
            ("asset", "assets"),
            ("top downloads", "assets"),
            ("monthly reports", "reports"),
            ("signup forms", "forms"),
            ("landing pages", "pages"),
            ("recent emails", "emails"),
        ] {
            assert_eq!(r.resolve(Some(query), None).key(), expected, "query: {query}");
        }
    }

    #[test]
    fn show_me_my_campaigns_resolves_to_campaigns() {
        let resolution = builtin().resolve_detailed(Some("show me my campaigns"), None);
        assert_eq!(resolution.descriptor.key(), "campaigns");
        assert_eq!(resolution.reason, ResolutionReason::Matched);
    }

    #[test]
    fn higher_match_count_wins() {
        // segments: 4 pairs vs emails: 2 pairs, then the other way around.
        let r = builtin();
        assert_eq!(
            r.resolve(Some("segment segments emails"), None).key(),
            "segments"
        );
        assert_eq!(r.resolve(Some("email emails segment"), None).key(), "emails");
    }

    #[test]
    fn equal_scores_go_to_the_earlier_declaration() {
        let r = builtin();
        let scores = r.explain("campaign lists");
        let campaigns = scores.iter().find(|s| s.key == "campaigns").expect("campaigns");
        let segments = scores.iter().find(|s| s.key == "segments").expect("segments");
        assert_eq!(campaigns.score, segments.score);
        assert!(campaigns.score > 0);
        assert_eq!(r.resolve(Some("campaign lists"), None).key(), "campaigns");
        // Order of words in the query does not matter.
        assert_eq!(r.resolve(Some("lists campaign"), None).key(), "campaigns");
    }

    #[test]
    fn absent_or_empty_query_uses_default() {
        let r = builtin();
        assert_eq!(r.resolve(None, None).key(), "contacts");
        let empty = r.resolve_detailed(Some(""), None);
        assert_eq!(empty.descriptor.key(), "contacts");
        assert_eq!(empty.reason, ResolutionReason::EmptyQuery);
        assert_eq!(r.resolve(Some("   "), None).key(), "contacts");
    }

    #[test]
    fn unmatched_query_falls_back_to_default() {
        let resolution = builtin().resolve_detailed(Some("find john@example.com"), None);
        assert_eq!(resolution.descriptor.key(), "contacts");
        assert_eq!(resolution.reason, ResolutionReason::Fallback);
    }

    #[test]
    fn explicit_key_wins_over_inference() {
        let r = builtin();
        let resolution = r.resolve_detailed(Some("show me my campaigns"), Some("forms"));
        assert_eq!(resolution.descriptor.key(), "forms");
        assert_eq!(resolution.reason, ResolutionReason::Explicit);
        // Unknown explicit keys fall through to inference.
        assert_eq!(
            r.resolve(Some("show me my campaigns"), Some("deals")).key(),
            "campaigns"
        );
        // Response keys are not resource keys.
        assert_eq!(r.resolve(None, Some("lists")).key(), "contacts");
    }

    #[test]
    fn matching_is_case_insensitive_and_bidirectional() {
        let r = builtin();
        // token inside term
        assert_eq!(r.resolve(Some("CAMP"), None).key(), "campaigns");
        // term inside token
        assert_eq!(r.resolve(Some("Newsletter-Segments"), None).key(), "segments");
    }

    #[test]
    fn explain_reports_every_descriptor_in_order() {
        let scores = builtin().explain("contacts");
        assert_eq!(scores.len(), ResourceCatalog::builtin().all().len());
        assert_eq!(scores[0].key, "contacts");
        // "contacts" contains "contact" and equals "contacts".
        assert_eq!(scores[0].score, 2);
        assert!(scores[1..].iter().all(|s| s.score == 0));
    }

    #[test]
    fn custom_catalog_needs_no_resolver_changes() {
        let catalog = ResourceCatalog::new(vec![
            ResourceDescriptor::new("contacts", "contacts", "contacts", &["contact"])
                .with_field(FieldSpec::id("Contact ID")),
            ResourceDescriptor::new("deals", "deals", "deals", &["deal", "opportunity"])
                .with_search_param("q")
                .with_field(FieldSpec::id("Deal ID")),
        ])
        .expect("valid catalog");
        let r = EndpointResolver::new(&catalog);
        assert_eq!(r.resolve(Some("open opportunity deals"), None).key(), "deals");
        assert_eq!(r.resolve(Some("nothing here"), None).key(), "contacts");
    }
}
