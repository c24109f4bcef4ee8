//! Event matcher: selects the pipelines a domain event activates.

use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::FormflowError;
use formflow_domain::pipeline::PipelineConfiguration;

use crate::ports::PipelineRepository;

/// Pure, read-only matching over a snapshot of the Rule Store.
pub struct EventMatcher<R> {
    repo: R,
}

impl<R: PipelineRepository> EventMatcher<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Pipelines whose trigger matches `event`, in store iteration order.
    ///
    /// The store narrows candidates by discriminator and form; trigger
    /// conditions are evaluated here. No match is an empty vector.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the candidate query fails.
    #[tracing::instrument(skip_all, fields(occurrence_id = %event.id, kind = event.discriminator()))]
    pub async fn match_event(
        &self,
        event: &DomainEvent,
    ) -> Result<Vec<PipelineConfiguration>, FormflowError> {
        let candidates = self
            .repo
            .list_candidates(event.discriminator(), event.kind.form_id().clone())
            .await?;
        let candidate_count = candidates.len();
        let matched: Vec<_> = candidates
            .into_iter()
            .filter(|pipeline| pipeline.event.matches(event))
            .collect();
        tracing::debug!(candidate_count, matched = matched.len(), "matched domain event");
        Ok(matched)
    }
}
