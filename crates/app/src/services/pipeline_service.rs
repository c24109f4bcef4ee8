//! Pipeline service: organizer-gated use-cases over the Rule Store.

use formflow_domain::error::{FormflowError, NotFoundError};
use formflow_domain::id::{EventId, PipelineId, UserId};
use formflow_domain::pipeline::{PipelineConfiguration, PipelineDraft};

use crate::ports::{EventRepository, PipelineRepository};
use crate::services::authorization::AuthorizationGuard;

/// Application service for pipeline CRUD.
///
/// Every method takes the already-authenticated caller. Validation runs
/// before anything is written, so a rejected payload never reaches the store.
pub struct PipelineService<R, E> {
    repo: R,
    guard: AuthorizationGuard<E>,
}

impl<R, E> PipelineService<R, E>
where
    R: PipelineRepository,
    E: EventRepository,
{
    /// Create a new service backed by the given repository and guard.
    pub fn new(repo: R, guard: AuthorizationGuard<E>) -> Self {
        Self { repo, guard }
    }

    /// Validate, authorize against the draft's `eventID`, then persist under
    /// a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::Schema`] if invariants fail,
    /// [`FormflowError::Authorization`] if `user` is not an organizer,
    /// [`FormflowError::NotFound`] if the event does not exist, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self, draft), fields(user = %user, event = %draft.event_id))]
    pub async fn create(
        &self,
        user: &UserId,
        draft: PipelineDraft,
    ) -> Result<PipelineConfiguration, FormflowError> {
        let pipeline = draft.into_pipeline(PipelineId::new(), formflow_domain::time::now());
        pipeline.validate()?;
        self.guard.authorize(user, &pipeline.event_id).await?;
        let created = self.repo.create(pipeline).await?;
        tracing::info!(pipeline_id = %created.id, "pipeline created");
        Ok(created)
    }

    /// Full read, organizers only.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::NotFound`] when no pipeline with `id` exists,
    /// [`FormflowError::Authorization`] for non-organizers, or a storage error.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn get(
        &self,
        user: &UserId,
        id: PipelineId,
    ) -> Result<PipelineConfiguration, FormflowError> {
        let pipeline = self.load(id).await?;
        self.guard.authorize(user, &pipeline.event_id).await?;
        Ok(pipeline)
    }

    /// Replace a pipeline's event, actions and owning event.
    ///
    /// The caller must organize the event the stored pipeline belongs to and,
    /// when `eventID` changes, the new one as well.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create), plus [`FormflowError::NotFound`]
    /// when no pipeline with `id` exists.
    #[tracing::instrument(skip(self, draft), fields(user = %user))]
    pub async fn update(
        &self,
        user: &UserId,
        id: PipelineId,
        draft: PipelineDraft,
    ) -> Result<PipelineConfiguration, FormflowError> {
        let existing = self.load(id).await?;
        self.guard.authorize(user, &existing.event_id).await?;

        let pipeline = draft.into_pipeline(id, formflow_domain::time::now());
        pipeline.validate()?;
        if pipeline.event_id != existing.event_id {
            self.guard.authorize(user, &pipeline.event_id).await?;
        }
        self.repo.update(pipeline).await
    }

    /// Delete a pipeline. Timers already scheduled by earlier runs are kept.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::NotFound`], [`FormflowError::Authorization`],
    /// or a storage error.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn delete(&self, user: &UserId, id: PipelineId) -> Result<(), FormflowError> {
        let existing = self.load(id).await?;
        self.guard.authorize(user, &existing.event_id).await?;
        self.repo.delete(id).await?;
        tracing::info!(pipeline_id = %id, "pipeline deleted");
        Ok(())
    }

    /// Every pipeline attached to `event_id`, organizers only.
    ///
    /// # Errors
    ///
    /// Returns [`FormflowError::NotFound`] if the event does not exist,
    /// [`FormflowError::Authorization`], or a storage error.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn list_for_event(
        &self,
        user: &UserId,
        event_id: EventId,
    ) -> Result<Vec<PipelineConfiguration>, FormflowError> {
        self.guard.authorize(user, &event_id).await?;
        self.repo.list_by_event(event_id).await
    }

    async fn load(&self, id: PipelineId) -> Result<PipelineConfiguration, FormflowError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Pipeline",
                id: id.to_string(),
            }
            .into()
        })
    }
}
