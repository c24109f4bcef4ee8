//! Pipeline repository port: the Rule Store.

use std::future::Future;

use formflow_domain::error::FormflowError;
use formflow_domain::id::{EventId, FormId, PipelineId};
use formflow_domain::pipeline::PipelineConfiguration;

/// Persistence for [`PipelineConfiguration`]s. No business rules live here;
/// validation and authorization happen in the services calling it.
pub trait PipelineRepository {
    /// Persist a new pipeline.
    fn create(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send;

    /// Get a pipeline by its unique identifier.
    fn get_by_id(
        &self,
        id: PipelineId,
    ) -> impl Future<Output = Result<Option<PipelineConfiguration>, FormflowError>> + Send;

    /// Replace a stored pipeline.
    ///
    /// Returns [`FormflowError::NotFound`] when no pipeline has that id.
    fn update(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send;

    /// Delete a pipeline.
    ///
    /// Returns [`FormflowError::NotFound`] when no pipeline has that id.
    fn delete(&self, id: PipelineId) -> impl Future<Output = Result<(), FormflowError>> + Send;

    /// Coarse filter for matching: every pipeline whose trigger has the given
    /// discriminator and listens on `form_id`, in insertion order.
    ///
    /// The returned vector is a snapshot taken once per call.
    fn list_candidates(
        &self,
        discriminator: &'static str,
        form_id: FormId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send;

    /// Secondary lookup: every pipeline attached to a platform event.
    fn list_by_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send;
}

impl<T: PipelineRepository + Send + Sync> PipelineRepository for std::sync::Arc<T> {
    fn create(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send {
        (**self).create(pipeline)
    }

    fn get_by_id(
        &self,
        id: PipelineId,
    ) -> impl Future<Output = Result<Option<PipelineConfiguration>, FormflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send {
        (**self).update(pipeline)
    }

    fn delete(&self, id: PipelineId) -> impl Future<Output = Result<(), FormflowError>> + Send {
        (**self).delete(id)
    }

    fn list_candidates(
        &self,
        discriminator: &'static str,
        form_id: FormId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send {
        (**self).list_candidates(discriminator, form_id)
    }

    fn list_by_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send {
        (**self).list_by_event(event_id)
    }
}
