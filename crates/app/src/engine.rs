//! Pipeline engine: consumes domain events from the broker, matches them
//! against stored pipelines and dispatches the matched actions.
//!
//! One engine is shared by every consumer task. A delivery is acked once all
//! matched pipelines have been dispatched (whatever the per-action outcomes);
//! a storage failure nacks it so the broker redelivers, and the execution log
//! turns the redelivery into a retry of only what did not succeed.

use std::time::Duration;

use tokio::sync::watch;

use formflow_domain::domain_event::DomainEvent;
use formflow_domain::error::FormflowError;
use formflow_domain::execution::DispatchReport;

use crate::dispatcher::ActionDispatcher;
use crate::matcher::EventMatcher;
use crate::ports::{
    AccessGrantRepository, Delivery, EmailSender, EmailTemplateRepository, EventConsumer,
    ExecutionLog, PipelineRepository, TimerStore, WebhookClient,
};

pub struct PipelineEngine<R, L, T, M, W, G, S> {
    matcher: EventMatcher<R>,
    dispatcher: ActionDispatcher<L, T, M, W, G, S>,
    retry_backoff: Duration,
}

impl<R, L, T, M, W, G, S> PipelineEngine<R, L, T, M, W, G, S>
where
    R: PipelineRepository,
    L: ExecutionLog,
    T: EmailTemplateRepository,
    M: EmailSender,
    W: WebhookClient,
    G: AccessGrantRepository,
    S: TimerStore,
{
    pub fn new(matcher: EventMatcher<R>, dispatcher: ActionDispatcher<L, T, M, W, G, S>) -> Self {
        Self {
            matcher,
            dispatcher,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Pause applied after a failed delivery or a broker error.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Match one occurrence and dispatch every matched pipeline in match order.
    ///
    /// # Errors
    ///
    /// Returns the first storage error met while matching or dispatching.
    /// Every matched pipeline is still attempted.
    #[tracing::instrument(skip_all, fields(occurrence_id = %event.id))]
    pub async fn process_event(
        &self,
        event: &DomainEvent,
    ) -> Result<Vec<DispatchReport>, FormflowError> {
        let pipelines = self.matcher.match_event(event).await?;
        let mut reports = Vec::with_capacity(pipelines.len());
        let mut first_error = None;

        for pipeline in &pipelines {
            match self.dispatcher.dispatch(pipeline, event).await {
                Ok(report) => {
                    tracing::info!(
                        pipeline_id = %pipeline.id,
                        actions = report.actions.len(),
                        failures = report.failures(),
                        "pipeline dispatched"
                    );
                    reports.push(report);
                }
                Err(err) => {
                    tracing::warn!(pipeline_id = %pipeline.id, error = %err, "pipeline dispatch incomplete");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(reports),
        }
    }

    /// Consume until the stream closes or `shutdown` flips to `true`.
    pub async fn run<C: EventConsumer>(&self, mut consumer: C, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("pipeline consumer started");
        loop {
            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("pipeline consumer shutting down");
                        break;
                    }
                    continue;
                }
                next = consumer.next() => next,
            };

            match next {
                Ok(Some(delivery)) => self.handle(&mut consumer, delivery).await,
                Ok(None) => {
                    tracing::info!("broker stream closed");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "broker receive failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    async fn handle<C: EventConsumer>(&self, consumer: &mut C, delivery: Delivery<C::Receipt>) {
        let Delivery { event, receipt } = delivery;
        match self.process_event(&event).await {
            Ok(_) => {
                if let Err(err) = consumer.ack(receipt).await {
                    tracing::warn!(occurrence_id = %event.id, error = %err, "ack failed");
                }
            }
            Err(err) => {
                tracing::warn!(occurrence_id = %event.id, error = %err, "processing failed, requesting redelivery");
                if let Err(err) = consumer.nack(receipt).await {
                    tracing::warn!(occurrence_id = %event.id, error = %err, "nack failed");
                }
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
    }
}
