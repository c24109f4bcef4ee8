//! Action dispatcher: runs a matched pipeline's actions for one occurrence.
//!
//! Each action is claimed in the execution log under
//! `(pipeline, action index, occurrence)` before it runs, so a redelivered
//! occurrence never repeats a side effect that already succeeded. Actions are
//! independent: a failed webhook does not stop the email after it.

use std::collections::BTreeMap;

use formflow_domain::access::AccessGrant;
use formflow_domain::domain_event::DomainEvent;
use formflow_domain::email::render;
use formflow_domain::error::{ActionExecutionError, FormflowError};
use formflow_domain::execution::{
    ActionOutcome, ActionReport, DispatchReport, ExecutionKey, ExecutionStatus,
};
use formflow_domain::pipeline::{
    AllowFormAccess, PipelineAction, PipelineConfiguration, SendEmail, Webhook,
};
use formflow_domain::time::Timestamp;
use formflow_domain::timer::{ScheduledTimer, TimerKind};

use crate::ports::{
    AccessGrantRepository, EmailSender, EmailTemplateRepository, ExecutionLog, TimerStore,
    WebhookClient, WebhookRequest,
};

/// Executes immediate actions and schedules deferred ones.
pub struct ActionDispatcher<L, T, M, W, G, S> {
    log: L,
    templates: T,
    mailer: M,
    webhooks: W,
    grants: G,
    timers: S,
}

impl<L, T, M, W, G, S> ActionDispatcher<L, T, M, W, G, S>
where
    L: ExecutionLog,
    T: EmailTemplateRepository,
    M: EmailSender,
    W: WebhookClient,
    G: AccessGrantRepository,
    S: TimerStore,
{
    pub fn new(log: L, templates: T, mailer: M, webhooks: W, grants: G, timers: S) -> Self {
        Self {
            log,
            templates,
            mailer,
            webhooks,
            grants,
            timers,
        }
    }

    /// Dispatch with the pipeline run starting now.
    ///
    /// # Errors
    ///
    /// See [`dispatch_at`](Self::dispatch_at).
    pub async fn dispatch(
        &self,
        pipeline: &PipelineConfiguration,
        event: &DomainEvent,
    ) -> Result<DispatchReport, FormflowError> {
        self.dispatch_at(pipeline, event, formflow_domain::time::now())
            .await
    }

    /// Run every action of `pipeline` in order for `event`, with expiry and
    /// reminder times computed from `run_at`.
    ///
    /// Per-action failures are reported as [`ActionOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns the first storage error met. Every action is still attempted;
    /// the error only tells the caller the occurrence needs redelivery.
    #[tracing::instrument(skip_all, fields(pipeline_id = %pipeline.id, occurrence_id = %event.id))]
    pub async fn dispatch_at(
        &self,
        pipeline: &PipelineConfiguration,
        event: &DomainEvent,
        run_at: Timestamp,
    ) -> Result<DispatchReport, FormflowError> {
        let mut actions = Vec::with_capacity(pipeline.actions.len());
        let mut first_error = None;

        for (index, action) in pipeline.actions.iter().enumerate() {
            let key = ExecutionKey::new(pipeline.id, index, event.id);
            match self.run_once(key, action, event, run_at).await {
                Ok(outcome) => actions.push(ActionReport {
                    index,
                    action: action.discriminator(),
                    outcome,
                }),
                Err(err) => {
                    tracing::warn!(action_index = index, error = %err, "action aborted by storage failure");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(DispatchReport {
            pipeline_id: pipeline.id,
            occurrence_id: event.id,
            actions,
        })
    }

    async fn run_once(
        &self,
        key: ExecutionKey,
        action: &PipelineAction,
        event: &DomainEvent,
        run_at: Timestamp,
    ) -> Result<ActionOutcome, FormflowError> {
        if !self.log.claim(key).await? {
            tracing::debug!(action_index = key.action_index, "already handled, skipping");
            return Ok(ActionOutcome::Skipped);
        }

        match self.execute(key, action, event, run_at).await {
            Ok(ActionOutcome::Failed(err)) => {
                tracing::warn!(action_index = key.action_index, action = %action, error = %err, "action failed");
                self.log
                    .complete(key, ExecutionStatus::Failed, Some(err.to_string()))
                    .await?;
                Ok(ActionOutcome::Failed(err))
            }
            Ok(outcome) => {
                tracing::info!(action_index = key.action_index, %outcome, "action executed");
                self.log
                    .complete(key, ExecutionStatus::Succeeded, None)
                    .await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(release) = self
                    .log
                    .complete(key, ExecutionStatus::Failed, Some(err.to_string()))
                    .await
                {
                    tracing::error!(execution = %key, error = %release, "could not release execution claim");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        key: ExecutionKey,
        action: &PipelineAction,
        event: &DomainEvent,
        run_at: Timestamp,
    ) -> Result<ActionOutcome, FormflowError> {
        match action {
            PipelineAction::SendEmail(action) => self.send_email(action, event).await,
            PipelineAction::Webhook(action) => Ok(self.call_webhook(action, event).await),
            PipelineAction::AllowFormAccess(action) => {
                self.allow_form_access(key, action, event, run_at).await
            }
        }
    }

    async fn send_email(
        &self,
        action: &SendEmail,
        event: &DomainEvent,
    ) -> Result<ActionOutcome, FormflowError> {
        let Some(template) = self.templates.get_by_id(action.email_template_id).await? else {
            return Ok(ActionOutcome::Failed(ActionExecutionError::Missing(format!(
                "email template {}",
                action.email_template_id
            ))));
        };
        let Some(to) = event.subject.email.clone() else {
            return Ok(ActionOutcome::Failed(ActionExecutionError::Missing(format!(
                "email address of {}",
                event.subject.user_id
            ))));
        };

        let email = template.render(to, &event.template_context());
        Ok(match self.mailer.send(email).await {
            Ok(()) => ActionOutcome::Sent,
            Err(err) => ActionOutcome::Failed(err),
        })
    }

    async fn call_webhook(&self, action: &Webhook, event: &DomainEvent) -> ActionOutcome {
        let ctx = event.template_context();
        let render_all = |values: &BTreeMap<String, String>| {
            values
                .iter()
                .map(|(key, value)| (key.clone(), render(value, &ctx)))
                .collect::<BTreeMap<_, _>>()
        };
        let request = WebhookRequest {
            method: action.method,
            url: action.url.clone(),
            headers: render_all(&action.headers),
            body: render_all(&action.body),
        };

        match self.webhooks.call(request).await {
            Ok(status) if (200..300).contains(&status) => ActionOutcome::Delivered { status },
            Ok(status) => ActionOutcome::Failed(ActionExecutionError::Rejected { status }),
            Err(err) => ActionOutcome::Failed(err),
        }
    }

    async fn allow_form_access(
        &self,
        key: ExecutionKey,
        action: &AllowFormAccess,
        event: &DomainEvent,
        run_at: Timestamp,
    ) -> Result<ActionOutcome, FormflowError> {
        let expiration = &action.options.expiration;
        let expires_at = match expiration.expires_at(run_at) {
            Ok(at) => at,
            Err(err) => return Ok(ActionOutcome::Failed(err)),
        };
        if let Err(err) = expiration.reminder_at(expires_at) {
            return Ok(ActionOutcome::Failed(err));
        }
        let grant = self
            .grants
            .grant(AccessGrant::new(
                action.to_form_id.clone(),
                event.subject.user_id.clone(),
                run_at,
                expires_at,
                key,
            ))
            .await?;

        let timer = |kind, fire_at| {
            ScheduledTimer::pending(
                key,
                kind,
                fire_at,
                action.to_form_id.clone(),
                event.subject.user_id.clone(),
                event.subject.email.clone(),
            )
        };
        self.timers
            .schedule(timer(TimerKind::Expiration, grant.expires_at))
            .await?;
        match expiration.reminder_at(grant.expires_at) {
            Ok(Some(remind_at)) => {
                self.timers
                    .schedule(timer(TimerKind::Reminder, remind_at))
                    .await?;
            }
            Ok(None) => {}
            Err(err) => return Ok(ActionOutcome::Failed(err)),
        }

        Ok(ActionOutcome::Granted {
            expires_at: grant.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{
        InMemoryExecutionLog, InMemoryGrants, InMemoryTemplates, InMemoryTimers, SpyMailer,
        SpyWebhook,
    };
    use crate::ports::{AccessGrantRepository as _, ExecutionLog as _, TimerStore as _};
    use chrono::TimeZone;
    use formflow_domain::domain_event::Subject;
    use formflow_domain::email::EmailTemplate;
    use formflow_domain::id::{EmailTemplateId, EventId, FormId, UserId};
    use formflow_domain::pipeline::{
        ExpirationOptions, FormAccessOptions, FormSubmission, HttpMethod, PipelineEvent,
        ReminderOptions,
    };
    use formflow_domain::time::hours;
    use formflow_domain::timer::TimerState;
    use std::sync::Arc;

    type Dispatcher = ActionDispatcher<
        Arc<InMemoryExecutionLog>,
        Arc<InMemoryTemplates>,
        Arc<SpyMailer>,
        Arc<SpyWebhook>,
        Arc<InMemoryGrants>,
        Arc<InMemoryTimers>,
    >;

    struct Harness {
        dispatcher: Dispatcher,
        log: Arc<InMemoryExecutionLog>,
        mailer: Arc<SpyMailer>,
        webhook: Arc<SpyWebhook>,
        grants: Arc<InMemoryGrants>,
        timers: Arc<InMemoryTimers>,
        template_id: EmailTemplateId,
    }

    fn harness_with(mailer: SpyMailer, webhook: SpyWebhook) -> Harness {
        let template = EmailTemplate {
            id: EmailTemplateId::new(),
            event_id: EventId::new("E1"),
            name: "thanks".to_string(),
            from: "team@example.com".to_string(),
            subject: "Thanks {{name}}".to_string(),
            body: "We received form {{formID}}.".to_string(),
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            is_html: false,
        };
        let template_id = template.id;
        let log = Arc::new(InMemoryExecutionLog::default());
        let mailer = Arc::new(mailer);
        let webhook = Arc::new(webhook);
        let grants = Arc::new(InMemoryGrants::default());
        let timers = Arc::new(InMemoryTimers::default());
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&log),
            Arc::new(InMemoryTemplates::with(vec![template])),
            Arc::clone(&mailer),
            Arc::clone(&webhook),
            Arc::clone(&grants),
            Arc::clone(&timers),
        );
        Harness {
            dispatcher,
            log,
            mailer,
            webhook,
            grants,
            timers,
            template_id,
        }
    }

    fn harness() -> Harness {
        harness_with(SpyMailer::default(), SpyWebhook::default())
    }

    fn pipeline(actions: Vec<PipelineAction>) -> PipelineConfiguration {
        PipelineConfiguration::builder()
            .event(PipelineEvent::FormSubmission(FormSubmission {
                on_form_id: FormId::new("F1"),
            }))
            .actions(actions)
            .event_id("E1")
            .build()
            .unwrap()
    }

    fn send_email(id: EmailTemplateId) -> PipelineAction {
        PipelineAction::SendEmail(SendEmail {
            email_template_id: id,
        })
    }

    fn webhook() -> PipelineAction {
        PipelineAction::Webhook(Webhook {
            url: "https://hooks.example.com/submitted".to_string(),
            method: HttpMethod::Post,
            headers: BTreeMap::from([("X-Form".to_string(), "{{formID}}".to_string())]),
            body: BTreeMap::from([("who".to_string(), "{{subjectID}}".to_string())]),
        })
    }

    fn allow_access(hours: i64, remind: bool, before: i64) -> PipelineAction {
        PipelineAction::AllowFormAccess(AllowFormAccess {
            to_form_id: FormId::new("F2"),
            options: FormAccessOptions {
                expiration: ExpirationOptions {
                    in_hours_from_pipeline_run: hours,
                    reminder: ReminderOptions {
                        remind,
                        in_hours_before_expiration: before,
                    },
                },
            },
        })
    }

    fn submission() -> DomainEvent {
        DomainEvent::form_submission(FormId::new("F1"), Subject::new("u1", "ada@example.com"))
            .with_answers([(
                formflow_domain::id::FieldId::new("name"),
                "Ada".to_string(),
            )])
    }

    fn run_at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn should_send_rendered_email_once() {
        let h = harness();
        let p = pipeline(vec![send_email(h.template_id)]);

        let report = h.dispatcher.dispatch(&p, &submission()).await.unwrap();

        assert_eq!(report.outcome(0), Some(&ActionOutcome::Sent));
        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "Thanks Ada");
        assert_eq!(sent[0].body, "We received form F1.");
    }

    #[tokio::test]
    async fn should_fail_email_when_template_missing() {
        let h = harness();
        let p = pipeline(vec![send_email(EmailTemplateId::new())]);

        let report = h.dispatcher.dispatch(&p, &submission()).await.unwrap();

        assert!(matches!(
            report.outcome(0),
            Some(ActionOutcome::Failed(ActionExecutionError::Missing(_)))
        ));
        assert_eq!(h.mailer.count(), 0);
    }

    #[tokio::test]
    async fn should_fail_email_when_subject_has_no_address() {
        let h = harness();
        let p = pipeline(vec![send_email(h.template_id)]);
        let event = DomainEvent::form_submission(FormId::new("F1"), Subject::anonymous("u1"));

        let report = h.dispatcher.dispatch(&p, &event).await.unwrap();

        assert!(report.outcome(0).unwrap().is_failure());
    }

    #[tokio::test]
    async fn should_render_webhook_headers_and_body() {
        let h = harness();
        let p = pipeline(vec![webhook()]);

        let report = h.dispatcher.dispatch(&p, &submission()).await.unwrap();

        assert_eq!(
            report.outcome(0),
            Some(&ActionOutcome::Delivered { status: 200 })
        );
        let calls = h.webhook.calls.lock().unwrap();
        assert_eq!(calls[0].headers["X-Form"], "F1");
        assert_eq!(calls[0].body["who"], "u1");
        assert_eq!(calls[0].method, HttpMethod::Post);
    }

    #[tokio::test]
    async fn should_keep_running_actions_after_webhook_rejection() {
        let h = harness_with(SpyMailer::default(), SpyWebhook::answering(500));
        let p = pipeline(vec![webhook(), send_email(h.template_id)]);

        let report = h.dispatcher.dispatch(&p, &submission()).await.unwrap();

        assert_eq!(
            report.outcome(0),
            Some(&ActionOutcome::Failed(ActionExecutionError::Rejected {
                status: 500
            }))
        );
        assert_eq!(report.outcome(1), Some(&ActionOutcome::Sent));
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn should_not_repeat_side_effects_on_redelivery() {
        let h = harness();
        let p = pipeline(vec![
            send_email(h.template_id),
            webhook(),
            allow_access(24, false, 0),
        ]);
        let event = submission();

        h.dispatcher.dispatch(&p, &event).await.unwrap();
        let again = h.dispatcher.dispatch(&p, &event).await.unwrap();

        assert!(
            again
                .actions
                .iter()
                .all(|a| a.outcome == ActionOutcome::Skipped)
        );
        assert_eq!(h.mailer.count(), 1);
        assert_eq!(h.webhook.count(), 1);
        assert_eq!(*h.grants.grants_issued.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn should_retry_failed_action_on_redelivery() {
        let h = harness_with(SpyMailer::failing(), SpyWebhook::default());
        let p = pipeline(vec![send_email(h.template_id), webhook()]);
        let event = submission();

        let first = h.dispatcher.dispatch(&p, &event).await.unwrap();
        let key = ExecutionKey::new(p.id, 0, event.id);
        assert!(first.outcome(0).unwrap().is_failure());
        assert_eq!(
            h.log.status(key).await.unwrap(),
            Some(ExecutionStatus::Failed)
        );

        let second = h.dispatcher.dispatch(&p, &event).await.unwrap();
        assert!(second.outcome(0).unwrap().is_failure());
        assert_eq!(second.outcome(1), Some(&ActionOutcome::Skipped));
        assert_eq!(h.webhook.count(), 1);
    }

    #[tokio::test]
    async fn should_treat_distinct_occurrences_independently() {
        let h = harness();
        let p = pipeline(vec![webhook()]);

        h.dispatcher.dispatch(&p, &submission()).await.unwrap();
        h.dispatcher.dispatch(&p, &submission()).await.unwrap();

        assert_eq!(h.webhook.count(), 2);
    }

    #[tokio::test]
    async fn should_grant_access_and_schedule_reminder_and_expiration() {
        let h = harness();
        let p = pipeline(vec![allow_access(24, true, 2)]);
        let event = submission();

        let report = h
            .dispatcher
            .dispatch_at(&p, &event, run_at())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(0),
            Some(&ActionOutcome::Granted {
                expires_at: run_at() + hours(24)
            })
        );
        let grant = h
            .grants
            .get(FormId::new("F2"), UserId::new("u1"))
            .await
            .unwrap()
            .unwrap();
        assert!(grant.is_active(run_at()));

        let key = ExecutionKey::new(p.id, 0, event.id);
        let expiration = h
            .timers
            .get(key, TimerKind::Expiration)
            .await
            .unwrap()
            .unwrap();
        let reminder = h
            .timers
            .get(key, TimerKind::Reminder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expiration.fire_at, run_at() + hours(24));
        assert_eq!(reminder.fire_at, run_at() + hours(22));
        assert_eq!(reminder.state, TimerState::Pending);
    }

    #[tokio::test]
    async fn should_schedule_only_expiration_when_reminder_disabled() {
        let h = harness();
        let p = pipeline(vec![allow_access(24, false, 0)]);

        h.dispatcher
            .dispatch_at(&p, &submission(), run_at())
            .await
            .unwrap();

        let timers = h.timers.all();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].kind, TimerKind::Expiration);
    }

    #[tokio::test]
    async fn should_fail_access_action_when_expiry_overflows() {
        let h = harness();
        let p = PipelineConfiguration {
            actions: vec![allow_access(10_000_000_000, false, 0), webhook()],
            ..pipeline(vec![webhook()])
        };
        let event = submission();

        let report = h
            .dispatcher
            .dispatch_at(&p, &event, run_at())
            .await
            .unwrap();

        assert!(matches!(
            report.outcome(0),
            Some(ActionOutcome::Failed(ActionExecutionError::OutOfRange(_)))
        ));
        assert_eq!(
            report.outcome(1),
            Some(&ActionOutcome::Delivered { status: 200 })
        );
        assert_eq!(*h.grants.grants_issued.lock().unwrap(), 0);
        assert!(h.timers.all().is_empty());
        assert_eq!(
            h.log.status(ExecutionKey::new(p.id, 0, event.id)).await.unwrap(),
            Some(ExecutionStatus::Failed)
        );
    }

    #[tokio::test]
    async fn should_extend_existing_grant_and_take_ownership() {
        let h = harness();
        let p = pipeline(vec![allow_access(24, false, 0)]);
        let first = submission();
        let second = submission();

        h.dispatcher
            .dispatch_at(&p, &first, run_at())
            .await
            .unwrap();
        h.dispatcher
            .dispatch_at(&p, &second, run_at() + hours(6))
            .await
            .unwrap();

        let grant = h
            .grants
            .get(FormId::new("F2"), UserId::new("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.expires_at, run_at() + hours(30));
        assert!(grant.is_owned_by(&ExecutionKey::new(p.id, 0, second.id)));
    }
}
