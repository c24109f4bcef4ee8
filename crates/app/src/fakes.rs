//! In-memory port implementations shared by the app-layer unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use formflow_domain::access::AccessGrant;
use formflow_domain::email::{EmailTemplate, RenderedEmail};
use formflow_domain::error::{ActionExecutionError, FormflowError, NotFoundError};
use formflow_domain::event::Event;
use formflow_domain::execution::{ExecutionKey, ExecutionStatus};
use formflow_domain::id::{EmailTemplateId, EventId, FormId, PipelineId, UserId};
use formflow_domain::pipeline::PipelineConfiguration;
use formflow_domain::time::Timestamp;
use formflow_domain::timer::{ScheduledTimer, TimerKind, TimerState};

use crate::ports::{
    AccessGrantRepository, EmailSender, EmailTemplateRepository, EventRepository, ExecutionLog,
    PipelineRepository, TimerStore, WebhookClient, WebhookRequest,
};

fn unavailable() -> FormflowError {
    FormflowError::Storage("store unavailable".into())
}

// ── Pipelines ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPipelineRepo {
    store: Mutex<Vec<PipelineConfiguration>>,
    fail_reads: AtomicBool,
}

impl InMemoryPipelineRepo {
    pub fn with(pipelines: Vec<PipelineConfiguration>) -> Self {
        Self {
            store: Mutex::new(pipelines),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self, id: PipelineId) -> Option<PipelineConfiguration> {
        self.store.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }
}

impl PipelineRepository for InMemoryPipelineRepo {
    fn create(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send {
        self.store.lock().unwrap().push(pipeline.clone());
        async { Ok(pipeline) }
    }

    fn get_by_id(
        &self,
        id: PipelineId,
    ) -> impl Future<Output = Result<Option<PipelineConfiguration>, FormflowError>> + Send {
        let result = self.snapshot(id);
        async { Ok(result) }
    }

    fn update(
        &self,
        pipeline: PipelineConfiguration,
    ) -> impl Future<Output = Result<PipelineConfiguration, FormflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result: Result<PipelineConfiguration, FormflowError> =
            match store.iter_mut().find(|p| p.id == pipeline.id) {
            Some(slot) => {
                *slot = pipeline.clone();
                Ok(pipeline)
            }
            None => Err(NotFoundError {
                entity: "Pipeline",
                id: pipeline.id.to_string(),
            }
            .into()),
        };
        async { result }
    }

    fn delete(&self, id: PipelineId) -> impl Future<Output = Result<(), FormflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let before = store.len();
        store.retain(|p| p.id != id);
        let result: Result<(), FormflowError> = if store.len() == before {
            Err(NotFoundError {
                entity: "Pipeline",
                id: id.to_string(),
            }
            .into())
        } else {
            Ok(())
        };
        async { result }
    }

    fn list_candidates(
        &self,
        discriminator: &'static str,
        form_id: FormId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send {
        let result: Result<Vec<PipelineConfiguration>, FormflowError> =
            if self.fail_reads.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(self
                .store
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.event.discriminator() == discriminator && *p.event.form_id() == form_id)
                .cloned()
                .collect())
        };
        async { result }
    }

    fn list_by_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<PipelineConfiguration>, FormflowError>> + Send {
        let result: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

// ── Directory ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryEventRepo {
    store: Mutex<HashMap<EventId, Event>>,
}

impl InMemoryEventRepo {
    pub fn with(events: Vec<Event>) -> Self {
        Self {
            store: Mutex::new(events.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }
}

impl EventRepository for InMemoryEventRepo {
    fn get_by_id(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, FormflowError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn upsert(&self, event: Event) -> impl Future<Output = Result<Event, FormflowError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(event.id.clone(), event.clone());
        async { Ok(event) }
    }
}

#[derive(Default)]
pub struct InMemoryTemplates {
    store: Mutex<HashMap<EmailTemplateId, EmailTemplate>>,
}

impl InMemoryTemplates {
    pub fn with(templates: Vec<EmailTemplate>) -> Self {
        Self {
            store: Mutex::new(templates.into_iter().map(|t| (t.id, t)).collect()),
        }
    }
}

impl EmailTemplateRepository for InMemoryTemplates {
    fn get_by_id(
        &self,
        id: EmailTemplateId,
    ) -> impl Future<Output = Result<Option<EmailTemplate>, FormflowError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn upsert(
        &self,
        template: EmailTemplate,
    ) -> impl Future<Output = Result<EmailTemplate, FormflowError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(template.id, template.clone());
        async { Ok(template) }
    }
}

// ── Delivery spies ─────────────────────────────────────────────────

#[derive(Default)]
pub struct SpyMailer {
    pub sent: Mutex<Vec<RenderedEmail>>,
    fail: AtomicBool,
}

impl SpyMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailSender for SpyMailer {
    fn send(
        &self,
        email: RenderedEmail,
    ) -> impl Future<Output = Result<(), ActionExecutionError>> + Send {
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(ActionExecutionError::Delivery("smtp unreachable".to_string()))
        } else {
            self.sent.lock().unwrap().push(email);
            Ok(())
        };
        async { result }
    }
}

pub struct SpyWebhook {
    pub calls: Mutex<Vec<WebhookRequest>>,
    status: u16,
}

impl Default for SpyWebhook {
    fn default() -> Self {
        Self::answering(200)
    }
}

impl SpyWebhook {
    pub fn answering(status: u16) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            status,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl WebhookClient for SpyWebhook {
    fn call(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<u16, ActionExecutionError>> + Send {
        self.calls.lock().unwrap().push(request);
        let status = self.status;
        async move { Ok(status) }
    }
}

// ── Execution ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryExecutionLog {
    store: Mutex<HashMap<ExecutionKey, ExecutionStatus>>,
}

impl ExecutionLog for InMemoryExecutionLog {
    fn claim(&self, key: ExecutionKey) -> impl Future<Output = Result<bool, FormflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let claimed = match store.get(&key) {
            None | Some(ExecutionStatus::Failed) => {
                store.insert(key, ExecutionStatus::InProgress);
                true
            }
            Some(_) => false,
        };
        async move { Ok(claimed) }
    }

    fn complete(
        &self,
        key: ExecutionKey,
        status: ExecutionStatus,
        _detail: Option<String>,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        self.store.lock().unwrap().insert(key, status);
        async { Ok(()) }
    }

    fn status(
        &self,
        key: ExecutionKey,
    ) -> impl Future<Output = Result<Option<ExecutionStatus>, FormflowError>> + Send {
        let result = self.store.lock().unwrap().get(&key).copied();
        async move { Ok(result) }
    }
}

#[derive(Default)]
pub struct InMemoryGrants {
    store: Mutex<HashMap<(FormId, UserId), AccessGrant>>,
    pub grants_issued: Mutex<usize>,
}

impl AccessGrantRepository for InMemoryGrants {
    fn grant(
        &self,
        grant: AccessGrant,
    ) -> impl Future<Output = Result<AccessGrant, FormflowError>> + Send {
        *self.grants_issued.lock().unwrap() += 1;
        let mut store = self.store.lock().unwrap();
        let stored = store
            .entry((grant.form_id.clone(), grant.user_id.clone()))
            .and_modify(|existing| existing.extend(grant.granted_at, grant.expires_at, grant.source))
            .or_insert_with(|| grant.clone())
            .clone();
        async { Ok(stored) }
    }

    fn get(
        &self,
        form_id: FormId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<AccessGrant>, FormflowError>> + Send {
        let result = self.store.lock().unwrap().get(&(form_id, user_id)).cloned();
        async { Ok(result) }
    }

    fn revoke_if_owned(
        &self,
        form_id: FormId,
        user_id: UserId,
        source: ExecutionKey,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, FormflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let revoked = match store.get_mut(&(form_id, user_id)) {
            Some(grant) if grant.revoked_at.is_none() && grant.is_owned_by(&source) => {
                grant.revoke(at);
                true
            }
            _ => false,
        };
        async move { Ok(revoked) }
    }
}

#[derive(Default)]
pub struct InMemoryTimers {
    store: Mutex<Vec<ScheduledTimer>>,
}

impl InMemoryTimers {
    pub fn all(&self) -> Vec<ScheduledTimer> {
        self.store.lock().unwrap().clone()
    }
}

impl TimerStore for InMemoryTimers {
    fn schedule(
        &self,
        timer: ScheduledTimer,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        if !store
            .iter()
            .any(|t| t.key == timer.key && t.kind == timer.kind)
        {
            store.push(timer);
        }
        async { Ok(()) }
    }

    fn due(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScheduledTimer>, FormflowError>> + Send {
        let mut due: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.fire_at);
        due.truncate(limit);
        async { Ok(due) }
    }

    fn mark(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
        state: TimerState,
    ) -> impl Future<Output = Result<(), FormflowError>> + Send {
        for timer in self.store.lock().unwrap().iter_mut() {
            if timer.key == key && timer.kind == kind {
                timer.state = state;
            }
        }
        async { Ok(()) }
    }

    fn get(
        &self,
        key: ExecutionKey,
        kind: TimerKind,
    ) -> impl Future<Output = Result<Option<ScheduledTimer>, FormflowError>> + Send {
        let result = self
            .store
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.key == key && t.kind == kind)
            .cloned();
        async { Ok(result) }
    }
}
