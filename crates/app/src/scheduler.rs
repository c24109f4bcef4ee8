//! Timer scheduler: fires durable expiration and reminder timers.
//!
//! Timers live in the [`TimerStore`], so a restart loses nothing: the next
//! tick simply picks up whatever is due.

use std::time::Duration;

use tokio::sync::watch;

use formflow_domain::email::RenderedEmail;
use formflow_domain::error::FormflowError;
use formflow_domain::time::Timestamp;
use formflow_domain::timer::{ScheduledTimer, TimerKind, TimerState};

use crate::ports::{AccessGrantRepository, EmailSender, TimerStore};

/// Polling settings for [`TimerScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick: Duration,
    pub batch_size: usize,
    /// Sender address for reminder notifications.
    pub reminder_from: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            batch_size: 100,
            reminder_from: "no-reply@formflow.local".to_string(),
        }
    }
}

pub struct TimerScheduler<G, S, M> {
    grants: G,
    timers: S,
    mailer: M,
    settings: SchedulerSettings,
}

impl<G, S, M> TimerScheduler<G, S, M>
where
    G: AccessGrantRepository,
    S: TimerStore,
    M: EmailSender,
{
    pub fn new(grants: G, timers: S, mailer: M, settings: SchedulerSettings) -> Self {
        Self {
            grants,
            timers,
            mailer,
            settings,
        }
    }

    /// Fire one batch of timers due at `now`. Returns how many were settled.
    ///
    /// An expiration revokes the grant only when the run that scheduled it
    /// still owns it; otherwise the timer is marked superseded. A reminder
    /// never revokes.
    ///
    /// # Errors
    ///
    /// Returns a storage error; timers already settled in this batch stay
    /// settled.
    #[tracing::instrument(skip(self))]
    pub async fn fire_due(&self, now: Timestamp) -> Result<usize, FormflowError> {
        let due = self.timers.due(now, self.settings.batch_size).await?;
        let mut settled = 0;
        for timer in &due {
            if let Some(state) = self.fire(timer, now).await? {
                self.timers.mark(timer.key, timer.kind, state).await?;
                tracing::info!(timer = %timer, state = state.as_str(), "timer settled");
                settled += 1;
            }
        }
        Ok(settled)
    }

    /// Poll for due timers every tick until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.tick);
        tracing::info!(tick = ?self.settings.tick, "timer scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.fire_due(formflow_domain::time::now()).await {
                        tracing::warn!(error = %err, "timer tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("timer scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// `None` leaves the timer pending for the next tick.
    async fn fire(
        &self,
        timer: &ScheduledTimer,
        now: Timestamp,
    ) -> Result<Option<TimerState>, FormflowError> {
        match timer.kind {
            TimerKind::Expiration => {
                let revoked = self
                    .grants
                    .revoke_if_owned(timer.form_id.clone(), timer.user_id.clone(), timer.key, now)
                    .await?;
                Ok(Some(if revoked {
                    TimerState::Fired
                } else {
                    TimerState::Superseded
                }))
            }
            TimerKind::Reminder => self.remind(timer, now).await,
        }
    }

    async fn remind(
        &self,
        timer: &ScheduledTimer,
        now: Timestamp,
    ) -> Result<Option<TimerState>, FormflowError> {
        let grant = self
            .grants
            .get(timer.form_id.clone(), timer.user_id.clone())
            .await?;
        let Some(grant) = grant.filter(|g| g.is_active(now) && g.is_owned_by(&timer.key)) else {
            return Ok(Some(TimerState::Superseded));
        };
        let Some(to) = timer.email.clone() else {
            tracing::warn!(timer = %timer, "no address for reminder, dropping it");
            return Ok(Some(TimerState::Fired));
        };

        let email = RenderedEmail {
            from: self.settings.reminder_from.clone(),
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            subject: format!("Your access to form {} expires soon", grant.form_id),
            body: format!(
                "Your access to form {} expires at {}.",
                grant.form_id,
                grant.expires_at.to_rfc3339()
            ),
            is_html: false,
        };
        match self.mailer.send(email).await {
            Ok(()) => Ok(Some(TimerState::Fired)),
            Err(err) => {
                tracing::warn!(timer = %timer, error = %err, "reminder not sent, will retry");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{InMemoryGrants, InMemoryTimers, SpyMailer};
    use crate::ports::AccessGrantRepository as _;
    use crate::ports::TimerStore as _;
    use chrono::TimeZone;
    use formflow_domain::access::AccessGrant;
    use formflow_domain::execution::ExecutionKey;
    use formflow_domain::id::{FormId, OccurrenceId, PipelineId, UserId};
    use formflow_domain::time::hours;
    use std::sync::Arc;

    struct Harness {
        scheduler: TimerScheduler<Arc<InMemoryGrants>, Arc<InMemoryTimers>, Arc<SpyMailer>>,
        grants: Arc<InMemoryGrants>,
        timers: Arc<InMemoryTimers>,
        mailer: Arc<SpyMailer>,
    }

    fn harness_with(mailer: SpyMailer) -> Harness {
        let grants = Arc::new(InMemoryGrants::default());
        let timers = Arc::new(InMemoryTimers::default());
        let mailer = Arc::new(mailer);
        Harness {
            scheduler: TimerScheduler::new(
                Arc::clone(&grants),
                Arc::clone(&timers),
                Arc::clone(&mailer),
                SchedulerSettings::default(),
            ),
            grants,
            timers,
            mailer,
        }
    }

    fn harness() -> Harness {
        harness_with(SpyMailer::default())
    }

    fn run_at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn key() -> ExecutionKey {
        ExecutionKey::new(PipelineId::new(), 0, OccurrenceId::new())
    }

    async fn grant_with_timers(h: &Harness, key: ExecutionKey) {
        h.grants
            .grant(AccessGrant::new(
                FormId::new("F2"),
                UserId::new("u1"),
                run_at(),
                run_at() + hours(24),
                key,
            ))
            .await
            .unwrap();
        for (kind, at) in [
            (TimerKind::Reminder, run_at() + hours(22)),
            (TimerKind::Expiration, run_at() + hours(24)),
        ] {
            h.timers
                .schedule(ScheduledTimer::pending(
                    key,
                    kind,
                    at,
                    FormId::new("F2"),
                    UserId::new("u1"),
                    Some("ada@example.com".to_string()),
                ))
                .await
                .unwrap();
        }
    }

    async fn grant(h: &Harness) -> AccessGrant {
        h.grants
            .get(FormId::new("F2"), UserId::new("u1"))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn should_fire_nothing_before_due() {
        let h = harness();
        grant_with_timers(&h, key()).await;
        assert_eq!(h.scheduler.fire_due(run_at() + hours(1)).await.unwrap(), 0);
        assert_eq!(h.mailer.count(), 0);
    }

    #[tokio::test]
    async fn should_send_reminder_without_revoking() {
        let h = harness();
        let key = key();
        grant_with_timers(&h, key).await;

        let settled = h.scheduler.fire_due(run_at() + hours(22)).await.unwrap();

        assert_eq!(settled, 1);
        assert_eq!(h.mailer.count(), 1);
        assert!(grant(&h).await.is_active(run_at() + hours(22)));
        let reminder = h.timers.get(key, TimerKind::Reminder).await.unwrap().unwrap();
        assert_eq!(reminder.state, TimerState::Fired);
    }

    #[tokio::test]
    async fn should_revoke_access_when_expiration_fires() {
        let h = harness();
        let key = key();
        grant_with_timers(&h, key).await;

        h.scheduler.fire_due(run_at() + hours(24)).await.unwrap();

        assert!(grant(&h).await.revoked_at.is_some());
        let expiration = h
            .timers
            .get(key, TimerKind::Expiration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expiration.state, TimerState::Fired);
    }

    #[tokio::test]
    async fn should_supersede_expiration_when_newer_run_owns_grant() {
        let h = harness();
        let old = key();
        let newer = key();
        grant_with_timers(&h, old).await;
        h.grants
            .grant(AccessGrant::new(
                FormId::new("F2"),
                UserId::new("u1"),
                run_at() + hours(20),
                run_at() + hours(44),
                newer,
            ))
            .await
            .unwrap();

        h.scheduler.fire_due(run_at() + hours(24)).await.unwrap();

        assert!(grant(&h).await.is_active(run_at() + hours(24)));
        let expiration = h
            .timers
            .get(old, TimerKind::Expiration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expiration.state, TimerState::Superseded);
        assert_eq!(h.mailer.count(), 0);
    }

    #[tokio::test]
    async fn should_treat_expiration_of_revoked_grant_as_noop() {
        let h = harness();
        let key = key();
        grant_with_timers(&h, key).await;
        h.grants
            .revoke_if_owned(FormId::new("F2"), UserId::new("u1"), key, run_at())
            .await
            .unwrap();

        let settled = h.scheduler.fire_due(run_at() + hours(24)).await.unwrap();

        assert_eq!(settled, 2);
        let expiration = h
            .timers
            .get(key, TimerKind::Expiration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expiration.state, TimerState::Superseded);
    }

    #[tokio::test]
    async fn should_keep_reminder_pending_when_mail_fails() {
        let h = harness_with(SpyMailer::failing());
        let key = key();
        grant_with_timers(&h, key).await;

        let settled = h.scheduler.fire_due(run_at() + hours(22)).await.unwrap();

        assert_eq!(settled, 0);
        let reminder = h.timers.get(key, TimerKind::Reminder).await.unwrap().unwrap();
        assert_eq!(reminder.state, TimerState::Pending);
    }

    #[tokio::test]
    async fn should_stop_when_shutdown_signalled() {
        let h = harness();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), h.scheduler.run(rx))
            .await
            .unwrap();
    }
}
