use std::fmt::Display;

use chrono::Utc;
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::decision::{AlertDecision, cheapest, decide};
use crate::extractor::PriceExtractor;
use crate::history::HistoryStore;
use crate::notify::{Email, Notifier};
use crate::render::Renderer;
use crate::report;
use crate::types::{BestRecord, HistorySnapshot, PriceObservation, Target};

/// Outcome of one tracking pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub observations: Vec<PriceObservation>,
    pub cheapest: Option<BestRecord>,
    pub should_alert: bool,
    pub best: Option<BestRecord>,
    pub history_saved: bool,
    pub alert_sent: bool,
    pub snapshot_sent: bool,
}

impl RunReport {
    pub fn failed_targets(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| o.min_price.is_none())
            .count()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, observation) in self.observations.iter().enumerate() {
            writeln!(f, "{:>3}. {}", i + 1, observation)?;
        }
        writeln!(f, "\nSummary:")?;
        match &self.cheapest {
            Some(cheapest) => writeln!(f, "  Cheapest this run: {}", cheapest)?,
            None => writeln!(f, "  Cheapest this run: none")?,
        }
        match &self.best {
            Some(best) => writeln!(f, "  All-time best:     {}", best)?,
            None => writeln!(f, "  All-time best:     none")?,
        }
        writeln!(f, "  New low:           {}", self.should_alert)?;
        writeln!(f, "  Without price:     {}", self.failed_targets())?;
        writeln!(f, "  History saved:     {}", self.history_saved)?;
        writeln!(f, "  Alert mailed:      {}", self.alert_sent)?;
        writeln!(f, "  Snapshot mailed:   {}", self.snapshot_sent)
    }
}

pub struct Tracker<R, N> {
    config: TrackerConfig,
    renderer: R,
    notifier: N,
    extractor: PriceExtractor,
    store: HistoryStore,
}

impl<R: Renderer, N: Notifier> Tracker<R, N> {
    pub fn new(config: TrackerConfig, renderer: R, notifier: N) -> Self {
        let extractor = PriceExtractor::new(config.policy);
        let store = HistoryStore::new(config.history_path.clone());
        Self {
            config,
            renderer,
            notifier,
            extractor,
            store,
        }
    }

    /// Fetches every target in order, updates the stored history and sends
    /// the alert and snapshot mails.
    pub async fn run(&self) -> RunReport {
        let previous = self.store.load().and_then(|snapshot| snapshot.best);

        let targets = self.config.targets();
        log::info!("Checking {} target(s)...", targets.len());

        let mut observations = Vec::with_capacity(targets.len());
        for target in &targets {
            observations.push(self.observe(target).await);
        }

        let cheapest = cheapest(&observations);
        let AlertDecision {
            should_alert,
            new_best,
        } = decide(cheapest.as_ref(), previous.as_ref());

        if should_alert && let Some(best) = &new_best {
            log::info!("New lowest price: {}", best);
        }

        let snapshot = HistorySnapshot {
            updated_at: Utc::now(),
            latest: observations,
            best: new_best,
        };
        let history_saved = self
            .store
            .save(&snapshot)
            .inspect_err(|e| log::error!("Failed to save history: {}", e))
            .is_ok();

        let (alert_sent, snapshot_sent) = self.dispatch(should_alert, &snapshot).await;

        RunReport {
            observations: snapshot.latest,
            cheapest,
            should_alert,
            best: snapshot.best,
            history_saved,
            alert_sent,
            snapshot_sent,
        }
    }

    async fn observe(&self, target: &Target) -> PriceObservation {
        let min_price = match self.renderer.render(&target.url).await {
            Ok(page) => self.extractor.extract_page(&page),
            Err(e) => {
                log::warn!("Failed to fetch {} ({}): {}", target, target.url, e);
                None
            }
        };

        let observation = PriceObservation::new(target, min_price);
        log::info!("{} ({})", observation, target.url);
        observation
    }

    async fn dispatch(&self, should_alert: bool, snapshot: &HistorySnapshot) -> (bool, bool) {
        if !self.config.notifications_enabled {
            log::info!("Notifications disabled, skipping mail");
            return (false, false);
        }

        let mut alert_sent = false;
        if should_alert && let Some(best) = &snapshot.best {
            let email = self.email(
                report::alert_subject(&self.config.subject_prefix),
                report::alert_body(best, &self.config.people, self.store.path()),
            );
            alert_sent = self.deliver(&email).await;
        }

        let email = self.email(
            report::snapshot_subject(&self.config.subject_prefix),
            report::snapshot_body(&snapshot.latest, &self.config.people),
        );
        let snapshot_sent = self.deliver(&email).await;

        (alert_sent, snapshot_sent)
    }

    fn email(&self, subject: String, html: String) -> Email {
        Email {
            from: self.config.email_from.clone(),
            to: self.config.email_to.clone(),
            subject,
            html,
        }
    }

    async fn deliver(&self, email: &Email) -> bool {
        self.notifier
            .send(email)
            .await
            .inspect_err(|e| log::warn!("Failed to send '{}': {}", email.subject, e))
            .is_ok()
    }
}
