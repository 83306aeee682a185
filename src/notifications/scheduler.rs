//! Wall-clock scheduler for the recurring broadcasts.
//!
//! Wakes every tick, looks at the local time and runs whatever is due. A job
//! fires at most once per (date, hour) however many ticks land in that hour.

use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;

use super::broadcast::Broadcaster;
use crate::core::config::BotSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    LessonReminder,
    MonthlyDiscount,
}

/// True on the last day of a month.
pub fn is_eve_of_month(date: NaiveDate) -> bool {
    (date + ChronoDuration::days(1)).day() == 1
}

/// Jobs due at `now`.
pub fn due_jobs(now: NaiveDateTime, settings: &BotSettings) -> Vec<Job> {
    let hour = now.hour();
    let mut jobs = Vec::new();
    if settings.lesson_reminder_hours.contains(&hour) {
        jobs.push(Job::LessonReminder);
    }
    if hour == settings.monthly_discount_hour && is_eve_of_month(now.date()) {
        jobs.push(Job::MonthlyDiscount);
    }
    jobs
}

pub struct Scheduler {
    broadcaster: Broadcaster,
    settings: Arc<BotSettings>,
    tick: Duration,
    fired: Mutex<HashSet<(Job, NaiveDate, u32)>>,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(broadcaster: Broadcaster, settings: Arc<BotSettings>, tick: Duration) -> Self {
        Self {
            broadcaster,
            settings,
            tick,
            fired: Mutex::new(HashSet::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Jobs due at `now` that have not fired yet in this hour; marks them fired.
    pub async fn claim_due(&self, now: NaiveDateTime) -> Vec<Job> {
        let mut fired = self.fired.lock().await;
        // keep only today's entries
        fired.retain(|(_, date, _)| *date >= now.date());
        due_jobs(now, &self.settings)
            .into_iter()
            .filter(|job| fired.insert((*job, now.date(), now.hour())))
            .collect()
    }

    /// Runs every job due at `now`. Returns the jobs that ran.
    pub async fn run_due(&self, now: NaiveDateTime) -> Vec<Job> {
        let jobs = self.claim_due(now).await;
        for job in &jobs {
            log::info!("Running scheduled job {:?} at {}", job, now);
            let result = match job {
                Job::LessonReminder => self.broadcaster.send_lesson_reminders().await,
                Job::MonthlyDiscount => self.broadcaster.send_monthly_discounts().await,
            };
            if let Err(e) = result {
                log::error!("Scheduled job {:?} failed: {}", job, e);
            }
        }
        jobs
    }

    /// Polls until [`Scheduler::stop`] is called.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "Starting broadcast scheduler: lessons at {:?}h, monthly discount at {}h, tick {}s",
            self.settings.lesson_reminder_hours,
            self.settings.monthly_discount_hour,
            self.tick.as_secs()
        );

        let mut timer = interval(self.tick);
        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.run_due(Local::now().naive_local()).await;
        }

        log::info!("Broadcast scheduler stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Starts the scheduler in a background task.
pub fn start_scheduler(scheduler: Scheduler) -> Arc<Scheduler> {
    let scheduler = Arc::new(scheduler);
    let worker = Arc::clone(&scheduler);
    tokio::spawn(async move {
        worker.start().await;
    });
    scheduler
}
