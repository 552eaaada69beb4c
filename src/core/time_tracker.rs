// src/core/time_tracker.rs
//! Foreground time tracking from the event stream
//!
//! Every window event names the application in front. A session runs from
//! the first event of an application until another application shows up
//! or monitoring stops. This is what the control surface reports as "usage
//! today" and "last active".

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UsageConfig;

/// A closed stretch of foreground time for one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundSession {
    pub application_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration: Duration,
}

/// Aggregated usage statistics for one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_time: Duration,
    pub session_count: u32,
    pub longest_session: Duration,
    pub last_used: DateTime<Local>,
}

/// Summary handed to the control surface
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub total_usage_today: Duration,
    pub last_active_time: Option<DateTime<Local>>,
    pub current_application: Option<String>,
    pub top_apps_by_usage: Vec<(String, Duration)>,
}

pub struct UsageTracker {
    config: UsageConfig,
    current: Option<(String, DateTime<Local>)>,
    history: VecDeque<ForegroundSession>,
    app_stats: HashMap<String, UsageStats>,
    last_active: Option<DateTime<Local>>,
    /// Closed foreground time on the date of the latest closed session
    closed_today: Option<(NaiveDate, Duration)>,
}

impl UsageTracker {
    pub fn new(config: UsageConfig) -> Self {
        Self {
            config,
            current: None,
            history: VecDeque::new(),
            app_stats: HashMap::new(),
            last_active: None,
            closed_today: None,
        }
    }

    /// Note that `application_id` is in the foreground at `at`.
    pub fn record_foreground(&mut self, application_id: &str, at: DateTime<Local>) {
        self.last_active = Some(self.last_active.map_or(at, |last| last.max(at)));

        if let Some((current, _)) = &self.current {
            if current == application_id {
                return;
            }
        }
        self.end_tracking(at);
        debug!(application_id, "foreground session started");
        self.current = Some((application_id.to_string(), at));
    }

    /// Close the open session, if any.
    pub fn end_tracking(&mut self, at: DateTime<Local>) {
        let Some((application_id, start_time)) = self.current.take() else {
            return;
        };
        let duration = (at - start_time).to_std().unwrap_or(Duration::ZERO);

        let stat = self
            .app_stats
            .entry(application_id.clone())
            .or_insert_with(|| UsageStats {
                total_time: Duration::ZERO,
                session_count: 0,
                longest_session: Duration::ZERO,
                last_used: at,
            });
        stat.total_time += duration;
        stat.session_count += 1;
        stat.longest_session = stat.longest_session.max(duration);
        stat.last_used = at;
        self.credit_day(start_time, at);

        // Short blips still count towards totals, just not the session list.
        if duration < self.config.min_session_duration() {
            return;
        }
        if self.config.history_limit > 0 && self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(ForegroundSession {
            application_id,
            start_time,
            end_time: at,
            duration,
        });
    }

    /// Add the part of `start..end` that falls on `end`'s date, starting a
    /// fresh total when the date rolled over.
    fn credit_day(&mut self, start: DateTime<Local>, end: DateTime<Local>) {
        let day = end.date_naive();
        let overlap = (end - start.max(start_of_day(end)))
            .to_std()
            .unwrap_or(Duration::ZERO);
        match &mut self.closed_today {
            Some((date, total)) if *date == day => *total += overlap,
            _ => self.closed_today = Some((day, overlap)),
        }
    }

    pub fn current_application(&self) -> Option<&str> {
        self.current.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn last_active_time(&self) -> Option<DateTime<Local>> {
        self.last_active
    }

    pub fn app_stats(&self, application_id: &str) -> Option<&UsageStats> {
        self.app_stats.get(application_id)
    }

    pub fn recent_sessions(&self, limit: usize) -> Vec<ForegroundSession> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    /// Foreground time since local midnight, open session included.
    pub fn total_usage_today(&self, now: DateTime<Local>) -> Duration {
        let midnight = start_of_day(now);
        let overlap = |start: DateTime<Local>, end: DateTime<Local>| {
            let start = start.max(midnight);
            let end = end.min(now);
            (end - start).to_std().unwrap_or(Duration::ZERO)
        };

        let closed = match self.closed_today {
            Some((date, total)) if date == now.date_naive() => total,
            _ => Duration::ZERO,
        };
        let open = self
            .current
            .as_ref()
            .map_or(Duration::ZERO, |(_, start)| overlap(*start, now));
        closed + open
    }

    pub fn report(&self, now: DateTime<Local>) -> UsageReport {
        let mut top: Vec<(String, Duration)> = self
            .app_stats
            .iter()
            .map(|(id, s)| (id.clone(), s.total_time))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(10);

        UsageReport {
            total_usage_today: self.total_usage_today(now),
            last_active_time: self.last_active,
            current_application: self.current_application().map(str::to_string),
            top_apps_by_usage: top,
        }
    }
}

fn start_of_day(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or(now)
}

/// Tracker shared between the event thread and the control surface.
#[derive(Clone)]
pub struct SharedUsage(Arc<Mutex<UsageTracker>>);

impl SharedUsage {
    pub fn new(config: UsageConfig) -> Self {
        Self(Arc::new(Mutex::new(UsageTracker::new(config))))
    }

    /// A poisoned lock only means a panic mid-update; the counters are
    /// still usable.
    pub fn lock(&self) -> MutexGuard<'_, UsageTracker> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
