//! Weekly announcement scheduler.
//!
//! Each configured announcement fires at a fixed weekday and time. Firing
//! sends `<prefix><name>` into the same message channel user commands arrive
//! on, so the router cannot tell the two apart.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc, Weekday};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lodebot_shared::{AnnouncementConfig, AppConfig, LodebotError, Result};

use crate::router::IncomingMessage;

// ---------------------------------------------------------------------------
// WeeklyTrigger
// ---------------------------------------------------------------------------

/// A fixed weekday + time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyTrigger {
    weekday: Weekday,
    time: NaiveTime,
}

impl WeeklyTrigger {
    pub fn new(weekday: Weekday, hour: u32, minute: u32, second: u32) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            LodebotError::parse(format!(
                "invalid time {hour:02}:{minute:02}:{second:02}"
            ))
        })?;
        Ok(Self { weekday, time })
    }

    pub fn from_config(config: &AnnouncementConfig) -> Result<Self> {
        let weekday = config.day_of_week.parse::<Weekday>().map_err(|_| {
            LodebotError::parse(format!("invalid day_of_week '{}'", config.day_of_week))
        })?;
        Self::new(weekday, config.hour, config.minute, config.second)
    }

    /// First firing strictly after `now`, in `offset`'s local time.
    pub fn next_after(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
        let local = now.with_timezone(&offset);
        let today = local.date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - today.weekday().num_days_from_monday())
            % 7;

        let mut candidate = (today + Duration::days(days_ahead.into())).and_time(self.time);
        if candidate <= local.naive_local() {
            candidate += Duration::days(7);
        }

        let utc = candidate - Duration::seconds(offset.local_minus_utc().into());
        DateTime::from_naive_utc_and_offset(utc, offset)
    }
}

impl fmt::Display for WeeklyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "weekly[{}, {}]",
            self.weekday,
            self.time.format("%H:%M:%S")
        )
    }
}

// ---------------------------------------------------------------------------
// AnnouncementScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScheduledAnnouncement {
    pub name: String,
    pub trigger: WeeklyTrigger,
}

/// Fires configured announcements into the command channel.
#[derive(Debug, Clone)]
pub struct AnnouncementScheduler {
    jobs: Vec<ScheduledAnnouncement>,
    offset: FixedOffset,
    prefix: String,
    channel: u64,
}

impl AnnouncementScheduler {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.bot.utc_offset_minutes * 60).ok_or_else(|| {
            LodebotError::config(format!(
                "bot.utc_offset_minutes {} out of range",
                config.bot.utc_offset_minutes
            ))
        })?;

        let jobs = config
            .announcements
            .iter()
            .map(|a| -> Result<ScheduledAnnouncement> {
                Ok(ScheduledAnnouncement {
                    name: a.name.clone(),
                    trigger: WeeklyTrigger::from_config(a)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            jobs,
            offset,
            prefix: config.bot.prefix.clone(),
            channel: config.bot.schedule_channel,
        })
    }

    pub fn jobs(&self) -> &[ScheduledAnnouncement] {
        &self.jobs
    }

    /// The earliest announcement due strictly after `now`. Ties go to the
    /// job configured first.
    pub fn next_fire(
        &self,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<FixedOffset>, &ScheduledAnnouncement)> {
        self.jobs
            .iter()
            .map(|job| (job.trigger.next_after(now, self.offset), job))
            .min_by_key(|(at, _)| *at)
    }

    /// The message a firing of `job` injects.
    pub fn command_for(&self, job: &ScheduledAnnouncement) -> IncomingMessage {
        IncomingMessage {
            channel: self.channel,
            text: format!("{}{}", self.prefix, job.name),
        }
    }

    /// Human-readable schedule listing, one block per job.
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        self.jobs
            .iter()
            .map(|job| {
                format!(
                    "{} → {}\nNext: {}",
                    job.name,
                    job.trigger,
                    job.trigger.next_after(now, self.offset)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Sleep until each firing and send its command. Returns once the
    /// receiving side is closed, or immediately with no jobs.
    pub async fn run(self, sender: mpsc::Sender<IncomingMessage>) {
        self.run_with_clock(sender, Utc::now).await
    }

    /// [`run`](Self::run) against a caller-supplied wall clock.
    pub async fn run_with_clock<C>(self, sender: mpsc::Sender<IncomingMessage>, clock: C)
    where
        C: Fn() -> DateTime<Utc>,
    {
        let mut after = clock();

        loop {
            let Some((at, job)) = self.next_fire(after) else {
                info!("no announcements configured, scheduler idle");
                return;
            };
            let at = at.with_timezone(&Utc);
            let wait = (at - clock()).to_std().unwrap_or_default();
            debug!(name = %job.name, %at, wait_secs = wait.as_secs(), "next announcement");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = sender.closed() => return,
            }

            info!(name = %job.name, channel = self.channel, "firing scheduled announcement");
            if sender.send(self.command_for(job)).await.is_err() {
                warn!("command channel closed, stopping scheduler");
                return;
            }
            // Strictly-after semantics keep this job from refiring at `at`.
            after = at.max(clock());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn next_after_same_week() {
        // 2026-10-18 is a Sunday.
        let trigger = WeeklyTrigger::new(Weekday::Wed, 18, 0, 0).unwrap();
        let next = trigger.next_after(utc(2026, 10, 18, 12, 0, 0), FixedOffset::east_opt(0).unwrap());
        assert_eq!(next.with_timezone(&Utc), utc(2026, 10, 21, 18, 0, 0));
    }

    #[test]
    fn next_after_later_today() {
        let trigger = WeeklyTrigger::new(Weekday::Sun, 21, 20, 0).unwrap();
        let next = trigger.next_after(utc(2026, 10, 18, 12, 0, 0), FixedOffset::east_opt(0).unwrap());
        assert_eq!(next.with_timezone(&Utc), utc(2026, 10, 18, 21, 20, 0));
    }

    #[test]
    fn exact_time_rolls_to_next_week() {
        let trigger = WeeklyTrigger::new(Weekday::Sun, 21, 20, 0).unwrap();
        let next = trigger.next_after(utc(2026, 10, 18, 21, 20, 0), FixedOffset::east_opt(0).unwrap());
        assert_eq!(next.with_timezone(&Utc), utc(2026, 10, 25, 21, 20, 0));
    }

    #[test]
    fn offset_shifts_the_local_day() {
        // 23:30 UTC Saturday is already Sunday 01:30 at UTC+2.
        let trigger = WeeklyTrigger::new(Weekday::Sun, 9, 0, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let next = trigger.next_after(utc(2026, 10, 17, 23, 30, 0), plus_two);
        assert_eq!(next.with_timezone(&Utc), utc(2026, 10, 18, 7, 0, 0));
        assert_eq!(next.offset(), &plus_two);
    }

    #[test]
    fn scheduler_picks_earliest_job() {
        let scheduler = AnnouncementScheduler::from_config(&AppConfig::default()).unwrap();
        assert_eq!(scheduler.jobs().len(), 2);

        // Monday: Wednesday's results come before Sunday's events.
        let (at, job) = scheduler.next_fire(utc(2026, 10, 19, 8, 0, 0)).unwrap();
        assert_eq!(job.name, "event_results");
        assert_eq!(at.with_timezone(&Utc), utc(2026, 10, 21, 18, 0, 0));

        // Thursday: Sunday's events are next.
        let (_, job) = scheduler.next_fire(utc(2026, 10, 22, 8, 0, 0)).unwrap();
        assert_eq!(job.name, "events");
    }

    #[test]
    fn fired_command_matches_user_command_shape() {
        let mut config = AppConfig::default();
        config.bot.prefix = "?".into();
        config.bot.schedule_channel = 99;
        let scheduler = AnnouncementScheduler::from_config(&config).unwrap();

        let msg = scheduler.command_for(&scheduler.jobs()[0]);
        assert_eq!(
            msg,
            IncomingMessage {
                channel: 99,
                text: "?events".into()
            }
        );
    }

    #[test]
    fn describe_lists_each_job() {
        let scheduler = AnnouncementScheduler::from_config(&AppConfig::default()).unwrap();
        let text = scheduler.describe(utc(2026, 10, 18, 12, 0, 0));
        assert!(text.contains("events → weekly[Sun, 21:20:00]"));
        assert!(text.contains("event_results → weekly[Wed, 18:00:00]"));
    }

    #[test]
    fn bad_weekday_rejected() {
        let mut config = AppConfig::default();
        config.announcements[0].day_of_week = "funday".into();
        assert!(AnnouncementScheduler::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn run_returns_when_receiver_dropped() {
        let scheduler = AnnouncementScheduler::from_config(&AppConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        scheduler.run(tx).await;
    }

    #[tokio::test]
    async fn run_without_jobs_is_idle() {
        let mut config = AppConfig::default();
        config.announcements.clear();
        let scheduler = AnnouncementScheduler::from_config(&config).unwrap();
        let (tx, _rx) = mpsc::channel(1);
        scheduler.run(tx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn run_sends_command_when_trigger_is_due() {
        let mut config = AppConfig::default();
        config.bot.schedule_channel = 42;
        let scheduler = AnnouncementScheduler::from_config(&config).unwrap();

        // One minute before Sunday's 21:20 events trigger, driven by tokio's clock.
        let base = utc(2026, 10, 18, 21, 19, 0);
        let start = tokio::time::Instant::now();
        let clock = move || base + Duration::from_std(start.elapsed()).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(scheduler.run_with_clock(tx, clock));

        let message = rx.recv().await.unwrap();
        assert_eq!(
            message,
            IncomingMessage {
                channel: 42,
                text: "!events".into()
            }
        );
        let waited = start.elapsed().as_secs();
        assert!((60..61).contains(&waited), "waited {waited}s");

        drop(rx);
        task.await.unwrap();
    }
}
