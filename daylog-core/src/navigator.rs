//! The date the user is looking at, broadcast to every editor.

use chrono::{Local, NaiveDate};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveDate {
    pub date: NaiveDate,
    pub is_today: bool,
}

pub struct DateNavigator {
    tx: watch::Sender<ActiveDate>,
    today: NaiveDate,
}

impl DateNavigator {
    /// Starts on `today`.
    pub fn new(today: NaiveDate) -> Self {
        let (tx, _) = watch::channel(ActiveDate {
            date: today,
            is_today: true,
        });
        Self { tx, today }
    }

    pub fn from_local_clock() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn active(&self) -> ActiveDate {
        *self.tx.borrow()
    }

    /// Moves to `date`. Subscribers are only woken if the date changed.
    pub fn set_date(&self, date: NaiveDate) -> bool {
        let is_today = date == self.today;
        self.tx.send_if_modified(|active| {
            if active.date == date {
                return false;
            }
            *active = ActiveDate { date, is_today };
            true
        })
    }

    pub fn next_day(&self) -> bool {
        match self.active().date.succ_opt() {
            Some(date) => self.set_date(date),
            None => false,
        }
    }

    pub fn previous_day(&self) -> bool {
        match self.active().date.pred_opt() {
            Some(date) => self.set_date(date),
            None => false,
        }
    }

    pub fn today(&self) -> bool {
        self.set_date(self.today)
    }

    pub fn subscribe(&self) -> watch::Receiver<ActiveDate> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_navigation_tracks_today() {
        let nav = DateNavigator::new(day(10));
        assert!(nav.active().is_today);

        assert!(nav.previous_day());
        assert_eq!(
            nav.active(),
            ActiveDate {
                date: day(9),
                is_today: false
            }
        );
        assert!(nav.next_day());
        assert!(nav.next_day());
        assert_eq!(nav.active().date, day(11));

        assert!(nav.today());
        assert!(nav.active().is_today);
        assert!(!nav.today());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let nav = DateNavigator::new(day(10));
        let mut rx = nav.subscribe();
        assert!(!nav.set_date(day(10)));
        assert!(!rx.has_changed().unwrap());

        assert!(nav.set_date(day(1)));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().date, day(1));
    }
}
