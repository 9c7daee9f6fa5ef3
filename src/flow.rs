use chrono::{DateTime, Utc};

/// Time source for anything schedule-shaped. Handlers only ever see this
/// trait so tests can pin the clock.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Editing phase of one grading sheet. Mirrors the stored `locked` flag:
/// the store itself never blocks writes, callers consult this first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPhase {
    Editable,
    Finalized,
}

impl ResultPhase {
    pub fn from_locked(locked: bool) -> Self {
        if locked {
            Self::Finalized
        } else {
            Self::Editable
        }
    }

    pub fn locked(self) -> bool {
        matches!(self, Self::Finalized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Editable => "editable",
            Self::Finalized => "finalized",
        }
    }

    pub fn can_edit(self) -> bool {
        matches!(self, Self::Editable)
    }

    /// Saving a sheet always lands in the finalized phase.
    pub fn save(self) -> Self {
        Self::Finalized
    }

    /// Explicit reopen is the only path back to editing.
    pub fn reopen(self) -> Self {
        Self::Editable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryStatus {
    Open,
    Answered,
    Closed,
}

impl InquiryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "answered" => Some(Self::Answered),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
            Self::Closed => "closed",
        }
    }

    pub fn can_reply(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// A staff reply resolves an open thread; student replies leave the
    /// status alone.
    pub fn on_reply(self, by_staff: bool) -> Self {
        match (self, by_staff) {
            (Self::Open, true) => Self::Answered,
            (status, _) => status,
        }
    }

    /// Closed threads must reopen before they can count as answered
    /// again; every other move (including a no-op) is allowed.
    pub fn can_set(self, to: Self) -> bool {
        !matches!((self, to), (Self::Closed, Self::Answered))
    }
}

/// Default send window for report cards, in milliseconds.
pub const CARD_SEND_MS: i64 = 1500;

/// Lifecycle of a queued report-card send. Purely a function of elapsed
/// time against the delivery window; nothing ticks it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Sending,
    Sent,
}

impl Delivery {
    /// Phase at `now` for a card queued at `queued_at`. The first third
    /// of the window reads as queued, the rest as sending, and anything
    /// past the window as sent.
    pub fn at(queued_at: DateTime<Utc>, deliver_after_ms: i64, now: DateTime<Utc>) -> Self {
        let elapsed = now.signed_duration_since(queued_at).num_milliseconds();
        if elapsed >= deliver_after_ms {
            Self::Sent
        } else if elapsed >= deliver_after_ms / 3 {
            Self::Sending
        } else {
            Self::Queued
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Sent => "sent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn result_phase_round_trips_through_save_and_reopen() {
        let phase = ResultPhase::from_locked(false);
        assert!(phase.can_edit());
        let saved = phase.save();
        assert_eq!(saved, ResultPhase::Finalized);
        assert!(saved.locked());
        assert!(!saved.can_edit());
        assert_eq!(saved.reopen(), ResultPhase::Editable);
        assert_eq!(ResultPhase::from_locked(true), ResultPhase::Finalized);
    }

    #[test]
    fn staff_reply_answers_open_inquiries_only() {
        assert_eq!(InquiryStatus::Open.on_reply(true), InquiryStatus::Answered);
        assert_eq!(InquiryStatus::Open.on_reply(false), InquiryStatus::Open);
        assert_eq!(
            InquiryStatus::Answered.on_reply(true),
            InquiryStatus::Answered
        );
    }

    #[test]
    fn closed_inquiries_reject_answered_but_allow_reopen() {
        assert!(!InquiryStatus::Closed.can_set(InquiryStatus::Answered));
        assert!(InquiryStatus::Closed.can_set(InquiryStatus::Open));
        assert!(InquiryStatus::Open.can_set(InquiryStatus::Closed));
        assert!(InquiryStatus::Answered.can_set(InquiryStatus::Answered));
        assert!(!InquiryStatus::Closed.can_reply());
        assert!(InquiryStatus::Answered.can_reply());
    }

    #[test]
    fn delivery_phase_follows_the_window() {
        let queued = Utc::now();
        let at = |ms: i64| Delivery::at(queued, 1500, queued + Duration::milliseconds(ms));
        assert_eq!(at(0), Delivery::Queued);
        assert_eq!(at(499), Delivery::Queued);
        assert_eq!(at(500), Delivery::Sending);
        assert_eq!(at(1499), Delivery::Sending);
        assert_eq!(at(1500), Delivery::Sent);
        assert_eq!(at(90_000), Delivery::Sent);
    }

    #[test]
    fn zero_window_is_sent_immediately() {
        let queued = Utc::now();
        assert_eq!(Delivery::at(queued, 0, queued), Delivery::Sent);
    }
}
