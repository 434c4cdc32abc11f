use std::time::{Duration, SystemTime};

pub const DEFAULT_ADVANCE_DELAY_MS: u64 = 1000;

/// Identifies one armed advance. A ticket from before a cancel or re-arm
/// never matches again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    ticket: Ticket,
    due_at: SystemTime,
}

/// The delayed "advance to next chunk" task, owned by whoever drives the
/// typing session. It never fires by itself: the owner polls it from its
/// tick loop, so cancelling (or dropping the owner) guarantees nothing runs
/// against a torn down session.
#[derive(Debug, Clone)]
pub struct AdvanceScheduler {
    delay: Duration,
    pending: Option<PendingAdvance>,
    generation: u64,
}

impl Default for AdvanceScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS))
    }
}

impl AdvanceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms the timer relative to `now`, replacing any earlier arming.
    pub fn arm(&mut self, now: SystemTime) -> Ticket {
        self.generation += 1;
        let ticket = Ticket(self.generation);
        self.pending = Some(PendingAdvance {
            ticket,
            due_at: now + self.delay,
        });
        ticket
    }

    /// Disarms the timer. Returns whether something was pending.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        self.pending.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<SystemTime> {
        self.pending.map(|p| p.due_at)
    }

    /// Fires at most once: returns the ticket when the armed advance is due
    /// and disarms it.
    pub fn poll(&mut self, now: SystemTime) -> Option<Ticket> {
        match self.pending {
            Some(p) if now >= p.due_at => {
                self.pending = None;
                Some(p.ticket)
            }
            _ => None,
        }
    }

    /// True while `ticket` is the live arming.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.pending.is_some_and(|p| p.ticket == ticket)
    }
}
