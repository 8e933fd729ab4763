//! Watch mode: seat-availability polling.
//!
//! Posts the term and CRN to the enrollment-info endpoint, reads four
//! labeled counts out of the returned fragment, and keeps polling on a
//! fixed one-second interval until a seat (or waitlist spot) opens up.

use std::time::Duration;

use crate::error::WorkflowError;
use crate::html;
use crate::notify;
use crate::task::RunContext;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

const ENROLLMENT_LABEL: &str = "Enrollment Seats Available:";
const WAITLIST_AVAILABLE_LABEL: &str = "Waitlist Seats Available:";
const WAITLIST_CAPACITY_LABEL: &str = "Waitlist Capacity:";
const WAITLIST_ACTUAL_LABEL: &str = "Waitlist Actual:";

/// Seat counts for one course section. Absent or non-numeric fields parse
/// to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeatCounts {
    pub enrollment_seats_available: i64,
    pub waitlist_seats_available: i64,
    pub waitlist_capacity: i64,
    pub waitlist_actual: i64,
}

/// What the poller does with a set of counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// A seat or waitlist spot is open; the watch terminates
    Available,
    /// Seats exist but the waitlist has not opened yet; keep polling
    WaitlistOpeningSoon,
    /// Nothing open; keep polling
    NotAvailable,
}

impl Availability {
    pub fn status_text(self) -> &'static str {
        match self {
            Availability::Available => "Now available",
            Availability::WaitlistOpeningSoon => "Waitlist opening soon",
            Availability::NotAvailable => "Not available",
        }
    }
}

impl SeatCounts {
    /// Parse the labeled counts out of the enrollment-info fragment.
    pub fn parse(body: &str) -> Self {
        let mut counts = SeatCounts::default();
        for (label, value) in html::labeled_siblings(body, "span.status-bold") {
            let number = value.trim().parse::<i64>().unwrap_or(0);
            if label.contains(ENROLLMENT_LABEL) {
                counts.enrollment_seats_available = number;
            } else if label.contains(WAITLIST_AVAILABLE_LABEL) {
                counts.waitlist_seats_available = number;
            } else if label.contains(WAITLIST_CAPACITY_LABEL) {
                counts.waitlist_capacity = number;
            } else if label.contains(WAITLIST_ACTUAL_LABEL) {
                counts.waitlist_actual = number;
            }
        }
        counts
    }

    /// The availability decision table.
    pub fn availability(&self) -> Availability {
        let waitlist_open =
            self.waitlist_capacity > self.waitlist_actual && self.waitlist_seats_available > 0;
        let seats_open =
            self.enrollment_seats_available > 0 && self.waitlist_seats_available > 0;
        if waitlist_open || seats_open {
            Availability::Available
        } else if self.enrollment_seats_available >= 1 && self.waitlist_seats_available == 0 {
            Availability::WaitlistOpeningSoon
        } else {
            Availability::NotAvailable
        }
    }
}

/// Poll until the course opens up or the run is cancelled.
pub async fn run(ctx: &RunContext) -> Result<(), WorkflowError> {
    loop {
        let body = ctx
            .client
            .post_form(
                &ctx.endpoints.enrollment_info_url(),
                &[
                    ("term", ctx.task.term.as_str()),
                    ("courseReferenceNumber", ctx.task.crns.as_str()),
                ],
            )
            .await?;

        let counts = SeatCounts::parse(&body);
        let decision = counts.availability();
        ctx.task.set_status(decision.status_text());

        if decision == Availability::Available {
            notify::send(
                &ctx.client,
                &ctx.task.webhook_url,
                &ctx.task.crns,
                decision.status_text(),
            )
            .await;
            return Ok(());
        }

        if !ctx.wait(POLL_INTERVAL).await {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(enroll: i64, cap: i64, actual: i64, avail: i64) -> SeatCounts {
        SeatCounts {
            enrollment_seats_available: enroll,
            waitlist_capacity: cap,
            waitlist_actual: actual,
            waitlist_seats_available: avail,
        }
    }

    #[test]
    fn seats_without_waitlist_keep_polling() {
        assert_eq!(
            counts(5, 0, 0, 0).availability(),
            Availability::WaitlistOpeningSoon
        );
    }

    #[test]
    fn open_waitlist_is_available() {
        assert_eq!(counts(0, 3, 1, 2).availability(), Availability::Available);
    }

    #[test]
    fn seats_plus_waitlist_spots_are_available() {
        assert_eq!(counts(2, 0, 0, 3).availability(), Availability::Available);
    }

    #[test]
    fn nothing_open_keeps_polling() {
        assert_eq!(
            counts(0, 0, 0, 0).availability(),
            Availability::NotAvailable
        );
    }

    #[test]
    fn full_waitlist_without_spots_keeps_polling() {
        assert_eq!(
            counts(0, 3, 3, 0).availability(),
            Availability::NotAvailable
        );
    }

    #[test]
    fn parse_reads_adjacent_sibling_values() {
        let body = r#"
            <span class="status-bold">Enrollment Seats Available:</span><span>5</span>
            <span class="status-bold">Waitlist Seats Available:</span><span>2</span>
            <span class="status-bold">Waitlist Capacity:</span><span>10</span>
            <span class="status-bold">Waitlist Actual:</span><span>8</span>
        "#;
        assert_eq!(SeatCounts::parse(body), counts(5, 10, 8, 2));
    }

    #[test]
    fn parse_defaults_missing_and_garbage_to_zero() {
        let body = r#"
            <span class="status-bold">Enrollment Seats Available:</span><span>N/A</span>
        "#;
        assert_eq!(SeatCounts::parse(body), SeatCounts::default());
    }
}
