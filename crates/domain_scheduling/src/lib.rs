//! Scheduling Domain - Recurring Invoice Templates
//!
//! A recurring template describes an invoice to generate on a schedule:
//! frequency, day-of-month handling (including a last-business-day
//! rule), start and end bounds, and an occurrence cap.
//!
//! Generation and schedule advancement are deliberately separate steps:
//! `generate` builds a draft invoice without touching the template, and
//! the caller advances the schedule only after the invoice commits.
//! A failed creation therefore never skips an occurrence. The
//! claim/release protocol keeps concurrent scheduler instances from
//! firing the same template twice.

pub mod template;
pub mod schedule;
pub mod error;

pub use template::{
    DayOfMonth, Frequency, FrequencyUnit, RecurringTemplate, TemplateLine, TemplateStatus,
};
pub use schedule::{advance, generate, next_run_date, should_run, DraftInvoice, DraftLine};
pub use error::ScheduleError;
