// src/scheduling/calendar.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::store::{Appointment, AppointmentFilter, AppointmentStore, SortOrder};
use super::window::DateWindow;
use super::{SchedulingError, status::AppointmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Daily,
    Weekly,
}

/// Per-status counts over the returned set. Derived on the fly, never
/// stored. Cancelled records are excluded from the base query, so they have
/// no bucket here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CalendarStats {
    pub total: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub no_show: usize,
}

impl CalendarStats {
    pub fn tally(appointments: &[Appointment]) -> Self {
        let mut stats = CalendarStats {
            total: appointments.len(),
            ..Default::default()
        };
        for a in appointments {
            match a.status {
                AppointmentStatus::Scheduled => stats.scheduled += 1,
                AppointmentStatus::InProgress => stats.in_progress += 1,
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::NoShow => stats.no_show += 1,
                AppointmentStatus::Cancelled => {}
            }
        }
        stats
    }
}

/// The window as closed day-boundary instants, the shape the frontend
/// renders (00:00:00.000 on the first day through 23:59:59.999 on the last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl From<DateWindow> for DateRange {
    fn from(w: DateWindow) -> Self {
        Self {
            start: w.start_at(),
            end: w.end_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarData {
    pub view: CalendarView,
    pub date_range: DateRange,
    pub appointments: Vec<Appointment>,
    pub stats: CalendarStats,
}

/// Read-only calendar composition: normalize the requested window, pull the
/// non-cancelled appointments inside it sorted by date then time label, and
/// derive the counts.
///
/// Daily uses `anchor` (or `today`). Weekly uses the explicit start/end pair
/// when both are supplied, otherwise the ISO week (Monday start) containing
/// `today`.
pub async fn calendar_view(
    store: &dyn AppointmentStore,
    view: CalendarView,
    anchor: Option<NaiveDate>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<CalendarData, SchedulingError> {
    let window = match view {
        CalendarView::Daily => DateWindow::single_day(anchor.unwrap_or(today)),
        CalendarView::Weekly => match (start, end) {
            (Some(s), Some(e)) => DateWindow::span(s, e),
            _ => DateWindow::week_of(today),
        },
    };

    let filter = AppointmentFilter {
        exclude_status: Some(AppointmentStatus::Cancelled),
        date_from: Some(window.start),
        date_to: Some(window.end),
        ..Default::default()
    };
    let appointments = store.find_many(&filter, SortOrder::DateAsc, None).await?;
    let stats = CalendarStats::tally(&appointments);

    Ok(CalendarData {
        view,
        date_range: window.into(),
        appointments,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::memory::InMemoryStore;
    use AppointmentStatus::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn daily_view_returns_only_that_day() {
        let store = InMemoryStore::new();
        store.seed("A", d("2025-06-10"), "10:00 AM", Scheduled).await;
        store.seed("B", d("2025-06-11"), "10:00 AM", Scheduled).await;

        let data = calendar_view(
            &store,
            CalendarView::Daily,
            Some(d("2025-06-10")),
            None,
            None,
            d("2025-06-01"),
        )
        .await
        .unwrap();

        assert_eq!(data.date_range, DateWindow::single_day(d("2025-06-10")).into());
        assert_eq!(data.date_range.start.to_string(), "2025-06-10 00:00:00");
        assert_eq!(data.date_range.end.to_string(), "2025-06-10 23:59:59.999");
        assert_eq!(data.appointments.len(), 1);
        assert_eq!(data.appointments[0].patient_name, "A");
        assert_eq!(data.stats.total, 1);
    }

    #[tokio::test]
    async fn daily_view_defaults_to_today() {
        let store = InMemoryStore::new();
        store.seed("A", d("2025-06-10"), "10:00 AM", Scheduled).await;

        let data = calendar_view(&store, CalendarView::Daily, None, None, None, d("2025-06-10"))
            .await
            .unwrap();
        assert_eq!(data.appointments.len(), 1);
    }

    #[tokio::test]
    async fn weekly_view_defaults_to_current_iso_week() {
        let store = InMemoryStore::new();
        // Inside the week of Wed 2025-06-11 (Mon 06-09 .. Sun 06-15):
        store.seed("Mon", d("2025-06-09"), "09:00 AM", Scheduled).await;
        store.seed("Sun", d("2025-06-15"), "09:00 AM", Scheduled).await;
        // Outside:
        store.seed("Before", d("2025-06-08"), "09:00 AM", Scheduled).await;
        store.seed("After", d("2025-06-16"), "09:00 AM", Scheduled).await;

        let data = calendar_view(&store, CalendarView::Weekly, None, None, None, d("2025-06-11"))
            .await
            .unwrap();

        assert_eq!(
            data.date_range,
            DateWindow::span(d("2025-06-09"), d("2025-06-15")).into()
        );
        let names: Vec<_> = data.appointments.iter().map(|a| a.patient_name.as_str()).collect();
        assert_eq!(names, ["Mon", "Sun"]);
    }

    #[tokio::test]
    async fn weekly_view_honours_explicit_range() {
        let store = InMemoryStore::new();
        store.seed("In", d("2025-07-02"), "09:00 AM", Scheduled).await;
        store.seed("Out", d("2025-07-10"), "09:00 AM", Scheduled).await;

        let data = calendar_view(
            &store,
            CalendarView::Weekly,
            None,
            Some(d("2025-07-01")),
            Some(d("2025-07-05")),
            d("2025-06-11"),
        )
        .await
        .unwrap();
        assert_eq!(data.appointments.len(), 1);
        assert_eq!(data.appointments[0].patient_name, "In");
    }

    #[tokio::test]
    async fn cancelled_records_never_appear_in_list_or_stats() {
        let store = InMemoryStore::new();
        store.seed("Kept", d("2025-06-10"), "10:00 AM", Scheduled).await;
        store.seed("Gone", d("2025-06-10"), "11:00 AM", Cancelled).await;

        let data = calendar_view(
            &store,
            CalendarView::Daily,
            Some(d("2025-06-10")),
            None,
            None,
            d("2025-06-10"),
        )
        .await
        .unwrap();

        assert_eq!(data.appointments.len(), 1);
        assert_eq!(data.stats.total, 1);
        assert_eq!(data.stats.scheduled, 1);
    }

    #[tokio::test]
    async fn appointments_sort_by_date_then_time_label() {
        let store = InMemoryStore::new();
        store.seed("C", d("2025-06-11"), "08:00 AM", Scheduled).await;
        store.seed("B", d("2025-06-10"), "11:00 AM", Scheduled).await;
        store.seed("A", d("2025-06-10"), "10:00 AM", Scheduled).await;

        let data = calendar_view(
            &store,
            CalendarView::Weekly,
            None,
            Some(d("2025-06-09")),
            Some(d("2025-06-15")),
            d("2025-06-11"),
        )
        .await
        .unwrap();

        let names: Vec<_> = data.appointments.iter().map(|a| a.patient_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn stats_count_each_non_cancelled_status() {
        let store = InMemoryStore::new();
        store.seed("S", d("2025-06-10"), "09:00 AM", Scheduled).await;
        store.seed("P", d("2025-06-10"), "10:00 AM", InProgress).await;
        store.seed("C", d("2025-06-10"), "11:00 AM", Completed).await;
        store.seed("N", d("2025-06-10"), "12:00 PM", NoShow).await;

        let data = calendar_view(
            &store,
            CalendarView::Daily,
            Some(d("2025-06-10")),
            None,
            None,
            d("2025-06-10"),
        )
        .await
        .unwrap();

        assert_eq!(data.stats.total, 4);
        assert_eq!(data.stats.scheduled, 1);
        assert_eq!(data.stats.in_progress, 1);
        assert_eq!(data.stats.completed, 1);
        assert_eq!(data.stats.no_show, 1);
    }
}
