use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use daybook::{
    Booking, BookingEngine, BookingRepository, BookingStatus, Customer, EngineError, Location,
    LocationSetting, NewBooking, SqliteBookingRepository,
};

// ── Helpers ──

fn utc(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .unwrap()
        .and_utc()
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn customer() -> Customer {
    Customer {
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        phone: "+15551110000".to_string(),
    }
}

fn every_day(open: &str, close: &str) -> String {
    let days = [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ];
    let entries: Vec<String> = days
        .iter()
        .map(|day| format!(r#""{day}": {{"open": "{open}", "close": "{close}"}}"#))
        .collect();
    format!("{{{}}}", entries.join(","))
}

fn setting(location_id: &str, daily: String, buffer_time: i64) -> LocationSetting {
    LocationSetting {
        location_id: location_id.to_string(),
        daily_availability: daily,
        time_zone: "America/Los_Angeles".to_string(),
        initial_booking_length: 60,
        booking_length_increments: 30,
        maximum_booking_length: 180,
        time_slot_increments: 15,
        buffer_time,
        same_day_lead_time_buffer: 120,
        max_advance_booking_days: 30,
        display_unavailable_slots: true,
    }
}

async fn setup_engine(setting_fixture: LocationSetting) -> Arc<BookingEngine> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();

    let repo = SqliteBookingRepository::open(":memory:").unwrap();
    let created = utc("2025-06-01 00:00");
    repo.create_location(
        &Location {
            id: setting_fixture.location_id.clone(),
            name: "Studio A".to_string(),
            timezone: setting_fixture.time_zone.clone(),
            created_at: created,
            updated_at: created,
        },
        &setting_fixture,
    )
    .await
    .unwrap();
    Arc::new(BookingEngine::new(Arc::new(repo)))
}

fn new_booking(start: &str, end: &str) -> NewBooking {
    NewBooking {
        location_id: "loc-1".to_string(),
        start_time: utc(start),
        end_time: utc(end),
        customer: customer(),
    }
}

fn assert_no_overlaps(bookings: &[Booking], buffer: Duration) {
    for (i, a) in bookings.iter().enumerate() {
        for b in &bookings[i + 1..] {
            assert!(
                a.start_time >= b.end_time + buffer || b.start_time >= a.end_time + buffer,
                "bookings {} and {} violate the buffered no-overlap invariant",
                a.id,
                b.id
            );
        }
    }
}

// now used throughout: 2025-06-10 12:00 UTC = 05:00 PDT, so "today" is the
// 10th and 2025-06-16 (a Monday) is safely inside the 30-day horizon.
const NOW: &str = "2025-06-10 12:00";

// ── Property 1: the no-overlap invariant holds across mutation sequences ──

#[tokio::test]
async fn no_overlap_invariant_across_create_update_cancel() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    let first = engine
        .create_booking_at(new_booking("2025-06-16 16:00", "2025-06-16 17:00"), now)
        .await
        .unwrap();
    let second = engine
        .create_booking_at(new_booking("2025-06-16 18:00", "2025-06-16 19:30"), now)
        .await
        .unwrap();
    engine
        .create_booking_at(new_booking("2025-06-16 20:00", "2025-06-16 21:00"), now)
        .await
        .unwrap();

    // moving the first inside the second's padded interval must fail
    let err = engine
        .update_booking_at(
            &first.id,
            utc("2025-06-16 17:30"),
            utc("2025-06-16 18:30"),
            customer(),
            now,
        )
        .await;
    assert!(matches!(err, Err(EngineError::SlotConflict)));

    // cancelling the second frees its interval for the same move
    engine.cancel_booking_at(&second.id, now).await.unwrap();
    engine
        .update_booking_at(
            &first.id,
            utc("2025-06-16 17:30"),
            utc("2025-06-16 18:30"),
            customer(),
            now,
        )
        .await
        .unwrap();

    // the moved interval is now the one that blocks
    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    let at = |s: &str| day.slots.iter().find(|slot| slot.start == utc(s)).unwrap();
    assert!(!at("2025-06-16 17:30").is_available);
    assert!(at("2025-06-16 16:00").is_available);
}

#[tokio::test]
async fn no_overlap_invariant_direct_inspection() {
    let repo = SqliteBookingRepository::open(":memory:").unwrap();
    let created = utc("2025-06-01 00:00");
    repo.create_location(
        &Location {
            id: "loc-1".to_string(),
            name: "Studio A".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            created_at: created,
            updated_at: created,
        },
        &setting("loc-1", every_day("09:00", "17:00"), 10),
    )
    .await
    .unwrap();
    let engine = Arc::new(BookingEngine::new(Arc::new(repo.clone())));
    let now = utc(NOW);

    // drive a mixed sequence, ignoring expected rejections
    let requests = [
        ("2025-06-16 16:00", "2025-06-16 17:00"),
        ("2025-06-16 16:30", "2025-06-16 17:30"), // conflicts
        ("2025-06-16 17:15", "2025-06-16 18:15"),
        ("2025-06-16 18:30", "2025-06-16 19:30"),
        ("2025-06-16 18:45", "2025-06-16 19:45"), // conflicts
        ("2025-06-16 21:00", "2025-06-16 22:30"),
    ];
    for (start, end) in requests {
        let _ = engine.create_booking_at(new_booking(start, end), now).await;
    }

    let active = repo
        .active_bookings_between("loc-1", utc("2025-06-16 00:00"), utc("2025-06-17 12:00"))
        .await
        .unwrap();
    assert_eq!(active.len(), 4);
    assert_no_overlaps(&active, Duration::minutes(10));
}

// ── Property 2: every slot shown available books successfully ──

#[tokio::test]
async fn advertised_slots_are_committable() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    engine
        .create_booking_at(new_booking("2025-06-16 18:00", "2025-06-16 19:00"), now)
        .await
        .unwrap();

    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    assert!(day.is_open);

    for slot in day.slots.iter().filter(|s| s.is_available) {
        let booked = engine
            .create_booking_at(
                NewBooking {
                    location_id: "loc-1".to_string(),
                    start_time: slot.start,
                    end_time: slot.end,
                    customer: customer(),
                },
                now,
            )
            .await
            .unwrap_or_else(|e| panic!("advertised slot {} failed to book: {e}", slot.start));
        // restore state so the next advertised slot is still accurate
        engine.cancel_booking_at(&booked.id, now).await.unwrap();
    }
}

// ── Property 3: reads are idempotent ──

#[tokio::test]
async fn availability_read_is_idempotent() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    engine
        .create_booking_at(new_booking("2025-06-16 18:00", "2025-06-16 19:00"), now)
        .await
        .unwrap();

    let first = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    let second = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();

    assert_eq!(first.is_open, second.is_open);
    assert_eq!(first.open_time, second.open_time);
    assert_eq!(first.close_time, second.close_time);
    assert_eq!(first.slots, second.slots);
}

// ── Property 4: boundary slots ──

#[tokio::test]
async fn slot_ending_exactly_at_close_is_offered() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    let last = day.slots.last().unwrap();
    assert_eq!(Some(last.end), day.close_time);
    assert!(last.is_available);

    let booked = engine
        .create_booking_at(
            NewBooking {
                location_id: "loc-1".to_string(),
                start_time: last.start,
                end_time: last.end,
                customer: customer(),
            },
            now,
        )
        .await;
    assert!(booked.is_ok());
}

#[tokio::test]
async fn slot_starting_exactly_at_padded_end_is_free() {
    // buffer 15 keeps the padded boundary on the 15-minute grid
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 15)).await;
    let now = utc(NOW);

    // 10:00-11:30 local; padded end 11:45
    engine
        .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:30"), now)
        .await
        .unwrap();

    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    let at = |s: &str| {
        day.slots
            .iter()
            .find(|slot| slot.start == utc(s))
            .unwrap_or_else(|| panic!("no candidate at {s}"))
    };
    // 11:45 local starts exactly at the padded end
    assert!(at("2025-06-16 18:45").is_available);
    // one grid step earlier is still inside it
    assert!(!at("2025-06-16 18:30").is_available);
}

// ── Property 5: advance horizon ──

#[tokio::test]
async fn horizon_is_inclusive() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    let at_horizon = engine
        .get_available_slots_at("loc-1", d("2025-07-10"), 60, None, now)
        .await
        .unwrap();
    assert!(at_horizon.is_open);
    assert!(!at_horizon.slots.is_empty());

    let beyond = engine
        .get_available_slots_at("loc-1", d("2025-07-11"), 60, None, now)
        .await
        .unwrap();
    assert!(!beyond.is_open);
    assert!(beyond.slots.is_empty());
}

// ── Property 6: the Los Angeles worked example ──

#[tokio::test]
async fn los_angeles_scenario() {
    // hours 09:00-23:00, increments 15, buffer 10, initial length 60
    let engine = setup_engine(setting("loc-1", every_day("09:00", "23:00"), 10)).await;
    let now = utc(NOW);

    // one active booking 10:00-11:30 local (17:00-18:30 UTC in PDT)
    engine
        .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:30"), now)
        .await
        .unwrap();

    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();

    // nothing before open: the first candidate is 09:00 local, not 08:50
    assert_eq!(day.slots[0].start, utc("2025-06-16 16:00"));
    assert_eq!(day.open_time, Some(utc("2025-06-16 16:00")));

    // padded booking occupies 09:50-11:40 local; a 60-minute slot conflicts
    // exactly when it starts inside (08:50, 11:40)
    for slot in &day.slots {
        let local_start = slot.start.with_timezone(&chrono_tz::America::Los_Angeles);
        let hhmm = local_start.format("%H:%M").to_string();
        let should_conflict = slot.start < utc("2025-06-16 18:40");
        assert_eq!(
            slot.is_available, !should_conflict,
            "candidate at {hhmm} local has wrong availability"
        );
    }

    // 11:40 is off-grid; 11:45 is the first available start
    let first_free = day.slots.iter().find(|s| s.is_available).unwrap();
    assert_eq!(first_free.start, utc("2025-06-16 18:45"));
}

// ── Property 7: concurrent committers ──

#[tokio::test]
async fn concurrent_identical_creates_one_winner() {
    let engine = setup_engine(setting("loc-1", every_day("09:00", "17:00"), 10)).await;
    let now = utc(NOW);

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:00"), now)
                .await
        })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:00"), now)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::SlotConflict)))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);

    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(winner.status, BookingStatus::Active);
}

// ── Hidden slots: display_unavailable_slots = false filters, not flags ──

#[tokio::test]
async fn unavailable_slots_can_be_omitted() {
    let mut hidden = setting("loc-1", every_day("09:00", "17:00"), 10);
    hidden.display_unavailable_slots = false;
    let engine = setup_engine(hidden).await;
    let now = utc(NOW);

    engine
        .create_booking_at(new_booking("2025-06-16 18:00", "2025-06-16 19:00"), now)
        .await
        .unwrap();

    let day = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await
        .unwrap();
    assert!(day.is_open);
    assert!(!day.slots.is_empty());
    assert!(day.slots.iter().all(|s| s.is_available));
}

// ── Config errors block scheduling for the location ──

#[tokio::test]
async fn malformed_policy_is_a_config_error() {
    let engine = setup_engine(setting("loc-1", "{broken".to_string(), 10)).await;
    let now = utc(NOW);

    let err = engine
        .get_available_slots_at("loc-1", d("2025-06-16"), 60, None, now)
        .await;
    assert!(matches!(err, Err(EngineError::Config(_))));

    let err = engine
        .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:00"), now)
        .await;
    assert!(matches!(err, Err(EngineError::Config(_))));
}

// ── Maintenance sweep: completion is time-based and external ──

#[tokio::test]
async fn elapsed_bookings_complete_and_stop_blocking() {
    let repo = SqliteBookingRepository::open(":memory:").unwrap();
    let created = utc("2025-06-01 00:00");
    repo.create_location(
        &Location {
            id: "loc-1".to_string(),
            name: "Studio A".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            created_at: created,
            updated_at: created,
        },
        &setting("loc-1", every_day("09:00", "17:00"), 10),
    )
    .await
    .unwrap();
    let engine = BookingEngine::new(Arc::new(repo.clone()));

    let booking = engine
        .create_booking_at(new_booking("2025-06-16 17:00", "2025-06-16 18:00"), utc(NOW))
        .await
        .unwrap();

    let flipped = repo.complete_elapsed(utc("2025-06-17 00:00")).await.unwrap();
    assert_eq!(flipped, 1);

    let completed = repo.get_booking(&booking.id).await.unwrap().unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    // completed bookings are terminal and no longer block their interval
    let err = engine.cancel_booking_at(&booking.id, utc(NOW)).await;
    assert!(matches!(
        err,
        Err(EngineError::InvalidState(BookingStatus::Completed))
    ));
}
