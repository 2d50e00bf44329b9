use chrono::Utc;
use uuid::Uuid;

// A nanosecond stamp plus a v4 uuid; never reused across tickets.
fn stamped(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}-{}", Uuid::new_v4())
}

pub fn ticket_qr_code() -> String {
    stamped("QR")
}

pub fn rfid_qr_code() -> String {
    stamped("RFID")
}

pub fn over_travel_qr_code() -> String {
    stamped("OT")
}
