//! DOS date/time conversion.
//!
//! ZIP headers store modification times in the 16+16 bit MS-DOS
//! format: seconds are halved, years count from 1980 in seven bits.
//! Encoding saturates at both ends of the representable range instead
//! of wrapping.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// Encode a calendar time as (dos_time, dos_date), saturating fields
/// that fall outside the representable 1980..=2107 range.
pub fn encode_dos_datetime(dt: &NaiveDateTime) -> (u16, u16) {
    let year = dt.year();
    let year_off = if year < 1980 {
        0
    } else {
        ((year - 1980) as u32).min(127)
    };
    let month = dt.month().clamp(1, 12);
    let day = dt.day().clamp(1, 31);
    let hour = dt.hour().min(23);
    let minute = dt.minute().min(59);
    let sec2 = (dt.second() / 2).min(29);

    let dos_time = ((hour << 11) | (minute << 5) | sec2) as u16;
    let dos_date = ((year_off << 9) | (month << 5) | day) as u16;
    (dos_time, dos_date)
}

/// Encode the current local time.
pub fn now_dos_datetime() -> (u16, u16) {
    let now = Local::now().naive_local();
    encode_dos_datetime(&now)
}

/// Decode a stored (dos_time, dos_date) pair for display. Nonsense
/// field values collapse to the DOS epoch rather than failing.
pub fn decode_dos_datetime(dos_time: u16, dos_date: u16) -> NaiveDateTime {
    let seconds = ((dos_time & 0x1f) as u32) * 2;
    let minutes = ((dos_time >> 5) & 0x3f) as u32;
    let hours = ((dos_time >> 11) & 0x1f) as u32;

    let day = (dos_date & 0x1f) as u32;
    let month = ((dos_date >> 5) & 0x0f) as u32;
    let year = ((dos_date >> 9) & 0x7f) as i32 + 1980;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds.min(59)))
        .unwrap_or_else(dos_epoch)
}

fn dos_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("DOS epoch is a valid date")
}
