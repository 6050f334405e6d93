use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::TaskError;

pub const DEFAULT_TIMEZONE: &str =
  "UTC";

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn today_in(
  tz: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&tz).date_naive()
}

/// The instant a due date expires: the
/// start of that calendar day in `tz`.
#[must_use]
pub fn deadline_of(
  date: NaiveDate,
  tz: Tz
) -> DateTime<Utc> {
  let midnight =
    date.and_time(chrono::NaiveTime::MIN);
  match tz.from_local_datetime(&midnight)
  {
    | LocalResult::Single(local) => {
      local.with_timezone(&Utc)
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      let chosen = if first <= second {
        first
      } else {
        second
      };
      chosen.with_timezone(&Utc)
    }
    | LocalResult::None => {
      // Midnight skipped by a DST jump;
      // the day starts an hour later.
      let shifted =
        midnight + Duration::hours(1);
      tz.from_local_datetime(&shifted)
        .earliest()
        .map(|local| {
          local.with_timezone(&Utc)
        })
        .unwrap_or_else(|| {
          shifted.and_utc()
        })
    }
  }
}

/// Parses a user-supplied due date. An
/// empty string clears the date.
#[tracing::instrument(skip(now, tz))]
pub fn parse_due_date(
  input: &str,
  now: DateTime<Utc>,
  tz: Tz
) -> Result<Option<NaiveDate>, TaskError>
{
  let token = input.trim();
  if token.is_empty() {
    return Ok(None);
  }
  let lower =
    token.to_ascii_lowercase();
  let today = today_in(tz, now);

  match lower.as_str() {
    | "today" => return Ok(Some(today)),
    | "tomorrow" => {
      return Ok(today.succ_opt());
    }
    | "yesterday" => {
      return Ok(today.pred_opt());
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(Some(next_weekday_date(
      today, weekday
    )));
  }

  if let Some(date) =
    parse_relative(&lower, today)
  {
    return Ok(Some(date));
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .map(Some)
  .map_err(|_| {
    TaskError::Validation(format!(
      "invalid due date: {token} \
       (expected YYYY-MM-DD, today, \
       tomorrow, a weekday name or \
       +Nd/+Nw)"
    ))
  })
}

fn parse_relative(
  token: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  let relative_re = Regex::new(
    r"^\+(?P<count>\d{1,4})(?P<unit>[dw])$"
  )
  .ok()?;
  let captures =
    relative_re.captures(token)?;
  let count = captures
    .name("count")?
    .as_str()
    .parse::<i64>()
    .ok()?;
  let days = match captures
    .name("unit")?
    .as_str()
  {
    | "w" => count * 7,
    | _ => count
  };
  today.checked_add_signed(
    Duration::days(days)
  )
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    deadline_of,
    parse_due_date,
    parse_timezone
  };
  use crate::error::TaskError;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_and_keywords() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let tz = chrono_tz::UTC;

    assert_eq!(
      parse_due_date(
        "2026-03-01",
        now,
        tz
      ),
      Ok(Some(date(2026, 3, 1)))
    );
    assert_eq!(
      parse_due_date(
        "tomorrow", now, tz
      ),
      Ok(Some(date(2026, 2, 18)))
    );
    assert_eq!(
      parse_due_date("+2w", now, tz),
      Ok(Some(date(2026, 3, 3)))
    );
    assert_eq!(
      parse_due_date("  ", now, tz),
      Ok(None)
    );
  }

  #[test]
  fn weekday_names_roll_forward() {
    // 2026-02-17 is a Tuesday.
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      parse_due_date(
        "tue",
        now,
        chrono_tz::UTC
      ),
      Ok(Some(date(2026, 2, 24)))
    );
    assert_eq!(
      parse_due_date(
        "friday",
        now,
        chrono_tz::UTC
      ),
      Ok(Some(date(2026, 2, 20)))
    );
  }

  #[test]
  fn rejects_impossible_dates() {
    let now = Utc::now();
    let err = parse_due_date(
      "2026-02-30",
      now,
      chrono_tz::UTC
    )
    .expect_err("feb 30 is invalid");
    assert!(matches!(
      err,
      TaskError::Validation(_)
    ));
  }

  #[test]
  fn deadline_is_local_midnight() {
    let tz = parse_timezone(
      "America/Mexico_City",
      "test"
    )
    .expect("known tz");
    let deadline =
      deadline_of(date(2026, 6, 1), tz);
    assert_eq!(
      deadline,
      Utc
        .with_ymd_and_hms(
          2026, 6, 1, 6, 0, 0
        )
        .single()
        .expect("valid")
    );
    assert_eq!(
      deadline_of(
        date(2026, 6, 1),
        chrono_tz::UTC
      ),
      Utc
        .with_ymd_and_hms(
          2026, 6, 1, 0, 0, 0
        )
        .single()
        .expect("valid")
    );
  }
}

pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const FORMAT: &str = "%Y-%m-%d";

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => serializer
        .serialize_str(
          &value
            .format(FORMAT)
            .to_string()
        ),
      | None => {
        serializer.serialize_none()
      }
    }
  }

  /// Accepts `null`, a missing key, or
  /// an empty string as "no due date".
  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    match opt.as_deref().map(str::trim)
    {
      | None | Some("") => Ok(None),
      | Some(raw) => {
        NaiveDate::parse_from_str(
          raw, FORMAT
        )
        .map(Some)
        .map_err(
          serde::de::Error::custom
        )
      }
    }
  }
}
