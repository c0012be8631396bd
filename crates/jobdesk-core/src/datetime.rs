use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "jobdesk-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "JOBDESK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "JOBDESK_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Jakarta";

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// Calendar date of `now` in the
/// project time zone. Deadlines are
/// compared against this date, never
/// against an instant.
#[must_use]
pub fn project_today(
  now: DateTime<Utc>
) -> NaiveDate {
  date_in(project_timezone(), now)
}

#[must_use]
pub fn date_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

/// Lenient parse of a stored date
/// string. Anything that is not a
/// `YYYY-MM-DD` calendar date yields
/// `None`.
#[must_use]
pub fn parse_iso_date(
  raw: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    ISO_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: u64
) -> NaiveDate {
  date
    .checked_add_days(Days::new(days))
    .unwrap_or(date)
}


const WEEKDAY_NAMES: [(Weekday, &[&str]); 7] = [
  (Weekday::Mon, &["monday", "mon", "senin"]),
  (Weekday::Tue, &["tuesday", "tue", "selasa"]),
  (Weekday::Wed, &["wednesday", "wed", "rabu"]),
  (Weekday::Thu, &["thursday", "thu", "kamis"]),
  (Weekday::Fri, &["friday", "fri", "jumat"]),
  (Weekday::Sat, &["saturday", "sat", "sabtu"]),
  (Weekday::Sun, &["sunday", "sun", "minggu"])
];

const MONTH_NAMES: [&[&str]; 12] = [
  &["january", "jan", "januari"],
  &["february", "feb", "februari"],
  &["march", "mar", "maret"],
  &["april", "apr"],
  &["may", "mei"],
  &["june", "jun", "juni"],
  &["july", "jul", "juli"],
  &["august", "aug", "agustus"],
  &["september", "sep", "sept"],
  &["october", "oct", "oktober"],
  &["november", "nov"],
  &["december", "dec", "desember"]
];

/// Zone precedence: `$JOBDESK_TIMEZONE`,
/// then the toml file, then Jakarta.
fn resolve_project_timezone() -> Tz {
  let from_env = std::env::var(
    TIMEZONE_ENV_VAR
  )
  .ok()
  .and_then(|raw| {
    parse_timezone(&raw, TIMEZONE_ENV_VAR)
  });
  if let Some(tz) = from_env {
    return tz;
  }

  let path = timezone_config_path();
  match read_timezone_file(&path) {
    | Ok(Some(raw)) => {
      let source = path.display().to_string();
      if let Some(tz) =
        parse_timezone(&raw, &source)
      {
        return tz;
      }
    }
    | Ok(None) => {}
    | Err(err) => {
      tracing::warn!(
        file = %path.display(),
        error = %format!("{err:#}"),
        "ignoring timezone config"
      );
    }
  }

  DEFAULT_PROJECT_TIMEZONE
    .parse()
    .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path() -> PathBuf {
  std::env::var(TIMEZONE_CONFIG_ENV_VAR)
    .ok()
    .map(|raw| raw.trim().to_string())
    .filter(|raw| !raw.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| {
      PathBuf::from(TIMEZONE_CONFIG_FILE)
    })
}

/// Zone id named by the file, either at
/// top level or under `[time]`. A
/// missing file is not an error.
fn read_timezone_file(
  path: &Path
) -> anyhow::Result<Option<String>> {
  if !path.exists() {
    return Ok(None);
  }

  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
  let parsed: TimezoneConfig =
    toml::from_str(&raw).with_context(
      || {
        format!(
          "failed to parse {}",
          path.display()
        )
      }
    )?;

  Ok(parsed.timezone.or(
    parsed
      .time
      .and_then(|section| section.timezone)
  ))
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %tz,
        "project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        value = trimmed,
        error = %err,
        "not a timezone id"
      );
      None
    }
  }
}

/// Resolves a date typed on the
/// command line against `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower = token.to_lowercase();

  let resolved = keyword_date(&lower, today)
    .or_else(|| weekday_date(&lower, today))
    .or_else(|| month_date(&lower, today))
    .or_else(|| relative_date(&lower, today))
    .or_else(|| {
      [ISO_DATE_FORMAT, "%d/%m/%Y"].iter().find_map(
        |fmt| {
          NaiveDate::parse_from_str(token, fmt)
            .ok()
        }
      )
    });

  resolved.ok_or_else(|| {
    anyhow!(
      "unrecognized date: {input} (use \
       YYYY-MM-DD, DD/MM/YYYY, today, \
       tomorrow, a weekday, a month or \
       +Nd/+Nw)"
    )
  })
}

fn keyword_date(
  token: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  match token {
    | "today" | "hari ini" => Some(today),
    | "tomorrow" | "besok" => {
      today.checked_add_days(Days::new(1))
    }
    | "yesterday" | "kemarin" => {
      today.checked_sub_days(Days::new(1))
    }
    | _ => None
  }
}

/// Next occurrence, never today.
fn weekday_date(
  token: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  let (target, _) = WEEKDAY_NAMES
    .iter()
    .find(|(_, names)| names.contains(&token))?;

  let ahead = (7
    + target.num_days_from_monday()
    - today.weekday().num_days_from_monday())
    % 7;
  let ahead = if ahead == 0 { 7 } else { ahead };
  today.checked_add_days(Days::new(
    u64::from(ahead)
  ))
}

/// First day of the next such month.
fn month_date(
  token: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  let month = MONTH_NAMES
    .iter()
    .position(|names| names.contains(&token))?;
  let month = u32::try_from(month + 1).ok()?;

  let first =
    NaiveDate::from_ymd_opt(today.year(), month, 1)?;
  if first > today {
    Some(first)
  } else {
    NaiveDate::from_ymd_opt(today.year() + 1, month, 1)
  }
}

fn relative_date(
  token: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  static RELATIVE: OnceLock<Option<Regex>> =
    OnceLock::new();
  let re = RELATIVE
    .get_or_init(|| {
      Regex::new(r"^([+-])(\d{1,5})([dw])$").ok()
    })
    .as_ref()?;

  let caps = re.captures(token)?;
  let amount: u64 = caps[2].parse().ok()?;
  let days = Days::new(match &caps[3] {
    | "w" => amount * 7,
    | _ => amount
  });

  if &caps[1] == "-" {
    today.checked_sub_days(days)
  } else {
    today.checked_add_days(days)
  }
}
