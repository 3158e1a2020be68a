use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use marmita_core::config::BusinessHoursConfig;
use marmita_core::domain::customer::CustomerId;
use marmita_core::errors::ApplicationError;

const SECONDS_PER_HOUR: i32 = 3_600;

/// Weekly opening window evaluated in a fixed UTC offset.
#[derive(Clone, Debug)]
pub struct BusinessHours {
    enabled: bool,
    offset: FixedOffset,
    open_hour: u32,
    close_hour: u32,
    weekdays: Vec<Weekday>,
}

impl BusinessHours {
    pub fn from_config(config: &BusinessHoursConfig) -> Result<Self, ApplicationError> {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * SECONDS_PER_HOUR).ok_or_else(
            || {
                ApplicationError::Configuration(format!(
                    "business_hours.utc_offset_hours `{}` is out of range",
                    config.utc_offset_hours
                ))
            },
        )?;
        let weekdays = config
            .weekdays
            .iter()
            .map(|day| iso_weekday(*day))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ApplicationError::Configuration(
                    "business_hours.weekdays must be between 1 and 7".to_owned(),
                )
            })?;

        Ok(Self {
            enabled: config.enabled,
            offset,
            open_hour: config.open_hour,
            close_hour: config.close_hour,
            weekdays,
        })
    }

    pub fn always_open() -> Self {
        Self {
            enabled: false,
            offset: Utc.fix(),
            open_hour: 0,
            close_hour: 24,
            weekdays: Vec::new(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Opening hour inclusive, closing hour exclusive.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let local = now.with_timezone(&self.offset);
        self.weekdays.contains(&local.weekday())
            && local.hour() >= self.open_hour
            && local.hour() < self.close_hour
    }

    /// `seg, ter, qua, qui, sex e sáb, das 10h às 15h`
    pub fn describe(&self) -> String {
        let days = self.weekdays.iter().map(|day| weekday_label(*day)).collect::<Vec<_>>();
        let days = match days.split_last() {
            Some((last, [])) => (*last).to_owned(),
            Some((last, rest)) => format!("{} e {last}", rest.join(", ")),
            None => String::new(),
        };
        format!("{days}, das {}h às {}h", self.open_hour, self.close_hour)
    }
}

fn iso_weekday(day: u32) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "seg",
        Weekday::Tue => "ter",
        Weekday::Wed => "qua",
        Weekday::Thu => "qui",
        Weekday::Fri => "sex",
        Weekday::Sat => "sáb",
        Weekday::Sun => "dom",
    }
}

/// Staff numbers: they bypass the opening window and receive order and feedback notices.
#[derive(Clone, Debug, Default)]
pub struct AdminDirectory {
    numbers: BTreeSet<CustomerId>,
}

impl AdminDirectory {
    /// Every configured number must normalize to a contact id.
    pub fn from_numbers<I, S>(numbers: I) -> Result<Self, ApplicationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let numbers = numbers
            .into_iter()
            .map(|number| CustomerId::parse(number.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { numbers })
    }

    pub fn is_admin(&self, customer_id: &CustomerId) -> bool {
        self.numbers.contains(customer_id)
    }

    pub fn recipients(&self) -> impl Iterator<Item = &CustomerId> {
        self.numbers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}
