pub(crate) mod time;
pub(crate) mod timezone;

pub(crate) use time::{epoch_to_utc, format_utc, parse_timestamp};
pub(crate) use timezone::Timezone;
