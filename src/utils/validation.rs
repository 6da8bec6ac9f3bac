use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::notification::DATE_FORMAT;

pub const FUTURE_DATE_REQUIRED: &str =
    "Error: Please set a future date for scheduling or go back to use the Instant Messaging interface.";

/// 定时发送的日期必须严格晚于今天
pub fn validate_schedule_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date <= today {
        return Err(AppError::Validation(FUTURE_DATE_REQUIRED.to_string()));
    }
    Ok(())
}

/// 收件表必须是配置中的选项之一
pub fn validate_recipient_group(group: &str, options: &[String]) -> Result<()> {
    if options.iter().any(|option| option == group) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Unknown recipient sheet: {}", group)))
    }
}

/// Parses the `YYYY-MM-DD` value an `<input type="date">` submits.
pub fn parse_form_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", raw.trim())))
}
