use chrono::NaiveDate;

use crate::locations::Location;

const INSTRUCTIONS: &str = include_str!("prompt.txt");

/// The ordered parts sent to the summarizer: filled-in instructions first,
/// then the filtered forecast document.
pub fn build_prompt(location: &Location, date: NaiveDate, forecast: String) -> Vec<String> {
    let instructions = INSTRUCTIONS
        .replace("{location}", &location.display_name)
        .replace("{date}", &date.format("%A, %B %-d, %Y").to_string());
    vec![instructions, forecast]
}
