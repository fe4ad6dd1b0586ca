//! CSV export of triangle responses (RFC 4180 quoting).

use crate::{response::Response, timestamp};

pub const CSV_HEADER: [&str; 7] = [
  "panelist_id",
  "panelist_name",
  "seat_number",
  "choice_code",
  "correct",
  "submitted_at",
  "free_text",
];

/// Quote `field` if it contains a delimiter, a quote, or a line break;
/// embedded quotes are doubled.
pub fn escape_field(field: &str) -> String {
  if field.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_owned()
  }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
  let row: Vec<String> = fields.into_iter().map(escape_field).collect();
  out.push_str(&row.join(","));
  out.push('\n');
}

/// Render one header row plus one row per response, in the given order.
/// Responses without a triangle answer leave the choice and correct
/// columns empty.
pub fn responses_to_csv(responses: &[Response]) -> String {
  let mut out = String::new();
  push_row(&mut out, CSV_HEADER);

  for r in responses {
    let seat = r.seat_number.map(|s| s.to_string()).unwrap_or_default();
    let (choice, correct) = match r.triangle() {
      Some(a) => (a.choice_code.as_str(), if a.correct { "1" } else { "0" }),
      None => ("", ""),
    };
    let submitted = timestamp::format(&r.submitted_at);
    push_row(
      &mut out,
      [
        r.panelist_id.as_str(),
        r.panelist_name.as_deref().unwrap_or(""),
        seat.as_str(),
        choice,
        correct,
        submitted.as_str(),
        r.free_text.as_deref().unwrap_or(""),
      ],
    );
  }
  out
}
