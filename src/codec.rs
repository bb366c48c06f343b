//! CSV row <-> `StudentRecord` mapping.
//!
//! Export goes through the `csv` writer, so quoting follows RFC 4180. Import
//! deliberately does not: rows are split on every comma and the address is
//! recovered with the phone-index heuristic (see [`find_phone_index`]). A
//! quoted field written by export therefore comes back with its quotes.

use std::io::Write;

use chrono::NaiveDate;

use crate::error::ParseError;
use crate::models::{Gender, StudentRecord, DATE_FORMAT};
use crate::validation::{gpa_in_range, is_phone_number};

pub const UTF8_BOM: &str = "\u{feff}";

pub const HEADER: [&str; 11] = [
    "Mã SV",
    "Họ và tên",
    "Ngày sinh",
    "Giới tính",
    "Địa chỉ",
    "Điện thoại",
    "Email",
    "Lớp",
    "Ngành",
    "GPA",
    "Xếp loại",
];

/// Index of the first address token.
const ADDRESS_START: usize = 4;

/// Fields after the phone that must be present: email, class, major, gpa.
const FIELDS_AFTER_PHONE: usize = 4;

pub fn to_row(record: &StudentRecord) -> [String; 11] {
    [
        record.id.clone(),
        record.full_name.clone(),
        record.birth_date_text(),
        record.gender.label().to_string(),
        record.address.clone(),
        record.phone.clone(),
        record.email.clone(),
        record.class_name.clone(),
        record.major.clone(),
        format!("{:.2}", record.gpa),
        record.academic_rank().label().to_string(),
    ]
}

/// Writes BOM, header and one row per record.
pub fn write_csv<W: Write>(mut out: W, records: &[StudentRecord]) -> Result<(), csv::Error> {
    out.write_all(UTF8_BOM.as_bytes())?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(HEADER)?;
    for record in records {
        writer.write_record(to_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// First token at or after the address column that looks like a phone number.
///
/// An address containing a phone-shaped token is indistinguishable from the
/// real phone column; the earlier token wins.
pub fn find_phone_index(tokens: &[&str]) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(ADDRESS_START)
        .find(|(_, token)| is_phone_number(token))
        .map(|(index, _)| index)
}

/// Parses one data line (never the header).
pub fn parse_line(line: &str) -> Result<StudentRecord, ParseError> {
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    if tokens.len() <= ADDRESS_START {
        return Err(ParseError::TooFewColumns {
            found: tokens.len(),
        });
    }

    let phone_index = find_phone_index(&tokens).ok_or(ParseError::NoPhoneNumber)?;
    let address = tokens[ADDRESS_START..phone_index].join(", ");

    let tail = &tokens[phone_index..];
    if tail.len() <= FIELDS_AFTER_PHONE {
        // Counted with the address collapsed into a single column.
        return Err(ParseError::TooFewColumns {
            found: ADDRESS_START + 1 + tail.len(),
        });
    }

    let id = required(tokens[0], "student id")?;
    let full_name = required(tokens[1], "full name")?;
    let birth_date = parse_birth_date(tokens[2])?;
    let gender = Gender::parse(tokens[3])
        .ok_or_else(|| ParseError::InvalidGender(tokens[3].to_string()))?;

    let phone = tail[0];
    let email = tail[1];
    let class_name = required(tail[2], "class name")?;
    let major = tail[3];
    let gpa = parse_gpa(tail[4])?;

    Ok(StudentRecord {
        id,
        full_name,
        birth_date,
        gender,
        address,
        phone: phone.to_string(),
        email: email.to_string(),
        class_name,
        major: major.to_string(),
        gpa,
    })
}

fn required(token: &str, field: &'static str) -> Result<String, ParseError> {
    if token.is_empty() {
        Err(ParseError::MissingField(field))
    } else {
        Ok(token.to_string())
    }
}

fn parse_birth_date(text: &str) -> Result<Option<NaiveDate>, ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ParseError::InvalidDate(text.to_string()))
}

fn parse_gpa(text: &str) -> Result<f64, ParseError> {
    if text.is_empty() {
        return Ok(0.0);
    }
    let gpa: f64 = text
        .parse()
        .map_err(|_| ParseError::InvalidGpa(text.to_string()))?;
    if !gpa_in_range(gpa) {
        return Err(ParseError::GpaOutOfRange(gpa));
    }
    Ok(gpa)
}
