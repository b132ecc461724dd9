//! Estonian-style personal identification codes.
//!
//! Layout: `G YYMMDD SSS C` where `G` encodes century and gender, `SSS` is a
//! serial number and `C` a mod-11 check digit.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::model::Gender;

const FIRST_WEIGHTS: [u32; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 1];
const SECOND_WEIGHTS: [u32; 10] = [3, 4, 5, 6, 7, 8, 9, 1, 2, 3];

/// Reason a personal code does not hold up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonalCodeIssue {
    Length(usize),
    NonDigit,
    CheckDigit { expected: u8, found: u8 },
    BirthDate,
    Gender,
}

impl fmt::Display for PersonalCodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonalCodeIssue::Length(len) => write!(f, "expected 11 digits, found {}", len),
            PersonalCodeIssue::NonDigit => f.write_str("contains non-digit characters"),
            PersonalCodeIssue::CheckDigit { expected, found } => {
                write!(f, "check digit {} does not match computed {}", found, expected)
            }
            PersonalCodeIssue::BirthDate => f.write_str("does not encode the birth date"),
            PersonalCodeIssue::Gender => f.write_str("does not encode the gender"),
        }
    }
}

/// Build a personal code. Returns `None` outside the 1800..2199 range or for serials above 999.
pub fn personal_code(birth_date: NaiveDate, gender: Gender, serial: u16) -> Option<String> {
    if serial > 999 {
        return None;
    }
    let lead = century_digit(birth_date.year(), gender)?;
    let body = format!(
        "{}{:02}{:02}{:02}{:03}",
        lead,
        birth_date.year() % 100,
        birth_date.month(),
        birth_date.day(),
        serial
    );
    let digits = body
        .bytes()
        .map(|byte| u32::from(byte - b'0'))
        .collect::<Vec<_>>();
    Some(format!("{}{}", body, check_digit(&digits)))
}

/// Mod-11 check digit over the first ten digits.
pub fn check_digit(digits: &[u32]) -> u8 {
    let weighted = |weights: &[u32; 10]| -> u32 {
        digits
            .iter()
            .zip(weights.iter())
            .map(|(digit, weight)| digit * weight)
            .sum::<u32>()
            % 11
    };

    let first = weighted(&FIRST_WEIGHTS);
    if first < 10 {
        return first as u8;
    }
    let second = weighted(&SECOND_WEIGHTS);
    if second < 10 { second as u8 } else { 0 }
}

/// Check structure, check digit and consistency with the holder's birth date and gender.
pub fn validate_personal_code(
    code: &str,
    birth_date: NaiveDate,
    gender: Gender,
) -> Result<(), PersonalCodeIssue> {
    let length = code.chars().count();
    if length != 11 {
        return Err(PersonalCodeIssue::Length(length));
    }
    if !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(PersonalCodeIssue::NonDigit);
    }

    let digits = code
        .bytes()
        .map(|byte| u32::from(byte - b'0'))
        .collect::<Vec<_>>();
    let expected = check_digit(&digits[..10]);
    let found = digits[10] as u8;
    if expected != found {
        return Err(PersonalCodeIssue::CheckDigit { expected, found });
    }

    let lead = digits[0];
    let expected_gender = if lead % 2 == 1 {
        Gender::Male
    } else {
        Gender::Female
    };
    let century_start = match lead {
        1 | 2 => 1800,
        3 | 4 => 1900,
        5 | 6 => 2000,
        7 | 8 => 2100,
        _ => return Err(PersonalCodeIssue::BirthDate),
    };

    let year = century_start + (digits[1] * 10 + digits[2]) as i32;
    let month = digits[3] * 10 + digits[4];
    let day = digits[5] * 10 + digits[6];
    if NaiveDate::from_ymd_opt(year, month, day) != Some(birth_date) {
        return Err(PersonalCodeIssue::BirthDate);
    }
    if expected_gender != gender {
        return Err(PersonalCodeIssue::Gender);
    }
    Ok(())
}

fn century_digit(year: i32, gender: Gender) -> Option<u8> {
    let base = match year {
        1800..=1899 => 1,
        1900..=1999 => 3,
        2000..=2099 => 5,
        2100..=2199 => 7,
        _ => return None,
    };
    Some(match gender {
        Gender::Male => base,
        Gender::Female => base + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn known_code_round_trips() {
        // 37605030299 is the commonly published sample code.
        let code = personal_code(date(1976, 5, 3), Gender::Male, 29).expect("code");
        assert_eq!(code, "37605030299");
        validate_personal_code(&code, date(1976, 5, 3), Gender::Male).expect("valid");
    }

    #[test]
    fn detects_inconsistencies() {
        let code = personal_code(date(2004, 2, 29), Gender::Female, 512).expect("code");
        assert!(code.starts_with("6040229512"));
        assert_eq!(
            validate_personal_code(&code, date(2004, 3, 1), Gender::Female),
            Err(PersonalCodeIssue::BirthDate)
        );
        assert_eq!(
            validate_personal_code(&code, date(2004, 2, 29), Gender::Male),
            Err(PersonalCodeIssue::Gender)
        );
        assert_eq!(
            validate_personal_code("1234", date(2004, 2, 29), Gender::Female),
            Err(PersonalCodeIssue::Length(4))
        );
    }

    #[test]
    fn rejects_bad_check_digit() {
        let issue = validate_personal_code("37605030290", date(1976, 5, 3), Gender::Male)
            .expect_err("bad check digit");
        assert!(matches!(issue, PersonalCodeIssue::CheckDigit { expected: 9, found: 0 }));
    }
}
