//! Directory entries (contacts) and their request types.
//!
//! A contact may carry a Telegram user ID. The first Telegram login with a
//! matching ID links the new account to this entry.

use chrono::{DateTime, Utc};
use rim_core::{ContactId, GroupId, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::group::Group;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const ALLERGIES_MAX_CHARS: usize = 255;

/// Whether the person can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    #[serde(rename = "есть машина")]
    HasCar,
    #[serde(rename = "есть права")]
    HasLicense,
    #[serde(rename = "нет ничего")]
    Nothing,
}

impl Transport {
    const ALL: [Self; 3] = [Self::HasCar, Self::HasLicense, Self::Nothing];

    /// Returns the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasCar => "есть машина",
            Self::HasLicense => "есть права",
            Self::Nothing => "нет ничего",
        }
    }
}

/// Which kind of printer the person has access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Printer {
    #[serde(rename = "цветной")]
    Color,
    #[serde(rename = "обычный")]
    Plain,
    #[serde(rename = "нет")]
    None,
}

impl Printer {
    const ALL: [Self; 3] = [Self::Color, Self::Plain, Self::None];

    /// Returns the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "цветной",
            Self::Plain => "обычный",
            Self::None => "нет",
        }
    }
}

/// Error for a string that is not one of an enum's allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Transport {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "transport",
                value: s.to_string(),
            })
    }
}

impl FromStr for Printer {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "printer",
                value: s.to_string(),
            })
    }
}

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<Printer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vk: Option<String>,
    /// Telegram username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    /// Numeric Telegram user ID used to link accounts at first login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
    #[serde(default)]
    pub groups: Vec<Group>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Returns true if the contact belongs to a group with exactly this name.
    #[must_use]
    pub fn is_member_of(&self, group_name: &str) -> bool {
        self.groups.iter().any(|g| g.name == group_name)
    }

    /// Returns true if the contact belongs to the given group.
    #[must_use]
    pub fn has_group(&self, group_id: GroupId) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    /// Returns the IDs of the contact's groups.
    #[must_use]
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id).collect()
    }
}

/// Request to create a contact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub printer: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub vk: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<i64>,
    #[serde(default)]
    pub group_ids: Vec<GroupId>,
}

impl NewContact {
    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        check_phone(&mut errors, &self.phone);
        check_email(&mut errors, &self.email);
        check_optional_fields(
            &mut errors,
            OptionalFields {
                transport: self.transport.as_deref(),
                printer: self.printer.as_deref(),
                allergies: self.allergies.as_deref(),
                vk: self.vk.as_deref(),
                telegram: self.telegram.as_deref(),
                telegram_id: self.telegram_id,
            },
        );
        errors.into_result()
    }
}

/// Partial update of a contact. Absent fields are left unchanged, an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub printer: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub vk: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<i64>,
    /// Replaces the full group list when present.
    #[serde(default)]
    pub group_ids: Option<Vec<GroupId>>,
}

impl ContactChanges {
    /// Checks every supplied field and reports all problems at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(phone) = &self.phone {
            check_phone(&mut errors, phone);
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        check_optional_fields(
            &mut errors,
            OptionalFields {
                transport: self.transport.as_deref(),
                printer: self.printer.as_deref(),
                allergies: self.allergies.as_deref(),
                vk: self.vk.as_deref(),
                telegram: self.telegram.as_deref(),
                telegram_id: self.telegram_id,
            },
        );
        errors.into_result()
    }

    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.transport.is_none()
            && self.printer.is_none()
            && self.allergies.is_none()
            && self.vk.is_none()
            && self.telegram.is_none()
            && self.telegram_id.is_none()
            && self.group_ids.is_none()
    }
}

struct OptionalFields<'a> {
    transport: Option<&'a str>,
    printer: Option<&'a str>,
    allergies: Option<&'a str>,
    vk: Option<&'a str>,
    telegram: Option<&'a str>,
    telegram_id: Option<i64>,
}

fn check_optional_fields(errors: &mut ValidationErrors, fields: OptionalFields<'_>) {
    if let Some(value) = non_empty(fields.transport) {
        if value.parse::<Transport>().is_err() {
            errors.push(
                "transport",
                "must be one of 'есть машина', 'есть права', 'нет ничего'",
            );
        }
    }
    if let Some(value) = non_empty(fields.printer) {
        if value.parse::<Printer>().is_err() {
            errors.push("printer", "must be one of 'цветной', 'обычный', 'нет'");
        }
    }
    if let Some(value) = non_empty(fields.allergies) {
        if value.chars().count() > ALLERGIES_MAX_CHARS {
            errors.push(
                "allergies",
                format!("must be at most {ALLERGIES_MAX_CHARS} characters"),
            );
        }
    }
    if let Some(value) = non_empty(fields.vk) {
        if !is_http_url(value) {
            errors.push("vk", "must be a valid URL");
        }
    }
    if let Some(value) = non_empty(fields.telegram) {
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push("telegram", "must contain only letters and digits");
        }
    }
    if fields.telegram_id.is_some_and(|id| id <= 0) {
        errors.push("telegram_id", "must be a positive number");
    }
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    let len = name.trim().chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        errors.push(
            "name",
            format!("must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
        );
    }
}

fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    if !is_e164(phone.trim()) {
        errors.push("phone", "must be in E.164 format, e.g. +79991234567");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_email(email.trim()) {
        errors.push("email", "must be a valid email address");
    }
}

/// Treats an empty or blank optional string as absent.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `+`, an optional non-zero country digit, then 7 to 14 digits.
fn is_e164(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let len = digits.len();
    (7..=14).contains(&len) || ((8..=15).contains(&len) && !digits.starts_with('0'))
}

fn is_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.contains('@') || domain.len() < 3 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_contact() -> NewContact {
        NewContact {
            name: "Иван Петров".to_string(),
            phone: "+79991234567".to_string(),
            email: "ivan@example.com".to_string(),
            ..NewContact::default()
        }
    }

    #[test]
    fn minimal_contact_is_valid() {
        assert!(valid_contact().validate().is_ok());
    }

    #[test]
    fn collects_every_invalid_field() {
        let contact = NewContact {
            name: "И".to_string(),
            phone: "89991234567".to_string(),
            email: "not-an-email".to_string(),
            transport: Some("велосипед".to_string()),
            printer: Some("лазерный".to_string()),
            vk: Some("vk.com/ivan".to_string()),
            telegram: Some("ivan_petrov".to_string()),
            telegram_id: Some(-5),
            ..NewContact::default()
        };
        let errors = contact.validate().expect_err("should be invalid");
        for field in [
            "name",
            "phone",
            "email",
            "transport",
            "printer",
            "vk",
            "telegram",
            "telegram_id",
        ] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
    }

    #[test]
    fn empty_optional_fields_are_skipped() {
        let contact = NewContact {
            transport: Some(String::new()),
            printer: Some("  ".to_string()),
            vk: Some(String::new()),
            ..valid_contact()
        };
        assert!(contact.validate().is_ok());
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        let contact = NewContact {
            name: "Я".repeat(100),
            ..valid_contact()
        };
        assert!(contact.validate().is_ok());

        let contact = NewContact {
            name: "Я".repeat(101),
            ..valid_contact()
        };
        assert!(contact.validate().is_err());
    }

    #[test]
    fn allergies_limit() {
        let contact = NewContact {
            allergies: Some("а".repeat(256)),
            ..valid_contact()
        };
        let errors = contact.validate().expect_err("too long");
        assert!(errors.has_field("allergies"));
    }

    #[test]
    fn e164_phone_numbers() {
        assert!(is_e164("+79991234567"));
        assert!(is_e164("+12025550123"));
        assert!(!is_e164("79991234567"));
        assert!(!is_e164("+7 999 123 45 67"));
        assert!(!is_e164("+123"));
        assert!(!is_e164("+1234567890123456"));
    }

    #[test]
    fn email_addresses() {
        assert!(is_email("ivan@example.com"));
        assert!(is_email("first.last+tag@mail.example.ru"));
        assert!(!is_email("ivan@"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("ivan@localhost"));
        assert!(!is_email("ivan @example.com"));
    }

    #[test]
    fn transport_and_printer_parse_stored_strings() {
        assert_eq!("есть права".parse::<Transport>(), Ok(Transport::HasLicense));
        assert_eq!("нет".parse::<Printer>(), Ok(Printer::None));
        assert!("none".parse::<Printer>().is_err());
    }

    #[test]
    fn transport_serializes_with_russian_name() {
        let json = serde_json::to_string(&Transport::HasCar).expect("serialize");
        assert_eq!(json, "\"есть машина\"");
    }

    #[test]
    fn changes_validate_only_supplied_fields() {
        let changes = ContactChanges {
            phone: Some("+79990000000".to_string()),
            ..ContactChanges::default()
        };
        assert!(changes.validate().is_ok());
        assert!(!changes.is_empty());
        assert!(ContactChanges::default().is_empty());

        let changes = ContactChanges {
            name: Some(" ".to_string()),
            ..ContactChanges::default()
        };
        assert!(changes.validate().expect_err("blank name").has_field("name"));
    }
}
