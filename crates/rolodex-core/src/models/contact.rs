//! Contact field schema

use serde::{Deserialize, Serialize};

/// Named contact attributes, in fixed display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    MobilePhone,
    HomePhone,
    Title,
    Email,
    Department,
}

impl ContactField {
    /// Every field, in display order.
    pub const ALL: [Self; 7] = [
        Self::FirstName,
        Self::LastName,
        Self::MobilePhone,
        Self::HomePhone,
        Self::Title,
        Self::Email,
        Self::Department,
    ];

    /// Human-readable label for the field
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::MobilePhone => "Mobile Phone",
            Self::HomePhone => "Home Phone",
            Self::Title => "Job Title",
            Self::Email => "Email Address",
            Self::Department => "Department",
        }
    }
}

/// Attribute values of a contact record.
///
/// The schema is fixed; every value is optional. Field access goes through
/// [`ContactField`] so callers never reach into untyped maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl ContactFields {
    /// Create an empty field set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, mostly for constructing records in one expression
    #[must_use]
    pub fn with(mut self, field: ContactField, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Typed accessor for a single field
    #[must_use]
    pub fn get(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::FirstName => self.first_name.as_deref(),
            ContactField::LastName => self.last_name.as_deref(),
            ContactField::MobilePhone => self.mobile_phone.as_deref(),
            ContactField::HomePhone => self.home_phone.as_deref(),
            ContactField::Title => self.title.as_deref(),
            ContactField::Email => self.email.as_deref(),
            ContactField::Department => self.department.as_deref(),
        }
    }

    /// Set or clear a single field
    pub fn set(&mut self, field: ContactField, value: Option<String>) {
        let slot = match field {
            ContactField::FirstName => &mut self.first_name,
            ContactField::LastName => &mut self.last_name,
            ContactField::MobilePhone => &mut self.mobile_phone,
            ContactField::HomePhone => &mut self.home_phone,
            ContactField::Title => &mut self.title,
            ContactField::Email => &mut self.email,
            ContactField::Department => &mut self.department,
        };
        *slot = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    }

    /// Iterate all fields with their values, in display order
    pub fn iter(&self) -> impl Iterator<Item = (ContactField, Option<&str>)> {
        ContactField::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Derived full name: present name parts joined by a space
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut name = String::new();
        for part in [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
        {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(part);
        }
        name
    }

    /// Check whether every field is unset
    #[must_use]
    pub fn is_empty(&self) -> bool {
        ContactField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}
