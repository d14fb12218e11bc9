//! Client-side search over contact display fields

use crate::models::{ContactField, ContactRecord};

/// Check whether a record matches a search term.
///
/// Case-insensitive substring match against first name, last name, and the
/// derived full name. An empty or whitespace-only term matches everything.
#[must_use]
pub fn matches(record: &ContactRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }

    record
        .fields
        .get(ContactField::FirstName)
        .map(str::to_lowercase)
        .into_iter()
        .chain(record.fields.get(ContactField::LastName).map(str::to_lowercase))
        .chain(std::iter::once(record.fields.full_name().to_lowercase()))
        .any(|candidate| candidate.contains(&term))
}

/// Filter a record slice down to the entries matching `term`
#[must_use]
pub fn filter<'a>(records: &'a [ContactRecord], term: &str) -> Vec<&'a ContactRecord> {
    records.iter().filter(|r| matches(r, term)).collect()
}
