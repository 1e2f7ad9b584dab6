//! Input completeness classification
//!
//! `classify` is a pure, total function of which record fields are
//! present: it never fails and never touches anything outside the record.
//! The only caller error in the system - a record without a name - is
//! rejected by `validate` before classification.

use crate::types::{CompanyRecord, EngineError, Tier};

/// Reject records that cannot be resolved at all
///
/// A record whose name is empty or whitespace-only is a caller error,
/// raised before any adapter is invoked.
pub fn validate(record: &CompanyRecord) -> Result<(), EngineError> {
    if record.name.trim().is_empty() {
        return Err(EngineError::InvalidRecord(
            "company name is required".to_string(),
        ));
    }
    Ok(())
}

/// Assign the data-completeness tier for a record
///
/// Field presence is evaluated on trimmed, non-empty strings only, so
/// whitespace-only fields count as absent. Same input always yields the
/// same tier.
pub fn classify(record: &CompanyRecord) -> Tier {
    fn present(field: &Option<String>) -> bool {
        field.as_deref().map(str::trim).is_some_and(|s| !s.is_empty())
    }

    let city = present(&record.city);
    let phone = present(&record.phone);
    let context = present(&record.context);

    if city && phone {
        Tier::Full
    } else if city {
        Tier::NameCity
    } else if context {
        Tier::NameContext
    } else {
        Tier::NameOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(city: Option<&str>, phone: Option<&str>, context: Option<&str>) -> CompanyRecord {
        CompanyRecord {
            name: "Acme".to_string(),
            city: city.map(str::to_string),
            phone: phone.map(str::to_string),
            context: context.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_all_four_tiers() {
        assert_eq!(
            classify(&record(Some("Denver"), Some("3035551234"), None)),
            Tier::Full
        );
        assert_eq!(classify(&record(Some("Denver"), None, None)), Tier::NameCity);
        assert_eq!(
            classify(&record(None, None, Some("plumbing services"))),
            Tier::NameContext
        );
        assert_eq!(classify(&record(None, None, None)), Tier::NameOnly);
    }

    #[test]
    fn test_whitespace_only_fields_count_as_absent() {
        assert_eq!(
            classify(&record(Some("   "), Some("  "), Some("\t"))),
            Tier::NameOnly
        );
        assert_eq!(
            classify(&record(Some("Denver"), Some("   "), None)),
            Tier::NameCity
        );
    }

    #[test]
    fn test_context_does_not_outrank_city() {
        // City-bearing records stay in tiers 1-2 even with context present
        assert_eq!(
            classify(&record(Some("Denver"), None, Some("plumbing"))),
            Tier::NameCity
        );
        assert_eq!(
            classify(&record(Some("Denver"), Some("3035551234"), Some("plumbing"))),
            Tier::Full
        );
    }

    #[test]
    fn test_phone_without_city_falls_through() {
        // Tier 1 requires city and phone together; a phone alone does not
        // unlock the structured-phone plan
        assert_eq!(classify(&record(None, Some("3035551234"), None)), Tier::NameOnly);
        assert_eq!(
            classify(&record(None, Some("3035551234"), Some("plumbing"))),
            Tier::NameContext
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let r = record(Some("Denver"), Some("3035551234"), Some("24h plumbing"));
        let first = classify(&r);
        for _ in 0..100 {
            assert_eq!(classify(&r), first);
        }
    }

    #[test]
    fn test_validate_rejects_missing_name() {
        let mut r = CompanyRecord::named("  ");
        assert!(validate(&r).is_err());

        r.name = "Acme".to_string();
        assert!(validate(&r).is_ok());
    }
}
