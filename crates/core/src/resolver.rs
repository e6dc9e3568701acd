use crate::domain::RequirementField;
use crate::flows::Progress;
use crate::session::SessionState;

/// Computes unmet fields from a session's schema copy and its values.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldResolver;

impl FieldResolver {
    pub fn unmet_mandatory<'a>(&self, session: &'a SessionState) -> Vec<&'a RequirementField> {
        session
            .fields()
            .iter()
            .filter(|field| field.mandatory && !session.is_satisfied(&field.name))
            .collect()
    }

    /// Mandatory fields lacking a value plus optional fields neither answered nor skipped.
    pub fn unmet<'a>(&self, session: &'a SessionState) -> Vec<&'a RequirementField> {
        session.fields().iter().filter(|field| is_open(session, field)).collect()
    }

    /// First open mandatory field in declared order, then the first open optional one.
    pub fn next_field<'a>(&self, session: &'a SessionState) -> Option<&'a RequirementField> {
        let mut first_optional = None;
        for field in session.fields().iter().filter(|field| is_open(session, field)) {
            if field.mandatory {
                return Some(field);
            }
            if first_optional.is_none() {
                first_optional = Some(field);
            }
        }
        first_optional
    }

    pub fn progress(&self, session: &SessionState) -> Progress {
        let mut progress = Progress::default();
        for field in session.fields() {
            let satisfied = session.is_satisfied(&field.name);
            if field.mandatory {
                progress.mandatory_total += 1;
                progress.mandatory_satisfied += usize::from(satisfied);
            } else {
                progress.optional_total += 1;
                progress.optional_satisfied += usize::from(satisfied);
                progress.optional_skipped += usize::from(session.is_skipped(&field.name));
            }
        }
        progress.all_mandatory_complete = progress.mandatory_satisfied == progress.mandatory_total;
        progress
    }
}

fn is_open(session: &SessionState, field: &RequirementField) -> bool {
    !session.is_satisfied(&field.name) && (field.mandatory || !session.is_skipped(&field.name))
}

#[cfg(test)]
mod tests {
    use super::FieldResolver;
    use crate::domain::{FieldValue, RequirementField};
    use crate::session::SessionState;

    fn field(name: &str, mandatory: bool) -> RequirementField {
        RequirementField {
            name: name.to_string(),
            mandatory,
            description: String::new(),
            example: String::new(),
        }
    }

    fn session() -> SessionState {
        let mut session = SessionState::new();
        session.fields = vec![
            field("segmentation", false),
            field("default_definition", true),
            field("observation_period", true),
            field("low_default_portfolio_flag", false),
        ];
        session
    }

    #[test]
    fn mandatory_fields_are_asked_before_optional_ones() {
        let session = session();
        let next = FieldResolver.next_field(&session).map(|field| field.name.as_str());
        assert_eq!(next, Some("default_definition"));
    }

    #[test]
    fn optional_fields_follow_in_declared_order() {
        let mut session = session();
        session.upsert_value(FieldValue::user_stated("default_definition", "90 DPD", 1));
        session.upsert_value(FieldValue::user_stated("observation_period", "5 years", 2));
        assert_eq!(
            FieldResolver.next_field(&session).map(|field| field.name.as_str()),
            Some("segmentation")
        );

        session.skipped.insert("segmentation".to_string());
        assert_eq!(
            FieldResolver.next_field(&session).map(|field| field.name.as_str()),
            Some("low_default_portfolio_flag")
        );

        session.skipped.insert("low_default_portfolio_flag".to_string());
        assert!(FieldResolver.next_field(&session).is_none());
        assert!(FieldResolver.unmet(&session).is_empty());
    }

    #[test]
    fn progress_counts_mandatory_and_optional_fields() {
        let mut session = session();
        session.upsert_value(FieldValue::user_stated("default_definition", "90 DPD", 1));
        session.skipped.insert("segmentation".to_string());

        let progress = FieldResolver.progress(&session);
        assert_eq!(progress.mandatory_total, 2);
        assert_eq!(progress.mandatory_satisfied, 1);
        assert_eq!(progress.optional_total, 2);
        assert_eq!(progress.optional_skipped, 1);
        assert!(!progress.all_mandatory_complete);

        let unmet: Vec<&str> = FieldResolver
            .unmet_mandatory(&session)
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(unmet, vec!["observation_period"]);
    }
}
