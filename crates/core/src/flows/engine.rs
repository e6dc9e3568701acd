use std::sync::Arc;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::compiler::{Contract, ContractCompiler, Draft};
use crate::domain::{FieldValue, HeaderDimension, RequirementField, ValueSource};
use crate::errors::EngineError;
use crate::flows::states::{
    AnswerOutcome, NoteOutcome, Progress, ResolutionStep, SelectionOutcome, SessionStatus,
    TurnKind,
};
use crate::registry::{SchemaKey, SchemaRegistry};
use crate::resolver::FieldResolver;
use crate::session::SessionState;

const ACTOR: &str = "resolution-engine";

/// Drives one or many sessions against a shared, read-only registry.
///
/// The engine holds no per-session state. Every operation takes the session
/// aggregate explicitly, runs to completion and returns; "awaiting an answer"
/// is just a status value the caller observes before invoking the engine again.
#[derive(Clone)]
pub struct ResolutionEngine {
    registry: Arc<SchemaRegistry>,
    sink: Arc<dyn AuditSink>,
    resolver: FieldResolver,
    compiler: ContractCompiler,
}

impl ResolutionEngine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self::with_sink(registry, Arc::new(TracingAuditSink))
    }

    pub fn with_sink(registry: Arc<SchemaRegistry>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            registry,
            sink,
            resolver: FieldResolver,
            compiler: ContractCompiler::default(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn start_session(&self) -> SessionState {
        let session = SessionState::new();
        tracing::debug!(
            event_name = "session.started",
            session_id = %session.id(),
            "resolution session started"
        );
        session
    }

    /// Records one header dimension. Resolution starts once all three are set.
    pub fn select(
        &self,
        session: &mut SessionState,
        dimension: HeaderDimension,
        value: &str,
    ) -> Result<SelectionOutcome, EngineError> {
        self.ensure_status(session, "select_header", &[SessionStatus::CollectingHeader])?;

        let result = match dimension {
            HeaderDimension::ModelType => session.header_draft.select_model_type(value).map(|_| ()),
            HeaderDimension::Portfolio => session.header_draft.select_portfolio(value).map(|_| ()),
            HeaderDimension::Purpose => session.header_draft.select_purpose(value).map(|_| ()),
        };
        if let Err(error) = result {
            self.reject(session, "session.selection_rejected", AuditCategory::Header, &error);
            return Err(error);
        }

        let missing = session.header_draft.missing();
        if !missing.is_empty() {
            return Ok(SelectionOutcome::Incomplete { missing });
        }
        self.resolve_header(session).map(SelectionOutcome::Resolved)
    }

    pub fn select_header(
        &self,
        session: &mut SessionState,
        model_type: &str,
        portfolio: &str,
        purpose: &str,
    ) -> Result<ResolutionStep, EngineError> {
        self.select(session, HeaderDimension::ModelType, model_type)?;
        self.select(session, HeaderDimension::Portfolio, portfolio)?;
        match self.select(session, HeaderDimension::Purpose, purpose)? {
            SelectionOutcome::Resolved(step) => Ok(step),
            SelectionOutcome::Incomplete { .. } => Err(EngineError::InvalidState {
                operation: "select_header",
                status: session.status(),
            }),
        }
    }

    /// The field the driver should render next. `None` unless awaiting an answer.
    pub fn pending_question<'a>(&self, session: &'a SessionState) -> Option<&'a RequirementField> {
        if session.status() != SessionStatus::AwaitingAnswer {
            return None;
        }
        session.pending_field_name().and_then(|name| session.field(name))
    }

    pub fn submit_answer(
        &self,
        session: &mut SessionState,
        field_name: &str,
        raw_text: &str,
    ) -> Result<AnswerOutcome, EngineError> {
        let field = self.ensure_pending(session, field_name)?;
        self.commit(session, field, raw_text.trim(), ValueSource::UserStated)
    }

    /// Commits the field's schema example as its value, tagged as a default.
    pub fn accept_example(
        &self,
        session: &mut SessionState,
        field_name: &str,
    ) -> Result<AnswerOutcome, EngineError> {
        let field = self.ensure_pending(session, field_name)?;
        let example = field.example.trim().to_string();
        self.commit(session, field, &example, ValueSource::Default)
    }

    pub fn skip_optional(
        &self,
        session: &mut SessionState,
        field_name: &str,
    ) -> Result<AnswerOutcome, EngineError> {
        if session.status().is_closed() {
            return Err(EngineError::SessionClosed { status: session.status() });
        }
        // Mandatory fields are refused regardless of which field is pending.
        if session.field(field_name).is_some_and(|field| field.mandatory) {
            let error = EngineError::CannotSkipMandatory { field: field_name.to_string() };
            session.record_turn(TurnKind::Rejected, Some(field_name), error.to_string());
            self.reject(session, "session.skip_rejected", AuditCategory::Interview, &error);
            return Err(error);
        }

        let field = self.ensure_pending(session, field_name)?;
        session.skipped.insert(field.name.clone());
        let turn = session.record_turn(TurnKind::Skipped, Some(&field.name), "skipped");
        self.emit(
            session,
            "session.field_skipped",
            AuditCategory::Interview,
            &[("field", field.name.as_str())],
        );
        let next = self.resolve(session);
        Ok(AnswerOutcome::Skipped { field: field.name, turn, next })
    }

    /// Replaces the value of a field that was already satisfied.
    pub fn revise_answer(
        &self,
        session: &mut SessionState,
        field_name: &str,
        raw_text: &str,
    ) -> Result<AnswerOutcome, EngineError> {
        self.ensure_status(
            session,
            "revise_answer",
            &[SessionStatus::AwaitingAnswer, SessionStatus::Ready],
        )?;
        if session.field(field_name).is_none() {
            let error = EngineError::UnknownField {
                field: field_name.to_string(),
                schema_key: schema_key_label(session.schema_key()),
            };
            return Err(self.rejected_turn(session, field_name, error));
        }
        if !session.is_satisfied(field_name) {
            let error = EngineError::OutOfOrderAnswer {
                expected: session.pending_field_name().map(str::to_string),
                received: field_name.to_string(),
            };
            return Err(self.rejected_turn(session, field_name, error));
        }

        let value = raw_text.trim();
        if value.is_empty() {
            let turn = session.record_turn(TurnKind::EmptyAnswer, Some(field_name), raw_text);
            return Ok(AnswerOutcome::NeedsValue { field: field_name.to_string(), turn });
        }

        let turn = session.next_turn_index();
        let previous = session
            .upsert_value(FieldValue::user_stated(field_name, value, turn))
            .map(|previous| previous.value)
            .unwrap_or_default();
        session.record_turn(
            TurnKind::Revised,
            Some(field_name),
            format!("{previous} -> {value}"),
        );
        tracing::warn!(
            event_name = "session.field_revised",
            session_id = %session.id(),
            field = field_name,
            turn,
            "satisfied field value replaced"
        );
        self.emit(
            session,
            "session.field_revised",
            AuditCategory::Interview,
            &[("field", field_name), ("previous", previous.as_str())],
        );

        Ok(AnswerOutcome::Revised { field: field_name.to_string(), previous, turn })
    }

    pub fn append_note(
        &self,
        session: &mut SessionState,
        text: &str,
    ) -> Result<NoteOutcome, EngineError> {
        if session.status().is_closed() {
            return Err(EngineError::SessionClosed { status: session.status() });
        }

        let note = text.trim();
        if note.is_empty() {
            return Ok(NoteOutcome::Empty);
        }
        session.notes.push(note.to_string());
        let turn = session.record_turn(TurnKind::Note, None, note);
        self.emit(session, "session.note_appended", AuditCategory::Interview, &[]);
        Ok(NoteOutcome::Appended { turn })
    }

    pub fn abandon(&self, session: &mut SessionState) -> Result<(), EngineError> {
        if session.status().is_closed() {
            return Err(EngineError::SessionClosed { status: session.status() });
        }

        let from = format!("{:?}", session.status());
        session.status = SessionStatus::Abandoned;
        session.pending = None;
        session.record_turn(TurnKind::Abandoned, None, format!("abandoned from {from}"));
        self.emit(
            session,
            "session.abandoned",
            AuditCategory::Interview,
            &[("from", from.as_str())],
        );
        Ok(())
    }

    pub fn progress(&self, session: &SessionState) -> Progress {
        self.resolver.progress(session)
    }

    pub fn unmet_mandatory<'a>(&self, session: &'a SessionState) -> Vec<&'a RequirementField> {
        self.resolver.unmet_mandatory(session)
    }

    pub fn preview(&self, session: &SessionState) -> Result<Contract, EngineError> {
        self.compiler.preview(session)
    }

    pub fn draft(&self, session: &SessionState) -> Draft {
        self.compiler.draft(session)
    }

    pub fn compile(&self, session: &mut SessionState) -> Result<Contract, EngineError> {
        match self.compiler.compile(session) {
            Ok(contract) => {
                let spec_count = contract.user_specs.len().to_string();
                self.emit(
                    session,
                    "contract.compiled",
                    AuditCategory::Compilation,
                    &[("user_specs", spec_count.as_str())],
                );
                Ok(contract)
            }
            Err(error) => {
                self.reject(
                    session,
                    "contract.compile_rejected",
                    AuditCategory::Compilation,
                    &error,
                );
                Err(error)
            }
        }
    }

    fn resolve_header(&self, session: &mut SessionState) -> Result<ResolutionStep, EngineError> {
        let Some(header) = session.header_draft.complete() else {
            return Err(EngineError::InvalidState {
                operation: "resolve_header",
                status: session.status(),
            });
        };

        let schema = match self.registry.lookup(header.model_type, header.purpose) {
            Ok(schema) => schema,
            Err(error) => {
                tracing::error!(
                    event_name = "session.schema_missing",
                    session_id = %session.id(),
                    error = %error,
                    "requirement schema lookup failed"
                );
                self.reject(session, "session.schema_missing", AuditCategory::System, &error);
                return Err(error);
            }
        };

        session.header = Some(header);
        session.schema_key = Some(schema.key().clone());
        session.fields = schema.fields().to_vec();
        session.status = SessionStatus::Resolving;
        session.record_turn(TurnKind::HeaderSelected, None, schema.key().to_string());
        self.emit(
            session,
            "session.header_resolved",
            AuditCategory::Header,
            &[("schema_key", schema.key().as_str())],
        );

        Ok(self.resolve(session))
    }

    fn resolve(&self, session: &mut SessionState) -> ResolutionStep {
        session.status = SessionStatus::Resolving;
        let next = self.resolver.next_field(session).cloned();

        let step = match next {
            Some(field) => {
                session.status = SessionStatus::AwaitingAnswer;
                session.pending = Some(field.name.clone());
                session.record_turn(TurnKind::Asked, Some(&field.name), field.description.clone());
                ResolutionStep::Ask(field)
            }
            None => {
                session.status = SessionStatus::Ready;
                session.pending = None;
                ResolutionStep::Ready
            }
        };

        tracing::debug!(
            event_name = "session.resolved",
            session_id = %session.id(),
            status = ?session.status(),
            pending = session.pending_field_name().unwrap_or("none"),
            "resolution step computed"
        );
        step
    }

    fn commit(
        &self,
        session: &mut SessionState,
        field: RequirementField,
        value: &str,
        source: ValueSource,
    ) -> Result<AnswerOutcome, EngineError> {
        if value.is_empty() {
            let turn = session.record_turn(TurnKind::EmptyAnswer, Some(&field.name), "");
            return Ok(AnswerOutcome::NeedsValue { field: field.name, turn });
        }

        let turn = session.next_turn_index();
        let mut committed = FieldValue::user_stated(field.name.clone(), value, turn);
        committed.source = source;
        session.upsert_value(committed);
        session.record_turn(TurnKind::Accepted, Some(&field.name), value);
        let source_label = format!("{source:?}");
        self.emit(
            session,
            "session.answer_accepted",
            AuditCategory::Interview,
            &[("field", field.name.as_str()), ("source", source_label.as_str())],
        );

        let next = self.resolve(session);
        Ok(AnswerOutcome::Accepted { field: field.name, turn, next })
    }

    /// The pending field, if `field_name` names it; otherwise the answer is misrouted.
    fn ensure_pending(
        &self,
        session: &mut SessionState,
        field_name: &str,
    ) -> Result<RequirementField, EngineError> {
        if session.status().is_closed() {
            return Err(EngineError::SessionClosed { status: session.status() });
        }

        match self.pending_question(session) {
            Some(field) if field.name == field_name => Ok(field.clone()),
            pending => {
                let error = EngineError::OutOfOrderAnswer {
                    expected: pending.map(|field| field.name.clone()),
                    received: field_name.to_string(),
                };
                Err(self.rejected_turn(session, field_name, error))
            }
        }
    }

    fn ensure_status(
        &self,
        session: &SessionState,
        operation: &'static str,
        allowed: &[SessionStatus],
    ) -> Result<(), EngineError> {
        let status = session.status();
        if status.is_closed() {
            return Err(EngineError::SessionClosed { status });
        }
        if !allowed.contains(&status) {
            return Err(EngineError::InvalidState { operation, status });
        }
        Ok(())
    }

    fn rejected_turn(
        &self,
        session: &mut SessionState,
        field_name: &str,
        error: EngineError,
    ) -> EngineError {
        session.record_turn(TurnKind::Rejected, Some(field_name), error.to_string());
        self.reject(session, "session.answer_rejected", AuditCategory::Interview, &error);
        error
    }

    fn emit(
        &self,
        session: &SessionState,
        event_type: &str,
        category: AuditCategory,
        metadata: &[(&str, &str)],
    ) {
        let event = metadata.iter().fold(
            self.event(session, event_type, category, AuditOutcome::Success)
                .with_metadata("status", format!("{:?}", session.status())),
            |event, (key, value)| event.with_metadata(*key, *value),
        );
        self.sink.emit(event);
    }

    fn reject(
        &self,
        session: &SessionState,
        event_type: &str,
        category: AuditCategory,
        error: &EngineError,
    ) {
        self.sink.emit(
            self.event(session, event_type, category, AuditOutcome::Rejected)
                .with_metadata("error", error.to_string())
                .with_metadata("error_class", error.class().as_str()),
        );
    }

    fn event(
        &self,
        session: &SessionState,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            Some(session.id().clone()),
            session.id().0.clone(),
            event_type,
            category,
            ACTOR,
            outcome,
        )
    }
}

fn schema_key_label(key: Option<&SchemaKey>) -> String {
    key.map(|key| key.to_string()).unwrap_or_else(|| "<unresolved>".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::domain::{HeaderDimension, ValueSource};
    use crate::errors::EngineError;
    use crate::flows::engine::ResolutionEngine;
    use crate::flows::states::{
        AnswerOutcome, NoteOutcome, ResolutionStep, SelectionOutcome, SessionStatus, TurnKind,
    };
    use crate::registry::SchemaRegistry;

    const SOURCE: &str = r#"{
        "AIRB_PD_Requirements": {
            "default_definition": {"mandatory": true, "description": "Default trigger", "example": "90 DPD"},
            "observation_period": {"mandatory": true, "description": "Sample window", "example": "5 years"},
            "low_default_portfolio_flag": {"mandatory": false, "description": "LDP treatment", "example": "No"}
        }
    }"#;

    fn engine() -> (ResolutionEngine, InMemoryAuditSink) {
        let registry = SchemaRegistry::from_json_str(SOURCE).expect("registry");
        let sink = InMemoryAuditSink::default();
        (ResolutionEngine::with_sink(Arc::new(registry), Arc::new(sink.clone())), sink)
    }

    #[test]
    fn header_dimensions_are_collected_one_at_a_time() {
        let (engine, _) = engine();
        let mut session = engine.start_session();

        let outcome = engine
            .select(&mut session, HeaderDimension::ModelType, "PD (Probability of Default)")
            .expect("model type");
        assert!(matches!(
            outcome,
            SelectionOutcome::Incomplete { ref missing } if missing.len() == 2
        ));

        let error = engine
            .select(&mut session, HeaderDimension::Portfolio, "Sovereign")
            .expect_err("invalid portfolio");
        assert!(matches!(error, EngineError::InvalidSelection { .. }));
        assert_eq!(session.status(), SessionStatus::CollectingHeader);

        engine.select(&mut session, HeaderDimension::Portfolio, "Retail").expect("portfolio");
        let outcome =
            engine.select(&mut session, HeaderDimension::Purpose, "AIRB").expect("purpose");
        assert!(matches!(outcome, SelectionOutcome::Resolved(ResolutionStep::Ask(_))));
        assert_eq!(session.status(), SessionStatus::AwaitingAnswer);
        assert_eq!(session.schema_key().map(|key| key.as_str()), Some("AIRB_PD_Requirements"));
    }

    #[test]
    fn header_cannot_be_changed_after_resolution() {
        let (engine, _) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");

        let error = engine
            .select(&mut session, HeaderDimension::Portfolio, "Commercial")
            .expect_err("header is immutable");
        assert!(matches!(error, EngineError::InvalidState { .. }));
    }

    #[test]
    fn example_answers_are_recorded_as_defaults() {
        let (engine, _) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");

        let outcome = engine.accept_example(&mut session, "default_definition").expect("default");
        assert!(matches!(outcome, AnswerOutcome::Accepted { .. }));
        let value = session.value("default_definition").expect("value committed");
        assert_eq!(value.value, "90 DPD");
        assert_eq!(value.source, ValueSource::Default);
    }

    #[test]
    fn answers_are_trimmed_and_logged_with_turn_indices() {
        let (engine, sink) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");

        let outcome = engine
            .submit_answer(&mut session, "default_definition", "  90 DPD  ")
            .expect("answer");
        let AnswerOutcome::Accepted { turn, next, .. } = outcome else {
            panic!("expected accepted outcome");
        };
        assert_eq!(session.value("default_definition").map(|v| v.value.as_str()), Some("90 DPD"));
        assert_eq!(session.value("default_definition").map(|v| v.satisfied_at), Some(turn));
        assert!(matches!(
            next,
            ResolutionStep::Ask(ref field) if field.name == "observation_period"
        ));

        let indices: Vec<u64> = session.conversation().iter().map(|turn| turn.index).collect();
        assert!(indices.windows(2).all(|pair| pair[1] == pair[0] + 1));
        assert!(sink.events().iter().any(|event| event.event_type == "session.answer_accepted"));
    }

    #[test]
    fn revising_a_satisfied_field_keeps_status_and_logs_previous_value() {
        let (engine, sink) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");
        engine.submit_answer(&mut session, "default_definition", "90 DPD").expect("answer");

        let outcome = engine
            .revise_answer(&mut session, "default_definition", "90 DPD + materiality threshold")
            .expect("revise");
        assert!(matches!(
            outcome,
            AnswerOutcome::Revised { ref previous, .. } if previous == "90 DPD"
        ));
        assert_eq!(session.status(), SessionStatus::AwaitingAnswer);
        assert_eq!(session.pending_field_name(), Some("observation_period"));
        assert_eq!(session.conversation().last().map(|turn| turn.kind), Some(TurnKind::Revised));
        assert!(sink.events().iter().any(|event| event.event_type == "session.field_revised"));

        let error = engine
            .revise_answer(&mut session, "observation_period", "5 years")
            .expect_err("not yet satisfied");
        assert!(matches!(error, EngineError::OutOfOrderAnswer { .. }));

        let error = engine
            .revise_answer(&mut session, "segment_count", "4")
            .expect_err("unknown field");
        assert!(matches!(error, EngineError::UnknownField { .. }));
    }

    #[test]
    fn notes_are_accepted_until_finalized() {
        let (engine, _) = engine();
        let mut session = engine.start_session();
        assert_eq!(
            engine.append_note(&mut session, "  ").expect("empty note is not an error"),
            NoteOutcome::Empty
        );
        assert!(matches!(
            engine.append_note(&mut session, "portfolio excludes staff loans"),
            Ok(NoteOutcome::Appended { .. })
        ));
        assert_eq!(session.notes().len(), 1);
    }

    #[test]
    fn abandon_closes_the_session() {
        let (engine, sink) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");
        engine.abandon(&mut session).expect("abandon");

        assert_eq!(session.status(), SessionStatus::Abandoned);
        assert!(engine.pending_question(&session).is_none());
        assert!(matches!(
            engine.submit_answer(&mut session, "default_definition", "90 DPD"),
            Err(EngineError::SessionClosed { status: SessionStatus::Abandoned })
        ));
        assert!(matches!(
            engine.append_note(&mut session, "late"),
            Err(EngineError::SessionClosed { .. })
        ));
        assert!(matches!(engine.abandon(&mut session), Err(EngineError::SessionClosed { .. })));
        assert!(matches!(engine.compile(&mut session), Err(EngineError::SessionClosed { .. })));
        assert!(sink
            .events()
            .iter()
            .any(|event| event.event_type == "contract.compile_rejected"
                && event.outcome == AuditOutcome::Rejected));
    }

    #[test]
    fn mandatory_skip_is_refused_once_ready() {
        let (engine, sink) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");
        engine.submit_answer(&mut session, "default_definition", "90 DPD").expect("answer");
        engine.submit_answer(&mut session, "observation_period", "5 years").expect("answer");
        engine.skip_optional(&mut session, "low_default_portfolio_flag").expect("skip optional");
        assert_eq!(session.status(), SessionStatus::Ready);

        let error = engine
            .skip_optional(&mut session, "observation_period")
            .expect_err("mandatory fields cannot be skipped");
        assert!(matches!(
            error,
            EngineError::CannotSkipMandatory { ref field } if field == "observation_period"
        ));
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.value("observation_period").map(|v| v.value.as_str()), Some("5 years"));
        assert!(sink.events().iter().any(|event| event.event_type == "session.skip_rejected"));
    }

    #[test]
    fn compile_before_ready_is_rejected() {
        let (engine, _) = engine();
        let mut session = engine.start_session();
        engine.select_header(&mut session, "PD", "Retail", "AIRB").expect("header");

        let error = engine.compile(&mut session).expect_err("not ready");
        assert!(matches!(
            error,
            EngineError::IncompleteResolution { ref missing_fields } if missing_fields.len() == 2
        ));
        assert_eq!(session.status(), SessionStatus::AwaitingAnswer);
    }
}
