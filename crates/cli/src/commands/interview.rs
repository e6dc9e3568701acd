//! Line-oriented conversation driver.
//!
//! Reads one input line per turn, hands it to the engine and persists the
//! session after every turn. Lines starting with `/` are commands:
//! `/skip`, `/default`, `/note <text>`, `/revise <field> <text>`, `/quit`.
//! A saved session that stopped short of finalization can be picked up again
//! with `--resume <session-id>`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use specwright_core::config::{AppConfig, LoadOptions};
use specwright_core::errors::{ApplicationError, EngineError, ErrorClass};
use specwright_core::flows::{AnswerOutcome, NoteOutcome, ResolutionEngine, SessionStatus};
use specwright_core::registry::SchemaRegistry;
use specwright_core::session::{SessionId, SessionState};
use specwright_core::RequirementField;
use specwright_store::{
    ContractRepository, DraftRepository, FileContractRepository, FileDraftRepository,
    FileSessionRepository, SessionRepository, StoreError,
};

use super::CommandResult;

const COMMAND: &str = "interview";

#[derive(Debug, Clone, Args)]
pub struct InterviewArgs {
    #[arg(long, required_unless_present = "resume", help = "Model type: PD, LGD or EAD")]
    pub model_type: Option<String>,
    #[arg(
        long,
        required_unless_present = "resume",
        help = "Portfolio: Retail, Commercial or Wholesale"
    )]
    pub portfolio: Option<String>,
    #[arg(
        long,
        required_unless_present = "resume",
        help = "Purpose: IFRS9, AIRB or Adjudication"
    )]
    pub purpose: Option<String>,
    #[arg(
        long,
        value_name = "SESSION_ID",
        conflicts_with_all = ["model_type", "portfolio", "purpose"],
        help = "Continue a saved session instead of starting a new one"
    )]
    pub resume: Option<String>,
    #[arg(long, help = "Read answers from a file instead of stdin, one per line")]
    pub answers: Option<PathBuf>,
}

/// Where an interview leaves its artifacts.
pub struct InterviewStores {
    pub sessions: Arc<dyn SessionRepository>,
    pub contracts: Arc<dyn ContractRepository>,
    pub drafts: Option<Arc<dyn DraftRepository>>,
}

impl InterviewStores {
    pub fn from_config(config: &AppConfig) -> Self {
        let drafts = config.output.write_drafts.then(|| {
            Arc::new(FileDraftRepository::new(&config.output.dir)) as Arc<dyn DraftRepository>
        });
        Self {
            sessions: Arc::new(FileSessionRepository::new(&config.sessions.dir)),
            contracts: Arc::new(FileContractRepository::new(&config.output.dir)),
            drafts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub contract_path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Answer(&'a str),
    Skip,
    Default,
    Note(&'a str),
    Revise { field: &'a str, text: &'a str },
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Answer(line);
    };

    let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "skip" => Input::Skip,
        "default" => Input::Default,
        "note" => Input::Note(rest),
        "quit" => Input::Quit,
        "revise" => {
            let (field, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Input::Revise { field, text }
        }
        other => Input::Unknown(other),
    }
}

pub fn run(options: &LoadOptions, args: &InterviewArgs) -> CommandResult {
    match &args.answers {
        Some(path) => match File::open(path) {
            Ok(file) => run_with_io(options, args, BufReader::new(file), &mut io::stderr()),
            Err(error) => CommandResult::failure(
                COMMAND,
                ErrorClass::InputValidation.as_str(),
                format!("could not open answers file `{}`: {error}", path.display()),
                3,
            ),
        },
        None => run_with_io(options, args, io::stdin().lock(), &mut io::stderr()),
    }
}

/// Prompts go to `output`; the returned result is the machine-readable outcome.
pub fn run_with_io<R, W>(
    options: &LoadOptions,
    args: &InterviewArgs,
    input: R,
    output: &mut W,
) -> CommandResult
where
    R: BufRead,
    W: Write,
{
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &super::config_failure(error)),
    };
    let registry = match SchemaRegistry::load(&config.registry.path) {
        Ok(registry) => registry,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let engine = ResolutionEngine::new(Arc::new(registry));
    let stores = InterviewStores::from_config(&config);
    match runtime.block_on(drive(&engine, &stores, args, input, output)) {
        Ok(summary) => summary_result(&summary),
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

fn summary_result(summary: &InterviewSummary) -> CommandResult {
    match (&summary.status, &summary.contract_path) {
        (SessionStatus::Finalized, Some(path)) => CommandResult::success(
            COMMAND,
            format!(
                "session {} finalized; contract written to {}",
                summary.session_id,
                path.display()
            ),
        ),
        (status, _) => CommandResult::success(
            COMMAND,
            format!("session {} ended in {status:?}", summary.session_id),
        ),
    }
}

pub async fn drive<R, W>(
    engine: &ResolutionEngine,
    stores: &InterviewStores,
    args: &InterviewArgs,
    mut input: R,
    output: &mut W,
) -> Result<InterviewSummary, ApplicationError>
where
    R: BufRead,
    W: Write,
{
    let mut session = match &args.resume {
        Some(id) => resume_session(stores, id).await?,
        None => start_session(engine, stores, args).await?,
    };
    if let Some(header) = session.header() {
        writeln!(
            output,
            "session {}: {} / {} / {}",
            session.id(),
            header.model_type.display_name(),
            header.portfolio.display_name(),
            header.purpose.display_name()
        )
        .map_err(|error| io_failure("write prompt", error))?;
    }

    let mut line = String::new();
    while session.status() == SessionStatus::AwaitingAnswer {
        let Some(field) = engine.pending_question(&session).cloned() else {
            break;
        };
        render_question(engine, &session, &field, output)?;

        line.clear();
        let read = input.read_line(&mut line).map_err(|error| io_failure("read input", error))?;
        if read == 0 {
            let missing_fields: Vec<String> =
                engine.unmet_mandatory(&session).iter().map(|field| field.name.clone()).collect();
            // Running out of input after the last mandatory answer omits the remaining optionals.
            if missing_fields.is_empty() {
                engine.skip_optional(&mut session, &field.name)?;
                persist(stores, &session).await?;
                continue;
            }
            tracing::warn!(
                event_name = "interview.input_exhausted",
                session_id = %session.id(),
                "input ended before all mandatory fields were answered"
            );
            return Err(EngineError::IncompleteResolution { missing_fields }.into());
        }

        match handle_line(engine, &mut session, &field, &line) {
            Ok(LineEffect::Continue { accepted, reply }) => {
                if let Some(reply) = reply {
                    writeln!(output, "{reply}").map_err(|error| io_failure("write prompt", error))?;
                }
                persist(stores, &session).await?;
                if accepted {
                    save_draft(engine, stores, &session).await?;
                }
            }
            Ok(LineEffect::Quit) => {
                engine.abandon(&mut session)?;
                persist(stores, &session).await?;
                return Ok(InterviewSummary {
                    session_id: session.id().to_string(),
                    status: session.status(),
                    contract_path: None,
                });
            }
            Err(error) if error.class() == ErrorClass::Protocol => {
                writeln!(output, "! {error}").map_err(|error| io_failure("write prompt", error))?;
                persist(stores, &session).await?;
            }
            Err(error) => return Err(error.into()),
        }
    }

    // The artifact lands before the session is finalized, so a failed write
    // leaves a READY snapshot that `--resume` can finish.
    let contract = engine.preview(&session)?;
    let path = stores
        .contracts
        .write_once(session.id(), &contract, Utc::now())
        .await
        .map_err(store_failure)?;
    engine.compile(&mut session)?;
    persist(stores, &session).await?;
    writeln!(output, "contract written to {}", path.display())
        .map_err(|error| io_failure("write prompt", error))?;

    Ok(InterviewSummary {
        session_id: session.id().to_string(),
        status: session.status(),
        contract_path: Some(path),
    })
}

async fn start_session(
    engine: &ResolutionEngine,
    stores: &InterviewStores,
    args: &InterviewArgs,
) -> Result<SessionState, ApplicationError> {
    let mut session = engine.start_session();
    let selected = engine.select_header(
        &mut session,
        args.model_type.as_deref().unwrap_or_default(),
        args.portfolio.as_deref().unwrap_or_default(),
        args.purpose.as_deref().unwrap_or_default(),
    );
    persist(stores, &session).await?;
    selected?;
    Ok(session)
}

async fn resume_session(
    stores: &InterviewStores,
    id: &str,
) -> Result<SessionState, ApplicationError> {
    let id = SessionId(id.trim().to_string());
    if id.0.is_empty() || id.0.contains(|c: char| c == '/' || c == '\\') {
        return Err(store_failure(StoreError::NotFound(id.0)));
    }
    let session = stores
        .sessions
        .find_by_id(&id)
        .await
        .map_err(store_failure)?
        .ok_or_else(|| store_failure(StoreError::NotFound(id.0.clone())))?;
    if session.status().is_closed() {
        return Err(EngineError::SessionClosed { status: session.status() }.into());
    }
    tracing::info!(
        event_name = "interview.resumed",
        session_id = %session.id(),
        status = ?session.status(),
        "saved session resumed"
    );
    Ok(session)
}

enum LineEffect {
    Continue { accepted: bool, reply: Option<String> },
    Quit,
}

fn handle_line(
    engine: &ResolutionEngine,
    session: &mut SessionState,
    field: &RequirementField,
    line: &str,
) -> Result<LineEffect, EngineError> {
    let outcome = match parse_input(line) {
        Input::Quit => return Ok(LineEffect::Quit),
        Input::Answer(text) => engine.submit_answer(session, &field.name, text)?,
        Input::Default => engine.accept_example(session, &field.name)?,
        Input::Skip => engine.skip_optional(session, &field.name)?,
        Input::Revise { field: target, text } => engine.revise_answer(session, target, text)?,
        Input::Note(text) => {
            let reply = match engine.append_note(session, text)? {
                NoteOutcome::Appended { .. } => Some("noted.".to_string()),
                NoteOutcome::Empty => None,
            };
            return Ok(LineEffect::Continue { accepted: false, reply });
        }
        Input::Unknown(command) => {
            let reply = format!(
                "unknown command `/{command}` (use /skip, /default, /note, /revise, /quit)"
            );
            return Ok(LineEffect::Continue { accepted: false, reply: Some(reply) });
        }
    };

    let effect = match outcome {
        AnswerOutcome::NeedsValue { .. } => LineEffect::Continue {
            accepted: false,
            reply: Some(format!("please provide a value for `{}`.", field.name)),
        },
        AnswerOutcome::Revised { field, previous, .. } => LineEffect::Continue {
            accepted: true,
            reply: Some(format!("revised `{field}` (was: {previous}).")),
        },
        AnswerOutcome::Accepted { .. } | AnswerOutcome::Skipped { .. } => {
            LineEffect::Continue { accepted: true, reply: None }
        }
    };
    Ok(effect)
}

fn render_question<W: Write>(
    engine: &ResolutionEngine,
    session: &SessionState,
    field: &RequirementField,
    output: &mut W,
) -> Result<(), ApplicationError> {
    let progress = engine.progress(session);
    let requirement = if field.mandatory { "mandatory" } else { "optional, /skip to omit" };
    let mut text = format!(
        "[{}/{} mandatory] {} ({requirement})\n  {}",
        progress.mandatory_satisfied, progress.mandatory_total, field.name, field.description
    );
    if !field.example.trim().is_empty() {
        text.push_str(&format!("\n  e.g. {} (/default to accept)", field.example));
    }
    writeln!(output, "{text}").map_err(|error| io_failure("write prompt", error))
}

async fn persist(stores: &InterviewStores, session: &SessionState) -> Result<(), ApplicationError> {
    stores.sessions.save(session).await.map_err(store_failure)
}

async fn save_draft(
    engine: &ResolutionEngine,
    stores: &InterviewStores,
    session: &SessionState,
) -> Result<(), ApplicationError> {
    let Some(drafts) = &stores.drafts else {
        return Ok(());
    };
    drafts.save_draft(&engine.draft(session)).await.map(|_| ()).map_err(store_failure)
}

fn store_failure(error: StoreError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn io_failure(action: &str, error: io::Error) -> ApplicationError {
    ApplicationError::Persistence(format!("failed to {action}: {error}"))
}
