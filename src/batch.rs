use crate::activity_log::{ActivityLog, LogError};
use crate::contacts::{ContactLoader, ContactRow, ContactsError};
use crate::message::phone::validate_phone;
use crate::message::template::{MessageTemplate, TemplateError};
use crate::message::{Dispatcher, SendError};
use chrono::Local;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const CONFIRM_PROMPT: &str = "Do you want to send the messages?";

/// Set-once cancellation signal, polled between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a single run shares with whoever started it.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancelFlag,
    log: ActivityLog,
}

impl RunContext {
    /// Fresh flag plus a new activity log stamped with the current time.
    pub fn start(log_dir: &Path) -> Result<Self, LogError> {
        Ok(Self::new(ActivityLog::create(log_dir, Local::now())?))
    }

    pub fn new(log: ActivityLog) -> Self {
        Self {
            cancel: CancelFlag::default(),
            log,
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }
}

/// Where the controller reports progress and asks for consent.
///
/// Implementations own any thread marshaling; the controller calls them synchronously.
pub trait StatusSink {
    fn report(&self, text: &str);
    fn confirm(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Confirming,
    Sending(usize),
    Cancelled,
    Completed,
    Failed,
}

/// Run-fatal failures. None of them leaves a partial send behind.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Load(ContactsError),

    #[error("{0}")]
    Schema(ContactsError),

    #[error("{0}")]
    TemplateMissing(TemplateError),

    #[error("{0}")]
    TemplateRead(TemplateError),

    #[error("{0}")]
    Unexpected(String),
}

impl From<ContactsError> for RunError {
    fn from(e: ContactsError) -> Self {
        if e.is_schema() {
            RunError::Schema(e)
        } else {
            RunError::Load(e)
        }
    }
}

impl From<TemplateError> for RunError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::Missing { .. } => RunError::TemplateMissing(e),
            other => RunError::TemplateRead(other),
        }
    }
}

/// Row-local failures; logged and skipped.
#[derive(Error, Debug)]
pub enum RowError {
    #[error(transparent)]
    Render(#[from] TemplateError),

    #[error(transparent)]
    Send(#[from] SendError),
}

#[derive(Debug)]
pub enum RowOutcome {
    Sent,
    Skipped(String),
    Failed(RowError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Sent => self.sent += 1,
            RowOutcome::Skipped(_) => self.skipped += 1,
            RowOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub error: Option<RunError>,
    pub tally: Tally,
    pub log_path: PathBuf,
}

/// Walks contact rows in sheet order: validate, render, dispatch.
pub struct BatchController<L, D> {
    loader: L,
    dispatcher: D,
    template_path: PathBuf,
    state: RunState,
}

impl<L: ContactLoader, D: Dispatcher> BatchController<L, D> {
    pub fn new(loader: L, dispatcher: D, template_path: PathBuf) -> Self {
        Self {
            loader,
            dispatcher,
            template_path,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Executes one run to its final state. The log path is always part of the report.
    pub fn run(&mut self, file: Option<&Path>, ctx: &RunContext, sink: &dyn StatusSink) -> RunReport {
        let mut tally = Tally::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.drive(file, ctx, sink, &mut tally)
        }))
        .unwrap_or_else(|payload| Err(RunError::Unexpected(panic_message(payload))));

        let log = ctx.log();
        let (state, error) = match result {
            Ok(state) => (state, None),
            Err(e) => {
                match e {
                    RunError::Unexpected(_) => log.error(&format!("Unexpected error occurred: {}", e)),
                    _ => log.error(&format!("Run aborted: {}", e)),
                }
                sink.report("Error occurred during process");
                (RunState::Failed, Some(e))
            }
        };
        self.enter(state);

        log.info(&format!(
            "Run finished: {:?} (sent {}, skipped {}, failed {})",
            state, tally.sent, tally.skipped, tally.failed
        ));
        log.info("Activity log saved.");

        RunReport {
            state,
            error,
            tally,
            log_path: log.path().to_path_buf(),
        }
    }

    fn drive(
        &mut self,
        file: Option<&Path>,
        ctx: &RunContext,
        sink: &dyn StatusSink,
        tally: &mut Tally,
    ) -> Result<RunState, RunError> {
        let log = ctx.log();
        self.enter(RunState::Idle);

        let Some(path) = file else {
            sink.report("No file selected");
            log.info("No file selected");
            return Ok(RunState::Idle);
        };

        self.enter(RunState::Loading);
        log.info(&format!("Loading contacts from {}", path.display()));
        let table = self.loader.load(path)?;
        log::debug!("Columns: {:?}", table.headers());
        let contacts = table.contacts()?;
        let template = MessageTemplate::load(&self.template_path)?;
        log::debug!("Template: {:?}", template.text());
        if table.is_empty() {
            log.warning("Spreadsheet has no contact rows");
        } else {
            log.info(&format!("Loaded {} contacts", table.len()));
        }

        self.enter(RunState::Confirming);
        if !sink.confirm(CONFIRM_PROMPT) {
            sink.report("Message sending cancelled");
            log.info("User cancelled message sending");
            return Ok(RunState::Cancelled);
        }

        for (i, contact) in contacts.iter().enumerate() {
            self.enter(RunState::Sending(i));
            if ctx.cancel.is_cancelled() {
                sink.report("Process cancelled");
                log.info("Process was cancelled by user");
                return Ok(RunState::Cancelled);
            }

            let outcome = self.process_row(contact, &template, log, sink);
            match &outcome {
                RowOutcome::Sent => {}
                RowOutcome::Skipped(phone) => log::debug!("Row {} skipped: {}", i, phone),
                RowOutcome::Failed(e) => log::debug!("Row {} failed: {:?}", i, e),
            }
            tally.record(&outcome);
        }

        // A cancel that lands during the last send still wins over completion
        if ctx.cancel.is_cancelled() {
            sink.report("Process cancelled");
            log.info("Process was cancelled by user");
            return Ok(RunState::Cancelled);
        }

        sink.report("Messages sent successfully");
        Ok(RunState::Completed)
    }

    fn process_row(
        &mut self,
        contact: &ContactRow,
        template: &MessageTemplate,
        log: &ActivityLog,
        sink: &dyn StatusSink,
    ) -> RowOutcome {
        if !validate_phone(&contact.phone) {
            let text = format!("Invalid phone number: {}", contact.phone);
            sink.report(&text);
            log.warning(&text);
            return RowOutcome::Skipped(contact.phone.clone());
        }

        match self.deliver(contact, template, sink) {
            Ok(()) => {
                log.info(&format!(
                    "Successfully sent to {} ({})",
                    contact.name, contact.phone
                ));
                RowOutcome::Sent
            }
            Err(e) => {
                sink.report(&format!("Error sending to {}", contact.name));
                log.error(&format!("Failed to send to {}: {}", contact.name, e));
                RowOutcome::Failed(e)
            }
        }
    }

    fn deliver(
        &mut self,
        contact: &ContactRow,
        template: &MessageTemplate,
        sink: &dyn StatusSink,
    ) -> Result<(), RowError> {
        let message = template.render(contact)?;
        sink.report(&format!("Sending to {}...", contact.name));
        self.dispatcher.send(&contact.phone, &message)?;
        Ok(())
    }

    fn enter(&mut self, state: RunState) {
        if self.state != state {
            log::debug!("Run state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
