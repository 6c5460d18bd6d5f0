use std::path::Path;
use std::sync::Arc;

use realtime_types::FunctionTool;
use serde_json::{Map, Value};

use crate::PatentError;
use crate::document::skeleton;
use crate::ledger::DuplicateLedger;
use crate::registry::SessionRegistry;

pub const DEFAULT_TITLE: &str = "Untitled Invention";

/// The operations the model may call, one per dispatch table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateTemplate,
    ResumePatentCreation,
    DisplayPatent,
    ExportAsPdf,
    SendUserResponse,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::CreateTemplate,
        Operation::ResumePatentCreation,
        Operation::DisplayPatent,
        Operation::ExportAsPdf,
        Operation::SendUserResponse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateTemplate => "create_template",
            Operation::ResumePatentCreation => "resume_patent_creation",
            Operation::DisplayPatent => "display_patent",
            Operation::ExportAsPdf => "export_as_pdf",
            Operation::SendUserResponse => "send_user_response",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Operations that create state are guarded by the duplicate ledger.
    /// Appends and reads are expected to repeat.
    pub fn suppresses_duplicates(self) -> bool {
        matches!(
            self,
            Operation::CreateTemplate | Operation::ResumePatentCreation
        )
    }

    /// The declaration handed to the model in the session configuration.
    pub fn tool(self) -> FunctionTool {
        match self {
            Operation::CreateTemplate => FunctionTool::new(
                self.name(),
                "Start a new patent draft with the standard sections. Call once the user names their invention.",
            )
            .with_string_param("title", "Title of the invention", false),
            Operation::ResumePatentCreation => FunctionTool::new(
                self.name(),
                "Resume the patent draft from the current session and return its text.",
            ),
            Operation::DisplayPatent => {
                FunctionTool::new(self.name(), "Return the full text of the current patent draft.")
            }
            Operation::ExportAsPdf => {
                FunctionTool::new(self.name(), "Export the current patent draft as a PDF.")
            }
            Operation::SendUserResponse => FunctionTool::new(
                self.name(),
                "Append drafted text built from the user's answer to the patent document.",
            )
            .with_string_param("message", "Text to add to the draft", true),
        }
    }
}

/// Result payload of a function call: `success` and `message` always, plus
/// operation specific fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutput {
    success: bool,
    message: String,
    fields: Map<String, Value>,
}

impl FunctionOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn into_value(self) -> Value {
        let mut object = self.fields;
        object.insert("success".to_string(), Value::Bool(self.success));
        object.insert("message".to_string(), Value::String(self.message));
        Value::Object(object)
    }
}

impl From<PatentError> for FunctionOutput {
    fn from(err: PatentError) -> Self {
        FunctionOutput::failure(err.to_string())
    }
}

/// Runs function calls against the active session.
pub struct FunctionExecutor {
    registry: Arc<SessionRegistry>,
    ledger: Arc<DuplicateLedger>,
}

impl FunctionExecutor {
    pub fn new(registry: Arc<SessionRegistry>, ledger: Arc<DuplicateLedger>) -> Self {
        Self { registry, ledger }
    }

    /// Executes `name` with its JSON-encoded `arguments`.
    ///
    /// Only an unknown name is an `Err`; every operation outcome, failures
    /// included, comes back as a [`FunctionOutput`].
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<FunctionOutput, PatentError> {
        let operation = Operation::from_name(name)
            .ok_or_else(|| PatentError::UnknownOperation(name.to_string()))?;

        if operation.suppresses_duplicates() {
            let key = format!("{name}:{arguments}");
            if self.ledger.check_and_record(&key) {
                tracing::debug!("suppressed duplicate {}", key);
                return Ok(PatentError::DuplicateSuppressed.into());
            }
        }

        let args = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return Ok(e.into()),
        };

        let result = match operation {
            Operation::CreateTemplate => self.create_template(&args).await,
            Operation::ResumePatentCreation => self.resume_patent_creation().await,
            Operation::DisplayPatent => self.display_patent().await,
            Operation::ExportAsPdf => self.export_as_pdf(),
            Operation::SendUserResponse => self.send_user_response(&args).await,
        };

        Ok(result.unwrap_or_else(|e| {
            tracing::warn!("{} failed: {}", name, e);
            e.into()
        }))
    }

    async fn create_template(&self, args: &Map<String, Value>) -> Result<FunctionOutput, PatentError> {
        let title = args
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);

        // Once start_new returns, the new session is active; the freshly
        // written skeleton is reported without a second read.
        let session = self.registry.start_new(title).await?;
        Ok(FunctionOutput::ok(format!("Created a new patent draft titled '{title}'."))
            .with("session_id", session.id())
            .with("title", session.title())
            .with("path", session.document().location())
            .with("content", skeleton(session.title())))
    }

    async fn resume_patent_creation(&self) -> Result<FunctionOutput, PatentError> {
        let session = self.registry.current().ok_or(PatentError::NoActiveSession)?;
        let content = self.registry.store().read(session.id()).await?;
        Ok(FunctionOutput::ok(format!("Resuming the patent draft '{}'.", session.title()))
            .with("session_id", session.id())
            .with("title", session.title())
            .with("content", content))
    }

    async fn display_patent(&self) -> Result<FunctionOutput, PatentError> {
        let session = self.registry.current().ok_or(PatentError::NoActiveSession)?;
        let content = self.registry.store().read(session.id()).await?;
        Ok(FunctionOutput::ok("Here is the current patent draft.")
            .with("session_id", session.id())
            .with("title", session.title())
            .with("content", content))
    }

    fn export_as_pdf(&self) -> Result<FunctionOutput, PatentError> {
        let session = self.registry.current().ok_or(PatentError::NoActiveSession)?;
        let path = Path::new(session.document().location())
            .with_extension("pdf")
            .to_string_lossy()
            .into_owned();
        Ok(FunctionOutput::ok(format!(
            "PDF export is not implemented yet. The draft would be written to {path}."
        ))
        .with("session_id", session.id())
        .with("path", path))
    }

    async fn send_user_response(&self, args: &Map<String, Value>) -> Result<FunctionOutput, PatentError> {
        let session = self.registry.current().ok_or(PatentError::NoActiveSession)?;
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| PatentError::InvalidArguments("'message' must be a string".to_string()))?;

        self.registry.store().append(session.id(), message).await?;
        self.registry.touch();
        Ok(FunctionOutput::ok("Added to the patent draft.").with("session_id", session.id()))
    }
}

fn parse_arguments(arguments: &str) -> Result<Map<String, Value>, PatentError> {
    if arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PatentError::InvalidArguments(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(PatentError::InvalidArguments(e.to_string())),
    }
}
