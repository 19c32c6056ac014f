//! Submission pipeline orchestrator.
//!
//! Coordinates one submission run:
//! 1. Context seeding into `meta`
//! 2. Global before-hooks
//! 3. Validators in registration order, each with its scoped hooks
//! 4. Global after-hooks
//! 5. Sender resolution
//! 6. Message construction and a single send attempt
//!
//! Every run ends in a `PipelineResult`. Validation failures, transport
//! failures, collaborator errors and panics are all mapped to a result code;
//! nothing is raised to the caller.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use serde_json::{json, Map, Value};

use crate::error::ConfigError;
use crate::hooks::{ClientAddressHook, FingerprintHook, HookRegistry, HookSpec, ReceivedAtHook};
use crate::logging::structured::{LogCrateLogger, Logger};
use crate::submission::SubmissionRecord;
use crate::transport::message::{OutboundMessage, Sender};
use crate::transport::render::{html_to_text, DefaultRenderer, Renderer};
use crate::transport::senders::sender_from_config;
use crate::validation::{
    ContentSafety, EmailFormat, RequiredFields, ValidationFailure, ValidationOutcome, Validator,
    ValidatorRegistry,
};
use crate::{log_debug, log_error, log_warn};

use super::codes::{
    DefaultMessageResolver, MessageResolver, ERR_NO_SENDER, ERR_SEND_FAILED, ERR_UNEXPECTED,
    ERR_VALIDATION, OK_SENT,
};
use super::config::PipelineConfig;
use super::context::RequestContext;
use super::envelope::PipelineResult;

/// Key under which per-label validator outcomes accumulate in `meta`.
pub const VALIDATORS_KEY: &str = "validators";

/// Why a run stopped before reaching the transport.
enum Abort {
    Validation(ValidationFailure),
    Unexpected(anyhow::Error),
}

/// Final code plus placeholder values for the message resolver.
type Completion = (String, Map<String, Value>);

pub struct Pipeline {
    config: PipelineConfig,
    validators: ValidatorRegistry,
    hooks: HookRegistry,
    sender: Option<Arc<dyn Sender>>,
    fallback_sender: OnceLock<Option<Arc<dyn Sender>>>,
    resolver: Arc<dyn MessageResolver>,
    renderer: Arc<dyn Renderer>,
    logger: Arc<dyn Logger>,
    context: RequestContext,
}

impl Pipeline {
    /// An empty pipeline: no validators, no hooks, default collaborators.
    pub fn new(config: PipelineConfig) -> Self {
        let resolver = DefaultMessageResolver::with_overrides(config.messages.clone());
        Self {
            config,
            validators: ValidatorRegistry::new(),
            hooks: HookRegistry::new(),
            sender: None,
            fallback_sender: OnceLock::new(),
            resolver: Arc::new(resolver),
            renderer: Arc::new(DefaultRenderer),
            logger: Arc::new(LogCrateLogger),
            context: RequestContext::new(),
        }
    }

    /// Contact-form preset.
    ///
    /// Validators: `required` (name, email, message), `email`, `content`.
    /// Hooks: client address resolution, fingerprint, receive time.
    pub fn standard(config: PipelineConfig) -> Result<Self, ConfigError> {
        let client_address = ClientAddressHook::from_policy(config.trust.clone())?;
        let mut pipeline = Self::new(config);

        pipeline.register_validator(
            Some("required"),
            RequiredFields::new(["name", "email", "message"]),
        )?;
        pipeline.register_validator(Some("email"), EmailFormat::default())?;
        pipeline.register_validator(Some("content"), ContentSafety::default())?;

        pipeline.set_hooks(vec![
            HookSpec::new(client_address),
            HookSpec::new(FingerprintHook),
            HookSpec::new(ReceivedAtHook),
        ])?;
        Ok(pipeline)
    }

    pub fn register_validator<V>(
        &mut self,
        label: Option<&str>,
        validator: V,
    ) -> Result<String, ConfigError>
    where
        V: Validator + 'static,
    {
        self.validators.register(label, validator)
    }

    /// Replace the whole hook set.
    pub fn set_hooks(&mut self, specs: Vec<HookSpec>) -> Result<(), ConfigError> {
        self.hooks.configure(specs)
    }

    pub fn set_sender(&mut self, sender: Arc<dyn Sender>) {
        self.sender = Some(sender);
    }

    pub fn set_message_resolver(&mut self, resolver: Arc<dyn MessageResolver>) {
        self.resolver = resolver;
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = renderer;
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// Context used by [`Pipeline::process`].
    pub fn set_context(&mut self, context: RequestContext) {
        self.context = context;
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Run one submission with the configured context.
    pub fn process(&self, record: SubmissionRecord) -> PipelineResult {
        self.process_with(record, &self.context)
    }

    /// Run one submission with a per-request context.
    pub fn process_with(
        &self,
        mut record: SubmissionRecord,
        ctx: &RequestContext,
    ) -> PipelineResult {
        let log_ctx = ctx.log_context();

        let run = panic::catch_unwind(AssertUnwindSafe(|| self.run(&mut record, ctx)));

        let (code, message_context) = match run {
            Ok(Ok(completion)) => completion,
            Ok(Err(Abort::Validation(failure))) => {
                let code = if failure.code.trim().is_empty() {
                    ERR_VALIDATION.to_string()
                } else {
                    failure.code.clone()
                };
                (code, failure_context(&failure))
            }
            Ok(Err(Abort::Unexpected(err))) => {
                self.logger.error(
                    &format!("{} PIPELINE_UNEXPECTED_ERROR", log_ctx),
                    &json!({"error": format!("{:#}", err)}),
                );
                (ERR_UNEXPECTED.to_string(), Map::new())
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                log_error!(log_ctx, "PIPELINE_PANICKED", reason = reason);
                (ERR_UNEXPECTED.to_string(), Map::new())
            }
        };

        PipelineResult::build(
            &code,
            &message_context,
            std::mem::take(&mut record.meta),
            self.resolver.as_ref(),
        )
    }

    fn run(
        &self,
        record: &mut SubmissionRecord,
        ctx: &RequestContext,
    ) -> Result<Completion, Abort> {
        let log_ctx = ctx.log_context();

        ctx.seed_meta(&mut record.meta);
        self.hooks.before_global(record, ctx);

        for entry in self.validators.iter() {
            let label = entry.label.as_str();
            self.hooks.before_label(label, record, ctx);

            let snapshot = record.freeze();
            let outcome = match entry.validator.check(&snapshot) {
                Ok(outcome) => outcome,
                Err(err) => match err.downcast::<ValidationFailure>() {
                    Ok(failure) => ValidationOutcome::Failed(failure),
                    Err(err) => {
                        let err = err.context(format!("validator {} failed", label));
                        return Err(Abort::Unexpected(err));
                    }
                },
            };

            let results = append_outcome(&mut record.meta, label, outcome.to_record());
            self.hooks.after_label(label, record, &results, ctx);

            match outcome {
                ValidationOutcome::Passed(_) => {
                    log_debug!(
                        log_ctx.with_validator(label),
                        "VALIDATOR_PASSED",
                        entries = results_len(&results)
                    );
                }
                ValidationOutcome::Failed(failure) => {
                    self.logger.warning(
                        &format!("{} VALIDATION_FAILED", log_ctx.with_validator(label)),
                        &json!({
                            "label": label,
                            "code": failure.code,
                            "field": failure.field,
                        }),
                    );
                    return Err(Abort::Validation(failure));
                }
            }
        }

        let aggregate = record
            .meta
            .get(VALIDATORS_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.hooks.after_global(record, &aggregate, ctx);

        let sender = match self.resolve_sender() {
            Some(sender) => sender,
            None => {
                log_warn!(log_ctx, "NO_SENDER", transport = self.config.transport.kind);
                return Ok((ERR_NO_SENDER.to_string(), Map::new()));
            }
        };

        let message = self.build_message(record).map_err(Abort::Unexpected)?;

        match sender.send(&message) {
            Ok(()) => {
                self.hooks.after_send(record, &message, ctx);
                self.logger.info(
                    &format!("{} MESSAGE_SENT", log_ctx),
                    &json!({"recipients": message.to.len(), "subject": message.subject}),
                );
                Ok((OK_SENT.to_string(), Map::new()))
            }
            Err(err) => {
                record
                    .meta
                    .insert("transport_error".to_string(), err.diagnostic());
                self.hooks.send_failure(record, &err, ctx);

                let code = match err.code() {
                    Some(code) if code != OK_SENT => code.to_string(),
                    _ => ERR_SEND_FAILED.to_string(),
                };
                self.logger.error(
                    &format!("{} SEND_FAILED", log_ctx),
                    &json!({"code": code, "error": err.to_string()}),
                );
                Ok((code, Map::new()))
            }
        }
    }

    /// Injected sender, else the one described by the transport config.
    /// The fallback is built at most once per pipeline.
    fn resolve_sender(&self) -> Option<Arc<dyn Sender>> {
        if let Some(sender) = &self.sender {
            return Some(Arc::clone(sender));
        }
        self.fallback_sender
            .get_or_init(|| sender_from_config(&self.config.transport))
            .clone()
    }

    fn build_message(&self, record: &SubmissionRecord) -> anyhow::Result<OutboundMessage> {
        let projection = record.projection();
        let transport = &self.config.transport;

        let html = self
            .renderer
            .render_html(&projection)
            .context("rendering html body")?;
        let text = match self
            .renderer
            .render_text(&projection)
            .context("rendering text body")?
        {
            Some(text) => text,
            None => html_to_text(&html),
        };

        let subject = if projection.subject.trim().is_empty() {
            match projection.name.trim() {
                "" => "New submission".to_string(),
                name => format!("New submission from {}", name),
            }
        } else {
            projection.subject.trim().to_string()
        };
        let subject = match transport.subject_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{} {}", prefix, subject),
            _ => subject,
        };

        let reply_to = if transport.reply_to_submitter {
            Some(projection.email.trim().to_string()).filter(|e| !e.is_empty())
        } else {
            None
        };

        Ok(OutboundMessage {
            to: transport.to.clone(),
            from: transport.from.clone(),
            reply_to,
            subject,
            html,
            text,
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("validators", &self.validators)
            .field("hooks", &self.hooks)
            .field("sender_injected", &self.sender.is_some())
            .field("transport", &self.config.transport.kind)
            .field("request_id", &self.context.request_id)
            .finish()
    }
}

/// Append `entry` to `meta.validators[label]` and return that label's list.
fn append_outcome(meta: &mut Map<String, Value>, label: &str, entry: Value) -> Value {
    let by_label = meta
        .entry(VALIDATORS_KEY.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !by_label.is_object() {
        *by_label = Value::Object(Map::new());
    }
    let Some(by_label) = by_label.as_object_mut() else {
        return Value::Null;
    };

    let list = by_label
        .entry(label.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !list.is_array() {
        *list = Value::Array(Vec::new());
    }
    if let Some(items) = list.as_array_mut() {
        items.push(entry);
    }
    list.clone()
}

fn results_len(results: &Value) -> usize {
    results.as_array().map(Vec::len).unwrap_or(0)
}

fn failure_context(failure: &ValidationFailure) -> Map<String, Value> {
    let mut context = Map::new();
    if let Some(field) = &failure.field {
        context.insert("field".to_string(), Value::String(field.clone()));
    }
    context
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::ReadOnlySnapshot;
    use crate::transport::message::SendError;
    use crate::transport::senders::{MemorySender, TransportConfig, TransportKind};
    use crate::submission::Projection;
    use crate::validation::from_fn;

    fn record() -> SubmissionRecord {
        SubmissionRecord::new()
            .with_name("Ada")
            .with_email("ada@example.com")
            .with_message("Hello there")
    }

    fn memory_pipeline() -> (Pipeline, Arc<MemorySender>) {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let sender = Arc::new(MemorySender::new());
        pipeline.set_sender(sender.clone());
        (pipeline, sender)
    }

    #[test]
    fn test_append_outcome_accumulates_in_order() {
        let mut meta = Map::new();
        append_outcome(&mut meta, "a", json!({"n": 1}));
        let list = append_outcome(&mut meta, "a", json!({"n": 2}));
        assert_eq!(list, json!([{"n": 1}, {"n": 2}]));
        assert_eq!(meta[VALIDATORS_KEY]["a"], list);
    }

    #[test]
    fn test_append_outcome_repairs_clobbered_meta() {
        let mut meta = Map::new();
        meta.insert(VALIDATORS_KEY.to_string(), json!("oops"));
        let list = append_outcome(&mut meta, "a", json!({"status": "ok"}));
        assert_eq!(list, json!([{"status": "ok"}]));
    }

    #[test]
    fn test_passing_validators_recorded() {
        let (mut pipeline, sender) = memory_pipeline();
        pipeline
            .register_validator(Some("required"), RequiredFields::new(["name", "email"]))
            .unwrap();
        pipeline
            .register_validator(None, from_fn(|_s: &ReadOnlySnapshot| Ok(ValidationOutcome::ok())))
            .unwrap();

        let result = pipeline.process(record());

        assert!(result.ok);
        assert_eq!(result.code, OK_SENT);
        assert_eq!(result.validator_entries("fn#2").unwrap(), &vec![json!({"status": "ok"})]);
        assert_eq!(
            result.validator_entries("required").unwrap()[0]["checked"],
            json!(["name", "email"])
        );
        assert_eq!(sender.count(), 1);
    }

    #[test]
    fn test_fallback_sender_built_once() {
        let config = PipelineConfig {
            transport: TransportConfig {
                kind: Some(TransportKind::Memory),
                ..TransportConfig::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config);

        let first = pipeline.resolve_sender().unwrap();
        let second = pipeline.resolve_sender().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pipeline.process(record()).code, OK_SENT);
    }

    #[test]
    fn test_no_sender_short_circuits() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        let result = pipeline.process(record());
        assert!(!result.ok);
        assert_eq!(result.code, ERR_NO_SENDER);
    }

    #[test]
    fn test_message_construction() {
        let config = PipelineConfig {
            transport: TransportConfig {
                to: vec!["ops@example.com".to_string()],
                from: "noreply@example.com".to_string(),
                subject_prefix: Some("[Contact]".to_string()),
                reply_to_submitter: true,
                ..TransportConfig::default()
            },
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(config);
        let sender = Arc::new(MemorySender::new());
        pipeline.set_sender(sender.clone());

        let mut submission = record();
        submission.meta.insert("secret".to_string(), json!("never-rendered"));
        pipeline.process(submission);

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.subject, "[Contact] New submission from Ada");
        assert_eq!(message.reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(message.to, vec!["ops@example.com".to_string()]);
        assert!(message.html.contains("Hello there"));
        assert!(message.text.contains("Message: Hello there"));
        assert!(!message.html.contains("never-rendered"));
        assert!(!message.text.contains("never-rendered"));
    }

    struct BrokenRenderer;

    impl Renderer for BrokenRenderer {
        fn render_html(&self, _projection: &Projection) -> anyhow::Result<String> {
            anyhow::bail!("template missing")
        }
    }

    #[test]
    fn test_renderer_error_is_unexpected() {
        let (mut pipeline, sender) = memory_pipeline();
        pipeline.set_renderer(Arc::new(BrokenRenderer));
        let result = pipeline.process(record());
        assert_eq!(result.code, ERR_UNEXPECTED);
        assert_eq!(sender.count(), 0);
    }

    #[test]
    fn test_validator_panic_is_contained() {
        let (mut pipeline, sender) = memory_pipeline();
        pipeline
            .register_validator(
                Some("boom"),
                from_fn(|_s: &ReadOnlySnapshot| -> anyhow::Result<ValidationOutcome> {
                    panic!("validator bug")
                }),
            )
            .unwrap();

        let result = pipeline.process(record());
        assert_eq!(result.code, ERR_UNEXPECTED);
        assert!(!result.ok);
        assert_eq!(sender.count(), 0);
    }

    struct RejectingSender;

    impl Sender for RejectingSender {
        fn send(&self, _message: &OutboundMessage) -> Result<(), SendError> {
            Err(SendError::transport("ERR_SMTP_AUTH", "535 authentication failed"))
        }
    }

    #[test]
    fn test_transport_error_recorded_in_meta() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.set_sender(Arc::new(RejectingSender));

        let result = pipeline.process(record());
        assert_eq!(result.code, "ERR_SMTP_AUTH");
        assert_eq!(result.meta["transport_error"]["detail"], "535 authentication failed");
    }

    #[test]
    fn test_standard_preset() {
        let mut pipeline = Pipeline::standard(PipelineConfig::default()).unwrap();
        let sender = Arc::new(MemorySender::new());
        pipeline.set_sender(sender.clone());
        pipeline.set_context(
            RequestContext::new()
                .with_request_id("req-standard")
                .with_received_at("2026-01-29T10:00:00Z"),
        );

        assert_eq!(pipeline.validators().labels(), vec!["required", "email", "content"]);

        let result = pipeline.process(record());
        assert_eq!(result.code, OK_SENT);
        assert_eq!(result.meta["request_id"], "req-standard");
        assert_eq!(result.meta["received_at"], "2026-01-29T10:00:00.000Z");
        assert_eq!(result.meta["fingerprint"].as_str().unwrap().len(), 64);

        let missing = pipeline.process(SubmissionRecord::new().with_name("Ada"));
        assert_eq!(missing.code, "EMAIL_REQUIRED");
        assert_eq!(missing.message, "The email field is required.");
    }
}
