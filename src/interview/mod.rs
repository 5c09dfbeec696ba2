//! The interview engine: owns sessions, runs the per-turn pipeline and drives
//! the stage machine.
//!
//! Each session is serialized by its own mutex; different sessions proceed in
//! parallel. Emergency assessment always runs locally, and any failure upstream
//! of it degrades the turn to an Urgent "insufficient information" verdict
//! instead of failing the request.

pub mod capture;
pub mod responses;
pub mod transitions;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{
    CausalRelationship, ClinicalHypothesis, ConsultationSession, Entity, InterviewStage,
    MedicalContext, PatientDemographics, TurnRole, UrgencyLevel, UrgencyOverride,
};
use crate::pipeline::extraction::{self, ExtractionResult};
use crate::pipeline::intent::{self, has_intent, ClassifiedIntent, IntentKind};
use crate::pipeline::normalize::{normalize, sanitize::sanitize_patient_input};
use crate::pipeline::provider::{ProviderError, ProviderPool};
use crate::pipeline::reasoning::{self, ReasoningOutcome};
use crate::pipeline::report::{self, ConsultationReport};
use crate::pipeline::safety::{self, AssessmentInput, RiskAssessment, TriggerSignal, TriggerSource};
use crate::pipeline::{EvidenceView, TurnArena, TurnWarning};
use crate::store::{ContextStore, StoreError};
use responses::{ComposedResponse, ResponseInputs, GREETING_MESSAGE};
use transitions::{Transition, TurnFacts};

/// End-conversation intent must reach this confidence to fast-forward.
const END_CONVERSATION_MIN: f32 = 0.6;
/// Rule id recorded in the red-flag audit trail for manual overrides.
pub const OVERRIDE_RULE_ID: &str = "OVERRIDE";

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {session_id} is not complete (currently at {stage})")]
    SessionNotComplete {
        session_id: Uuid,
        stage: InterviewStage,
    },

    #[error("Session has been ended: {0}")]
    SessionTerminated(Uuid),

    #[error("Context store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session lock poisoned")]
    LockPoisoned,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub session_id: Uuid,
    pub stage: InterviewStage,
    pub greeting_message: String,
}

/// Everything the caller learns from one patient message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub stage: InterviewStage,
    pub urgency: UrgencyLevel,
    pub response: String,
    pub next_questions: Vec<String>,
    /// Entities extracted from this message.
    pub entities: Vec<Entity>,
    /// Relationships detected this turn.
    pub causal_relationships: Vec<CausalRelationship>,
    /// Current ranking over the whole session.
    pub clinical_hypotheses: Vec<ClinicalHypothesis>,
    pub contextual_significance: f32,
    pub confidence: f32,
    pub triggers: Vec<TriggerSignal>,
    pub warnings: Vec<TurnWarning>,
}

/// Result of the analysis passes for one message, before anything is merged.
struct TurnAnalysis {
    arena: TurnArena,
    extraction: ExtractionResult,
    intents: Vec<ClassifiedIntent>,
    reasoning: ReasoningOutcome,
    assessment: RiskAssessment,
    normalization_confidence: f32,
    warnings: Vec<TurnWarning>,
}

type SessionHandle = Arc<Mutex<ConsultationSession>>;

pub struct InterviewEngine {
    config: EngineConfig,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    store: Arc<dyn ContextStore>,
    providers: ProviderPool,
}

impl InterviewEngine {
    /// Engine without external providers; the local path handles everything.
    pub fn new(config: EngineConfig, store: Arc<dyn ContextStore>) -> Self {
        let providers = ProviderPool::new(
            config.provider_timeout(),
            config.provider_failure_threshold,
            config.provider_cooldown(),
        );
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            store,
            providers,
        }
    }

    pub fn with_providers(mut self, providers: ProviderPool) -> Self {
        self.providers = providers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Start a new consultation at the greeting stage.
    pub fn initialize(
        &self,
        demographics: Option<PatientDemographics>,
    ) -> Result<InitializeResponse, IntakeError> {
        let mut session = ConsultationSession::new(demographics);
        let session_id = session.id;
        self.store.put(session_id, &session.context)?;
        session.push_transcript(TurnRole::Engine, GREETING_MESSAGE);

        self.sessions
            .write()
            .map_err(|_| IntakeError::LockPoisoned)?
            .insert(session_id, Arc::new(Mutex::new(session)));

        tracing::info!(session_id = %session_id, "Consultation started");
        Ok(InitializeResponse {
            session_id,
            stage: InterviewStage::Greeting,
            greeting_message: GREETING_MESSAGE.to_string(),
        })
    }

    /// Process one patient message.
    pub fn send_message(&self, session_id: Uuid, text: &str) -> Result<TurnResponse, IntakeError> {
        let started = Instant::now();
        let handle = self.session(session_id)?;
        let mut session = handle.lock().map_err(|_| IntakeError::LockPoisoned)?;
        if session.terminated {
            return Err(IntakeError::SessionTerminated(session_id));
        }

        let sanitized = sanitize_patient_input(text, self.config.max_input_length);
        let stage = session.stage;
        let demographics = session.demographics.clone();
        session.push_transcript(TurnRole::Patient, &sanitized.text);

        let (mut context, store_failure) = match self.store.get(session_id) {
            Ok(Some(ctx)) if !is_behind(&ctx, &session.context) => (ctx, None),
            Ok(Some(_)) => {
                // A previous write failed; the in-memory copy is newer.
                tracing::warn!(session_id = %session_id, "Stored context is stale, using session copy");
                (session.context.clone(), None)
            }
            Ok(None) => (session.context.clone(), None),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Context store read failed");
                (session.context.clone(), Some(format!("context store unavailable: {e}")))
            }
        };

        let full_text = sanitized.full_text();
        let analysis = match store_failure {
            Some(reason) => Err(reason),
            None => {
                self.analyze_guarded(&context, &sanitized.text, full_text, demographics.as_ref())
            }
        };

        let mut warnings = Vec::new();
        let degraded = analysis.is_err();
        let (assessment, turn_entities, turn_relationships, turn_hpi, intents, confidence) =
            match analysis {
                Ok(TurnAnalysis {
                    arena,
                    extraction,
                    intents,
                    reasoning,
                    assessment,
                    normalization_confidence,
                    warnings: turn_warnings,
                }) => {
                    warnings.extend(turn_warnings);
                    let turn_entities = arena.entities().to_vec();
                    let turn_relationships = arena.relationships().to_vec();
                    arena.merge_into(&mut context);
                    context.hypotheses = reasoning.hypotheses;
                    context.contextual_significance = reasoning.contextual_significance;
                    capture::record_turn(
                        &mut context,
                        stage,
                        &turn_entities,
                        &extraction,
                        &intents,
                        &sanitized.text,
                    );
                    let confidence = turn_confidence(&turn_entities, normalization_confidence);
                    (
                        assessment,
                        turn_entities,
                        turn_relationships,
                        extraction.hpi,
                        intents,
                        confidence,
                    )
                }
                Err(reason) => {
                    tracing::warn!(session_id = %session_id, reason = %reason, "Degraded assessment");
                    let assessment = safety::assess_degraded(
                        full_text,
                        demographics.as_ref(),
                        context.urgency,
                        &reason,
                    );
                    warnings.push(TurnWarning::DegradedAssessment { reason });
                    (assessment, Vec::new(), Vec::new(), Vec::new(), Vec::new(), 0.0)
                }
            };

        for trigger in assessment.triggers.iter().filter(|t| is_audited(t)) {
            context.record_red_flag(&trigger.rule_id, &trigger.description, trigger.level);
        }
        context.escalate(assessment.urgency);
        context.turns += 1;

        let facts = TurnFacts {
            emergency: assessment.turn_is_emergency(),
            end_requested: has_intent(&intents, IntentKind::EndConversation, END_CONVERSATION_MIN),
            has_text: !sanitized.text.trim().is_empty(),
        };
        let required = self.config.hpi_required_fields;
        let transition = transitions::decide(stage, &facts, |s| {
            transitions::is_complete(s, &context, &facts, required)
        });
        let new_stage = transition.target(stage);
        match transition {
            Transition::Complete => context.completed_stage = Some(InterviewStage::Completed),
            Transition::Advance(to) => context.completed_stage = stage_before(to),
            Transition::Stay | Transition::EmergencyJump => {}
        }

        let ComposedResponse {
            text: response,
            next_questions,
        } = responses::compose(&ResponseInputs {
            stage: new_stage,
            transition,
            assessment: &assessment,
            context: &context,
            turn_entities: &turn_entities,
            turn_relationships: &turn_relationships,
            turn_hpi: &turn_hpi,
            degraded,
        });

        if let Err(e) = self.store.put(session_id, &context) {
            tracing::warn!(session_id = %session_id, error = %e, "Context store write failed");
        }

        session.stage = new_stage;
        session.context = context;
        session.pending_questions = next_questions.clone();
        session.push_transcript(TurnRole::Engine, &response);
        session.touch();

        let processing_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            session_id = %session_id,
            stage = ?new_stage,
            urgency = %session.context.urgency,
            entities = turn_entities.len(),
            relationships = turn_relationships.len(),
            warnings = warnings.len(),
            processing_ms,
            "Turn processed"
        );

        Ok(TurnResponse {
            stage: new_stage,
            urgency: session.context.urgency,
            response,
            next_questions,
            entities: turn_entities,
            causal_relationships: turn_relationships,
            clinical_hypotheses: session.context.hypotheses.clone(),
            contextual_significance: session.context.contextual_significance,
            confidence,
            triggers: assessment.triggers,
            warnings,
        })
    }

    /// The consultation report. Only available once the interview is complete.
    pub fn get_report(&self, session_id: Uuid) -> Result<ConsultationReport, IntakeError> {
        let handle = self.session(session_id)?;
        let session = handle.lock().map_err(|_| IntakeError::LockPoisoned)?;
        if session.stage != InterviewStage::Completed {
            return Err(IntakeError::SessionNotComplete {
                session_id,
                stage: session.stage,
            });
        }
        Ok(report::synthesize(&session))
    }

    /// End a session early. Further messages are rejected and the session is
    /// dropped at the next sweep.
    pub fn end_session(&self, session_id: Uuid) -> Result<(), IntakeError> {
        let handle = self.session(session_id)?;
        let mut session = handle.lock().map_err(|_| IntakeError::LockPoisoned)?;
        session.terminated = true;
        session.touch();
        self.store.remove(session_id)?;
        tracing::info!(session_id = %session_id, stage = ?session.stage, "Consultation ended");
        Ok(())
    }

    /// Set the session urgency to `level`, the only way to lower it. The change
    /// is kept in the override log and the red-flag audit trail.
    pub fn override_urgency(
        &self,
        session_id: Uuid,
        level: UrgencyLevel,
        reason: &str,
    ) -> Result<UrgencyOverride, IntakeError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(IntakeError::InvalidInput(
                "an urgency override needs a reason".to_string(),
            ));
        }

        let handle = self.session(session_id)?;
        let mut session = handle.lock().map_err(|_| IntakeError::LockPoisoned)?;
        if session.terminated {
            return Err(IntakeError::SessionTerminated(session_id));
        }

        // Applied to a copy so a failed write leaves the session untouched.
        let mut context = session.context.clone();
        let record = context.apply_override(level, reason);
        let description = format!("Urgency set from {} to {}: {reason}", record.from, record.to);
        context.record_red_flag(OVERRIDE_RULE_ID, &description, level);
        self.store.put(session_id, &context)?;
        session.context = context;

        tracing::warn!(
            session_id = %session_id,
            from = %record.from,
            to = %record.to,
            "Urgency overridden"
        );
        Ok(record)
    }

    /// Drop sessions idle past the TTL and sessions that were ended. Returns
    /// how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let ttl = self.config.session_ttl_secs as i64;

        let Ok(mut sessions) = self.sessions.write() else {
            tracing::warn!("Session map lock poisoned; skipping sweep");
            return 0;
        };
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, handle)| {
                // A busy session is mid-turn, so not idle.
                handle
                    .try_lock()
                    .map(|s| s.terminated || s.idle_secs(now) > ttl)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            sessions.remove(id);
            if let Err(e) = self.store.remove(*id) {
                tracing::warn!(session_id = %id, error = %e, "Failed to remove expired context");
            }
        }
        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), remaining = sessions.len(), "Expired sessions swept");
        }
        expired.len()
    }

    fn session(&self, session_id: Uuid) -> Result<SessionHandle, IntakeError> {
        self.sessions
            .read()
            .map_err(|_| IntakeError::LockPoisoned)?
            .get(&session_id)
            .cloned()
            .ok_or(IntakeError::SessionNotFound(session_id))
    }

    /// Run the analysis passes, turning a panic into a degraded turn.
    /// `full_text` is the message before length truncation and only feeds the
    /// safety scans.
    fn analyze_guarded(
        &self,
        context: &MedicalContext,
        text: &str,
        full_text: &str,
        demographics: Option<&PatientDemographics>,
    ) -> Result<TurnAnalysis, String> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.analyze(context, text, full_text, demographics)
        }))
        .map_err(|_| "analysis failed unexpectedly".to_string())
    }

    fn analyze(
        &self,
        context: &MedicalContext,
        text: &str,
        full_text: &str,
        demographics: Option<&PatientDemographics>,
    ) -> TurnAnalysis {
        let mut warnings = Vec::new();
        let window = self.config.context_window_tokens;

        let normalized = normalize(text);
        if normalized.is_uncertain() {
            warnings.push(TurnWarning::NormalizationUncertain {
                confidence: normalized.confidence,
            });
        }

        let mut arena = TurnArena::for_context(context);
        let mut extraction = extraction::extract(&normalized.text, &mut arena, window);
        if normalized.is_uncertain() && normalized.was_changed() {
            // The corrections may have destroyed a term the raw text still carries.
            let supplement = extraction::extract_supplement(text, &mut arena, window);
            tracing::debug!(extra = supplement.entities.len(), "Raw-text supplement pass");
            extraction.absorb(supplement);
        }
        warnings.append(&mut extraction.warnings);

        let mut intents = intent::classify(&normalized.text, arena.entities());
        match self.providers.classify(text) {
            Ok(suggested) => intents = intent::merge_provider(intents, &suggested.intents),
            Err(ProviderError::NoProviders) => {}
            Err(ProviderError::Timeout { after_ms }) => {
                warnings.push(TurnWarning::ProviderTimeout { after_ms })
            }
            Err(e) => warnings.push(TurnWarning::ProviderUnavailable {
                reason: e.to_string(),
            }),
        }

        let reasoning =
            reasoning::reason(context, &mut arena, &extraction, &intents, demographics);

        let assessment = safety::assess(
            &AssessmentInput {
                raw_text: text,
                untruncated_text: (full_text.len() > text.len()).then_some(full_text),
                normalized_text: &normalized.text,
                view: EvidenceView::new(context, &arena),
                syndromes: &reasoning.syndromes,
                intents: &intents,
                demographics,
            },
            context.urgency,
        );

        TurnAnalysis {
            arena,
            extraction,
            intents,
            reasoning,
            assessment,
            normalization_confidence: normalized.confidence,
            warnings,
        }
    }
}

/// The stored copy missed a turn or an override the session already has.
fn is_behind(stored: &MedicalContext, live: &MedicalContext) -> bool {
    stored.turns < live.turns || stored.overrides.len() < live.overrides.len()
}

/// Trigger sources worth keeping in the session's red-flag trail. Entity and
/// relationship signals are already visible through the evidence itself.
fn is_audited(trigger: &TriggerSignal) -> bool {
    trigger.level > UrgencyLevel::Routine
        && !matches!(trigger.source, TriggerSource::Entity | TriggerSource::Relationship)
}

fn stage_before(stage: InterviewStage) -> Option<InterviewStage> {
    InterviewStage::ALL
        .iter()
        .copied()
        .find(|s| s.next() == stage && *s != stage)
}

/// Mean entity confidence scaled by how sure normalization was.
fn turn_confidence(entities: &[Entity], normalization_confidence: f32) -> f32 {
    if entities.is_empty() {
        return normalization_confidence.clamp(0.0, 1.0);
    }
    let mean = entities.iter().map(|e| e.confidence).sum::<f32>() / entities.len() as f32;
    (mean * normalization_confidence).clamp(0.0, 1.0)
}

// ── Session sweeper ─────────────────────────────────────────

/// Poll granularity of the sweeper thread, so shutdown is prompt.
const SWEEPER_TICK: Duration = Duration::from_millis(250);

/// Handle to the background sweeper. Stops and joins the thread on drop.
pub struct SweeperHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Sweep expired sessions every `config.sweep_interval_secs` until shut down.
pub fn start_sweeper(engine: Arc<InterviewEngine>) -> SweeperHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let interval = engine.config().sweep_interval();

    let handle = std::thread::spawn(move || {
        tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");
        sweeper_loop(&engine, &flag, interval);
        tracing::info!("Session sweeper stopped");
    });

    SweeperHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn sweeper_loop(engine: &InterviewEngine, shutdown: &AtomicBool, interval: Duration) {
    let mut last_sweep = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(SWEEPER_TICK);
        if last_sweep.elapsed() >= interval {
            engine.sweep_expired();
            last_sweep = Instant::now();
        }
    }
}
