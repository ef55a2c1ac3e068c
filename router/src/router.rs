//! The dispatch core. One entry point, `route_query`, merges three
//! signals into a single handler choice per query:
//!
//! 1. observation relevancy of previously uploaded data,
//! 2. keyword overlap against capability phrases,
//! 3. vector similarity from the capability index.
//!
//! Strictly higher score wins at every selection point; exact ties go
//! to the earliest-registered handler. The keyword route is the one
//! exception: it demands a single unambiguous winner and otherwise
//! defers to the semantic route, where the registration tie-break
//! applies.
//!
//! Nothing here fails the caller. Index outages degrade to a relaxed
//! keyword pass, handler timeouts demote to the next keyword candidate,
//! and anything left over becomes a well-formed error envelope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use vital_core::data::{DataKind, UPLOAD_FLAG_KEY, UPLOAD_KIND_KEY};
use vital_core::response::CoachResponse;
use vital_core::routing::{HandlerDescriptor, RouteHistoryEntry, RouteMethod};

use crate::config::RouterConfig;
use crate::error::{RegistryError, RouterError};
use crate::handler::Handler;
use crate::index::{
    CapabilityIndex, CapabilityMatch, Embedder, HashingEmbedder, IndexError, round_score,
    tokenize_ascii,
};
use crate::registry::HandlerRegistry;
use crate::session::{SessionStore, UserSession};

/// Shown when a handler answers with an empty body.
const EMPTY_RESPONSE_TEXT: &str =
    "I processed your request but couldn't generate a specific response.";
/// Shown when the selected handler fails or times out.
const PROCESS_FALLBACK_TEXT: &str = "I encountered an error while processing your request.";
/// Shown when no strategy qualifies any handler.
const ROUTING_FAILURE_TEXT: &str =
    "I'm not sure how to help with that yet. Try asking about your sleep, exercise, nutrition, or biometric data.";
/// Topic reported before the user has any routed decision.
const DEFAULT_TOPIC: &str = "general";
/// Jaro-Winkler floor above which two tokens count as the same word.
const FUZZY_TOKEN_MATCH: f64 = 0.92;

/// What one `route_query` call decided.
struct RouteOutcome {
    handler: Option<String>,
    confidence: f64,
    method: RouteMethod,
    response: CoachResponse,
}

impl RouteOutcome {
    fn routing_failure() -> Self {
        Self {
            handler: None,
            confidence: 0.0,
            method: RouteMethod::Error,
            response: CoachResponse::failure(
                ROUTING_FAILURE_TEXT,
                RouterError::RoutingFailure.to_string(),
            ),
        }
    }
}

struct ObservationPick {
    handler: String,
    relevancy: f64,
}

/// The dispatch engine. Built once at startup from a finished registry;
/// the capability index is embedded from the registry's phrases at
/// construction and immutable afterwards. Changing the roster means
/// building a new router.
pub struct SemanticRouter {
    registry: Arc<HandlerRegistry>,
    index: CapabilityIndex,
    sessions: SessionStore,
    history: Mutex<Vec<RouteHistoryEntry>>,
    config: RouterConfig,
}

impl SemanticRouter {
    /// Router backed by the in-process hashing embedder.
    pub async fn new(
        registry: Arc<HandlerRegistry>,
        config: RouterConfig,
    ) -> Result<Self, IndexError> {
        let embedder = Box::new(HashingEmbedder::new(config.embedding_dimensions));
        Self::with_embedder(registry, embedder, config).await
    }

    /// Router backed by a caller-supplied embedding provider.
    pub async fn with_embedder(
        registry: Arc<HandlerRegistry>,
        embedder: Box<dyn Embedder>,
        config: RouterConfig,
    ) -> Result<Self, IndexError> {
        let index = CapabilityIndex::build(embedder, registry.capability_phrases()).await?;
        Ok(Self {
            registry,
            index,
            sessions: SessionStore::new(),
            history: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.registry.descriptors()
    }

    /// Route one query for one user. Never returns an error: every
    /// failure mode is folded into the response envelope.
    pub async fn route_query(
        &self,
        user_id: &str,
        query: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> CoachResponse {
        self.route_query_traced(user_id, query, metadata).await.1
    }

    /// Like `route_query`, also handing back the history entry this
    /// call appended, for callers that surface the routing decision.
    ///
    /// The user's session lock is held for the whole call, so calls for
    /// the same user serialize while different users proceed in
    /// parallel. Metadata merge and the query-log append happen before
    /// selection so handlers see the current turn.
    pub async fn route_query_traced(
        &self,
        user_id: &str,
        query: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> (RouteHistoryEntry, CoachResponse) {
        let now = Utc::now();
        let cell = self.sessions.session(user_id).await;
        let mut session = cell.lock().await;

        if let Some(meta) = metadata {
            session.merge_metadata(meta);
        }
        session.record_query(query, metadata, now, self.config.query_log_cap);

        let upload_meta = metadata.filter(|m| {
            m.get(UPLOAD_FLAG_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });

        let outcome = match upload_meta {
            Some(meta) => {
                match self
                    .ingest_upload(&mut session, user_id, query, meta, now)
                    .await
                {
                    Some(outcome) => outcome,
                    None => self.route(&session, user_id, query, now).await,
                }
            }
            None => self.route(&session, user_id, query, now).await,
        };

        tracing::info!(
            user = user_id,
            handler = outcome.handler.as_deref().unwrap_or("-"),
            method = %outcome.method,
            confidence = outcome.confidence,
            "routed query"
        );

        let entry = RouteHistoryEntry {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            handler: outcome.handler.clone(),
            confidence: outcome.confidence,
            method: outcome.method,
            timestamp: Utc::now(),
        };
        self.history.lock().await.push(entry.clone());

        (entry, outcome.response)
    }

    /// Merge caller metadata into the user's session without routing.
    pub async fn update_context(&self, user_id: &str, metadata: &Map<String, Value>) {
        let cell = self.sessions.session(user_id).await;
        cell.lock().await.merge_metadata(metadata);
    }

    /// Drop the user's session state: metadata, query log, observation
    /// contexts. Route history stays; it is an audit log, not session
    /// state. Returns whether a session existed.
    pub async fn clear_context(&self, user_id: &str) -> bool {
        self.sessions.clear(user_id).await
    }

    /// Handler name of the user's most recent routed decision, or
    /// "general" when there is none (including when the latest decision
    /// selected no handler).
    pub async fn active_topic(&self, user_id: &str) -> String {
        let history = self.history.lock().await;
        history
            .iter()
            .rev()
            .find(|entry| entry.user_id == user_id)
            .and_then(|entry| entry.handler.clone())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
    }

    /// Recent routing decisions, newest first. `user_id` narrows to one
    /// user, `limit` bounds the page.
    pub async fn route_history(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> Vec<RouteHistoryEntry> {
        let history = self.history.lock().await;
        history
            .iter()
            .rev()
            .filter(|entry| user_id.is_none_or(|u| entry.user_id == u))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Shut down every handler, best effort.
    pub async fn close(&self) -> Result<(), RegistryError> {
        self.registry.close().await
    }

    /// Upload branch: refresh the observation context of every handler
    /// that supports the uploaded kind, then answer straight from the
    /// best context when it clears the relevancy bar. Returns None to
    /// fall through to the query branch.
    ///
    /// A payload whose records cannot be read skips that store and
    /// keeps the handler's previous context; the rest of the upload
    /// proceeds.
    async fn ingest_upload(
        &self,
        session: &mut UserSession,
        user_id: &str,
        query: &str,
        metadata: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Option<RouteOutcome> {
        let Some(kind) = metadata
            .get(UPLOAD_KIND_KEY)
            .and_then(Value::as_str)
            .and_then(DataKind::parse)
        else {
            tracing::warn!(user = user_id, "upload without a recognized data kind tag");
            return None;
        };

        let payload = Value::Object(metadata.clone());
        for entry in self.registry.entries() {
            if !entry.handler.supported_data_kinds().contains(&kind) {
                continue;
            }
            let Some(mut context) = entry.handler.create_observation_context(kind, user_id).await
            else {
                continue;
            };
            let ingested = context.update_from_data(&payload, now);
            if ingested == 0 {
                let skip = RouterError::MalformedUploadPayload {
                    key: kind.payload_key().to_string(),
                };
                tracing::warn!(
                    user = user_id,
                    handler = %entry.name,
                    kind = kind.as_str(),
                    error = %skip,
                    "keeping previous observation context"
                );
                continue;
            }
            session.contexts.insert(entry.name.clone(), context);
        }

        let best = self.best_observation(session, query, now)?;
        if best.relevancy <= self.config.observation_min_relevancy {
            return None;
        }
        let response = session.contexts.get(&best.handler)?.generate_response();
        Some(RouteOutcome {
            handler: Some(best.handler),
            confidence: round_score(best.relevancy),
            method: RouteMethod::ObservationContext,
            response,
        })
    }

    /// Query branch: observation, then keyword, then semantic; a
    /// qualifying selection is processed, anything else is a routing
    /// failure.
    async fn route(
        &self,
        session: &UserSession,
        user_id: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> RouteOutcome {
        if let Some(pick) = self.best_observation(session, query, now) {
            if pick.relevancy > self.config.observation_min_relevancy {
                return self
                    .process_selection(
                        session,
                        user_id,
                        query,
                        &pick.handler,
                        round_score(pick.relevancy),
                        RouteMethod::ObservationContext,
                    )
                    .await;
            }
        }

        if let Some((name, score)) = self.keyword_selection(query) {
            return self
                .process_selection(
                    session,
                    user_id,
                    query,
                    &name,
                    round_score(score),
                    RouteMethod::Keyword,
                )
                .await;
        }

        match self.semantic_selection(query).await {
            Ok(Some((name, confidence))) => {
                return self
                    .process_selection(
                        session,
                        user_id,
                        query,
                        &name,
                        round_score(confidence),
                        RouteMethod::Semantic,
                    )
                    .await;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    user = user_id,
                    error = %err,
                    "capability index degraded, relaxing keyword route"
                );
                if let Some((name, score)) = self.relaxed_keyword_selection(query, None) {
                    return self
                        .process_selection(
                            session,
                            user_id,
                            query,
                            &name,
                            round_score(score),
                            RouteMethod::Keyword,
                        )
                        .await;
                }
            }
        }

        RouteOutcome::routing_failure()
    }

    /// Highest-relevancy context at `now`; exact ties go to the context
    /// whose handler registered first.
    fn best_observation(
        &self,
        session: &UserSession,
        query: &str,
        now: DateTime<Utc>,
    ) -> Option<ObservationPick> {
        let mut best: Option<(ObservationPick, usize)> = None;
        for (name, context) in &session.contexts {
            let relevancy =
                context.calculate_relevancy(query, now, self.config.decay_half_life_secs);
            let order = self.registry.registration_index(name).unwrap_or(usize::MAX);
            let beats = match &best {
                Some((current, current_order)) => {
                    relevancy > current.relevancy
                        || (relevancy == current.relevancy && order < *current_order)
                }
                None => true,
            };
            if beats {
                best = Some((
                    ObservationPick {
                        handler: name.clone(),
                        relevancy,
                    },
                    order,
                ));
            }
        }
        best.map(|(pick, _)| pick)
    }

    /// Strict keyword route: the single best phrase overlap above the
    /// bar. Any exact tie at the top disqualifies the whole route.
    fn keyword_selection(&self, query: &str) -> Option<(String, f64)> {
        let query_tokens = tokenize_ascii(query);
        let mut best: Option<(usize, f64)> = None;
        let mut tied = false;
        for (position, entry) in self.registry.entries().iter().enumerate() {
            let score = keyword_score(&query_tokens, entry.handler.as_ref());
            match best {
                Some((_, best_score)) if score > best_score => {
                    best = Some((position, score));
                    tied = false;
                }
                Some((_, best_score)) if score == best_score => tied = true,
                None => best = Some((position, score)),
                _ => {}
            }
        }
        match best {
            Some((position, score)) if score > self.config.keyword_min_score && !tied => {
                Some((self.registry.entries()[position].name.clone(), score))
            }
            _ => None,
        }
    }

    /// Relaxed keyword route for degraded paths: ties fall to
    /// registration order instead of disqualifying, and `exclude` is
    /// skipped entirely.
    fn relaxed_keyword_selection(
        &self,
        query: &str,
        exclude: Option<&str>,
    ) -> Option<(String, f64)> {
        let query_tokens = tokenize_ascii(query);
        let mut best: Option<(usize, f64)> = None;
        for (position, entry) in self.registry.entries().iter().enumerate() {
            if exclude.is_some_and(|skip| skip == entry.name) {
                continue;
            }
            let score = keyword_score(&query_tokens, entry.handler.as_ref());
            let beats = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };
            if beats {
                best = Some((position, score));
            }
        }
        best.filter(|(_, score)| *score > self.config.keyword_min_score)
            .map(|(position, score)| (self.registry.entries()[position].name.clone(), score))
    }

    /// Semantic route: nearest capability phrases from the index,
    /// aggregated per handler by averaging similarity floored at zero.
    async fn semantic_selection(&self, query: &str) -> Result<Option<(String, f64)>, RouterError> {
        let matches = self.search_with_retry(query).await?;
        if matches.is_empty() {
            return Ok(None);
        }

        let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
        for m in &matches {
            let slot = totals.entry(m.handler.as_str()).or_insert((0.0, 0));
            slot.0 += m.score.max(0.0);
            slot.1 += 1;
        }

        let mut best: Option<(&str, f64, usize)> = None;
        for (name, (sum, count)) in totals {
            let confidence = sum / count as f64;
            let order = self.registry.registration_index(name).unwrap_or(usize::MAX);
            let beats = match best {
                Some((_, best_confidence, best_order)) => {
                    confidence > best_confidence
                        || (confidence == best_confidence && order < best_order)
                }
                None => true,
            };
            if beats {
                best = Some((name, confidence, order));
            }
        }

        Ok(best
            .filter(|(_, confidence, _)| *confidence > self.config.semantic_min_confidence)
            .map(|(name, confidence, _)| (name.to_string(), confidence)))
    }

    /// Bounded, retried index search. Exponential backoff with a little
    /// jitter between attempts; the last failure is reported when every
    /// attempt is spent.
    async fn search_with_retry(&self, query: &str) -> Result<Vec<CapabilityMatch>, RouterError> {
        let budget = Duration::from_millis(self.config.index_timeout_ms);
        let attempts = self.config.index_retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match timeout(budget, self.index.search(query, self.config.top_k)).await {
                Ok(Ok(matches)) => return Ok(matches),
                Ok(Err(err)) => last_error = err.to_string(),
                Err(_) => {
                    last_error = format!(
                        "search timed out after {}ms",
                        self.config.index_timeout_ms
                    );
                }
            }
            if attempt < attempts {
                let exp = (attempt - 1).min(10);
                let base = self.config.index_retry_backoff_ms.saturating_mul(1 << exp);
                let jitter = rand::thread_rng().gen_range(0..=base / 4);
                tracing::debug!(attempt, delay_ms = base + jitter, "retrying index search");
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }
        }
        Err(RouterError::IndexUnavailable(last_error))
    }

    /// Ask the selected handler for the full answer, bounded by the
    /// processing budget. A timeout demotes once to the relaxed keyword
    /// route without the timed-out handler; a plain failure becomes the
    /// error envelope directly.
    async fn process_selection(
        &self,
        session: &UserSession,
        user_id: &str,
        query: &str,
        handler_name: &str,
        confidence: f64,
        method: RouteMethod,
    ) -> RouteOutcome {
        let Some(handler) = self.registry.get(handler_name) else {
            // A context can name a handler missing from this roster
            // when sessions outlive a redeploy.
            tracing::warn!(user = user_id, handler = handler_name, "selected handler not in registry");
            return RouteOutcome::routing_failure();
        };

        let snapshot = session.snapshot(user_id);
        let budget = Duration::from_millis(self.config.handler_timeout_ms);
        match timeout(budget, handler.process(query, &snapshot)).await {
            Ok(Ok(response)) => RouteOutcome {
                handler: Some(handler_name.to_string()),
                confidence,
                method,
                response: normalize_envelope(response),
            },
            Ok(Err(err)) => {
                let failure = RouterError::HandlerProcessing {
                    handler: handler_name.to_string(),
                    detail: err.to_string(),
                };
                tracing::error!(user = user_id, error = %failure, "handler processing failed");
                RouteOutcome {
                    handler: Some(handler_name.to_string()),
                    confidence,
                    method: RouteMethod::Error,
                    response: CoachResponse::failure(PROCESS_FALLBACK_TEXT, failure.to_string()),
                }
            }
            Err(_) => {
                let failure = RouterError::HandlerTimeout {
                    handler: handler_name.to_string(),
                    timeout_ms: self.config.handler_timeout_ms,
                };
                tracing::warn!(user = user_id, error = %failure, "trying keyword fallback");
                self.timeout_fallback(session, user_id, query, handler_name, failure)
                    .await
            }
        }
    }

    /// One shot at the next-best keyword candidate after a timeout.
    async fn timeout_fallback(
        &self,
        session: &UserSession,
        user_id: &str,
        query: &str,
        timed_out: &str,
        failure: RouterError,
    ) -> RouteOutcome {
        if let Some((name, score)) = self.relaxed_keyword_selection(query, Some(timed_out)) {
            if let Some(handler) = self.registry.get(&name) {
                let snapshot = session.snapshot(user_id);
                let budget = Duration::from_millis(self.config.handler_timeout_ms);
                if let Ok(Ok(response)) = timeout(budget, handler.process(query, &snapshot)).await {
                    tracing::info!(user = user_id, handler = %name, "keyword fallback answered");
                    return RouteOutcome {
                        handler: Some(name),
                        confidence: round_score(score),
                        method: RouteMethod::Keyword,
                        response: normalize_envelope(response),
                    };
                }
            }
        }
        RouteOutcome {
            handler: Some(timed_out.to_string()),
            confidence: 0.0,
            method: RouteMethod::Error,
            response: CoachResponse::failure(PROCESS_FALLBACK_TEXT, failure.to_string()),
        }
    }
}

/// Keyword score for one handler: best overlap ratio across its
/// capability phrases.
fn keyword_score(query_tokens: &[String], handler: &dyn Handler) -> f64 {
    handler
        .capabilities()
        .iter()
        .map(|phrase| phrase_overlap(query_tokens, phrase))
        .fold(0.0, f64::max)
}

/// Fraction of a phrase's tokens present in the query. Near-identical
/// tokens (Jaro-Winkler at or above the floor) count as present, which
/// keeps one-letter typos from zeroing the route.
fn phrase_overlap(query_tokens: &[String], phrase: &str) -> f64 {
    let phrase_tokens = tokenize_ascii(phrase);
    if phrase_tokens.is_empty() {
        return 0.0;
    }
    let matched = phrase_tokens
        .iter()
        .filter(|pt| {
            query_tokens
                .iter()
                .any(|qt| qt == *pt || strsim::jaro_winkler(qt, pt) >= FUZZY_TOKEN_MATCH)
        })
        .count();
    matched as f64 / phrase_tokens.len() as f64
}

/// Handlers may answer with an empty body; callers are promised a
/// non-empty `response` either way.
fn normalize_envelope(mut response: CoachResponse) -> CoachResponse {
    if response.response.trim().is_empty() {
        response.response = EMPTY_RESPONSE_TEXT.to_string();
    }
    response
}
