//! Conversation exchanges
//!
//! One exchange is the whole unit: record the user turn, resolve a backend,
//! generate, record the assistant turn, return the reply. The transcript and
//! the backend never get out of step in a way the caller can't see.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use samvad_core::{Message, ModelId, Role};
use samvad_llm::{BackendResolver, LlmError};
use samvad_persistence::{PersistenceError, TranscriptStore};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Failed to record {stage} turn: {source}")]
    Persistence {
        stage: Role,
        source: PersistenceError,
    },
}

/// What one completed exchange hands back
#[derive(Debug)]
pub struct ExchangeOutcome {
    /// Final assistant reply
    pub reply: String,
    /// Display form of the model identifier the exchange ran against
    pub model: String,
    /// Generation latency (ms)
    pub generation_ms: u64,
    /// Set when the assistant turn could not be recorded; the reply above
    /// is still valid
    pub persistence_warning: Option<String>,
}

/// Orchestrates user-message-in, assistant-reply-out cycles
pub struct ConversationGateway {
    resolver: Arc<dyn BackendResolver>,
    store: Arc<dyn TranscriptStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationGateway {
    pub fn new(resolver: Arc<dyn BackendResolver>, store: Arc<dyn TranscriptStore>) -> Self {
        Self {
            resolver,
            store,
            locks: DashMap::new(),
        }
    }

    /// Run one exchange
    ///
    /// Sequence: user append, resolve, generate, assistant append. The user
    /// turn is recorded before any backend work and stays recorded when
    /// resolution or generation refuses. A failed assistant append does not
    /// retract the reply; it comes back as `persistence_warning`.
    ///
    /// Exchanges on the same conversation are serialized in arrival order;
    /// different conversations run concurrently.
    pub async fn exchange(
        &self,
        conversation_id: &str,
        model: &ModelId,
        user_text: &str,
        fragments: Option<mpsc::Sender<String>>,
    ) -> Result<ExchangeOutcome, GatewayError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let model_name = model.to_string();

        self.store
            .append(conversation_id, Role::User, user_text, &model_name)
            .await
            .map_err(|source| GatewayError::Persistence {
                stage: Role::User,
                source,
            })?;

        // Resolution refusals (unknown provider, missing credential) leave
        // exactly the user turn in the store.
        let backend = self.resolver.resolve(model)?;

        let messages = [Message::user(user_text)];
        let result = backend.generate(&messages, fragments).await?;

        tracing::debug!(
            conversation_id,
            model = %model_name,
            latency_ms = result.total_time_ms,
            "Generation complete"
        );

        // The reply is already in hand; losing the append must not lose it.
        let persistence_warning = match self
            .store
            .append(conversation_id, Role::Assistant, &result.text, &model_name)
            .await
        {
            Ok(()) => None,
            Err(source) => {
                let warning = GatewayError::Persistence {
                    stage: Role::Assistant,
                    source,
                };
                tracing::error!(
                    conversation_id,
                    error = %warning,
                    "Assistant turn not recorded"
                );
                Some(warning.to_string())
            }
        };

        Ok(ExchangeOutcome {
            reply: result.text,
            model: model_name,
            generation_ms: result.total_time_ms,
            persistence_warning,
        })
    }

    fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use samvad_llm::{FinishReason, GenerationResult, ModelBackend};
    use samvad_persistence::MemoryTranscriptStore;

    /// Backend that streams scripted fragments
    struct ScriptedBackend {
        fragments: Vec<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            fragments: Option<mpsc::Sender<String>>,
        ) -> Result<GenerationResult, LlmError> {
            let mut text = String::new();
            for piece in &self.fragments {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                text.push_str(piece);
                if let Some(tx) = fragments.as_ref() {
                    let _ = tx.send(piece.to_string()).await;
                }
            }
            Ok(GenerationResult {
                text,
                model: "scripted".to_string(),
                tokens: self.fragments.len(),
                time_to_first_token_ms: None,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Resolver that always hands out the same backend
    struct FixedResolver {
        backend: Arc<dyn ModelBackend>,
    }

    impl BackendResolver for FixedResolver {
        fn resolve(&self, _model: &ModelId) -> Result<Arc<dyn ModelBackend>, LlmError> {
            Ok(Arc::clone(&self.backend))
        }
    }

    /// Resolver that refuses every model
    struct RefusingResolver {
        error: fn() -> LlmError,
    }

    impl BackendResolver for RefusingResolver {
        fn resolve(&self, _model: &ModelId) -> Result<Arc<dyn ModelBackend>, LlmError> {
            Err((self.error)())
        }
    }

    /// Backend that fails generation
    struct FailingBackend {
        error: fn() -> LlmError,
    }

    #[async_trait]
    impl ModelBackend for FailingBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _fragments: Option<mpsc::Sender<String>>,
        ) -> Result<GenerationResult, LlmError> {
            Err((self.error)())
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    /// Store that starts failing after the first N appends succeed
    struct FlakyStore {
        inner: MemoryTranscriptStore,
        allow: parking_lot::Mutex<usize>,
    }

    #[async_trait]
    impl TranscriptStore for FlakyStore {
        async fn append(
            &self,
            conversation_id: &str,
            role: Role,
            content: &str,
            model: &str,
        ) -> Result<(), PersistenceError> {
            {
                let mut allow = self.allow.lock();
                if *allow == 0 {
                    return Err(PersistenceError::Connection("store down".to_string()));
                }
                *allow -= 1;
            }
            self.inner.append(conversation_id, role, content, model).await
        }
    }

    fn gateway_with(
        backend: Arc<dyn ModelBackend>,
    ) -> (Arc<ConversationGateway>, Arc<MemoryTranscriptStore>) {
        let store = Arc::new(MemoryTranscriptStore::new());
        let gateway = Arc::new(ConversationGateway::new(
            Arc::new(FixedResolver { backend }),
            store.clone(),
        ));
        (gateway, store)
    }

    fn local_model() -> ModelId {
        ModelId::Local("scripted".to_string())
    }

    #[tokio::test]
    async fn test_exchange_appends_both_turns_in_order() {
        let backend = Arc::new(ScriptedBackend {
            fragments: vec!["Hi ", "there"],
            delay: Duration::ZERO,
        });
        let (gateway, store) = gateway_with(backend);

        let outcome = gateway
            .exchange("conv-1", &local_model(), "Hello", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Hi there");
        assert!(outcome.persistence_warning.is_none());

        let entries = store.conversation("conv-1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "Hello");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].content, "Hi there");
    }

    #[tokio::test]
    async fn test_forwarded_fragments_concatenate_to_reply() {
        let backend = Arc::new(ScriptedBackend {
            fragments: vec!["Bon", "jo", "ur"],
            delay: Duration::ZERO,
        });
        let (gateway, _store) = gateway_with(backend);

        let (tx, mut rx) = mpsc::channel(16);
        let outcome = gateway
            .exchange("conv-1", &local_model(), "Hello", Some(tx))
            .await
            .unwrap();

        let mut streamed = String::new();
        while let Ok(fragment) = rx.try_recv() {
            streamed.push_str(&fragment);
        }
        assert_eq!(streamed, outcome.reply);
        assert_eq!(outcome.reply, "Bonjour");
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_on_one_conversation_serialize() {
        let backend = Arc::new(ScriptedBackend {
            fragments: vec!["reply ", "text"],
            delay: Duration::from_millis(5),
        });
        let (gateway, store) = gateway_with(backend);

        let first = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .exchange("conv-1", &local_model(), "first", None)
                    .await
            })
        };
        let second = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .exchange("conv-1", &local_model(), "second", None)
                    .await
            })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // Whatever order the tasks won the lock in, turns never interleave.
        let entries = store.conversation("conv-1");
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[2].role, Role::User);
        assert_eq!(entries[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_missing_credential_leaves_only_user_turn() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let gateway = ConversationGateway::new(
            Arc::new(RefusingResolver {
                error: || LlmError::MissingCredential("gemini".to_string()),
            }),
            store.clone(),
        );

        let model: ModelId = "remote::gemini::gemini-1.5-pro".parse().unwrap();
        let err = gateway
            .exchange("conv-1", &model, "Hello", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Llm(LlmError::MissingCredential(ref p)) if p == "gemini"
        ));

        let entries = store.conversation("conv-1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].content, "Hello");
    }

    #[tokio::test]
    async fn test_provider_error_appends_no_assistant_turn() {
        let backend = Arc::new(FailingBackend {
            error: || LlmError::ProviderResponse {
                provider: "gemini".to_string(),
                status: 500,
            },
        });
        let (gateway, store) = gateway_with(backend);

        let err = gateway
            .exchange("conv-1", &local_model(), "Hello", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Llm(LlmError::ProviderResponse { status: 500, .. })
        ));

        let entries = store.conversation("conv-1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_user_append_failure_aborts_before_generation() {
        let store = Arc::new(FlakyStore {
            inner: MemoryTranscriptStore::new(),
            allow: parking_lot::Mutex::new(0),
        });
        let gateway = ConversationGateway::new(
            Arc::new(FixedResolver {
                backend: Arc::new(ScriptedBackend {
                    fragments: vec!["never"],
                    delay: Duration::ZERO,
                }),
            }),
            store,
        );

        let err = gateway
            .exchange("conv-1", &local_model(), "Hello", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Persistence {
                stage: Role::User,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_assistant_append_failure_still_returns_reply() {
        let store = Arc::new(FlakyStore {
            inner: MemoryTranscriptStore::new(),
            allow: parking_lot::Mutex::new(1),
        });
        let gateway = ConversationGateway::new(
            Arc::new(FixedResolver {
                backend: Arc::new(ScriptedBackend {
                    fragments: vec!["Salut"],
                    delay: Duration::ZERO,
                }),
            }),
            store,
        );

        let outcome = gateway
            .exchange("conv-1", &local_model(), "Hello", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Salut");
        let warning = outcome.persistence_warning.unwrap();
        assert!(warning.contains("assistant"));
    }
}
