//! The question-answering pipeline around one loaded document.

use std::{
    path::Path,
    sync::{Arc, RwLock},
};

use crate::{
    chunking::ChunkingConfig,
    completion::{
        CompletionProvider,
        CompletionRequest,
        Message,
        RetryPolicy,
        Sleep,
        TokioSleep,
        complete_with_retry,
    },
    document::{Document, DocumentStore, DocumentSummary},
    error::{Error, Result},
    ingestion,
    retrieval::{RetrievalConfig, RetrievedContext, retrieve},
};

const PERSONA: &str = "Jsi užitečný AI asistent, který odpovídá na \
otázky o nahraném PDF dokumentu (návodu). Odpovídej vždy v češtině. \
Buď přesný a stručný. Pokud odpověď není v nalezených částech \
dokumentu, řekni to.";

/// System instruction for a question, with the retrieved context embedded.
pub fn system_prompt(context: &str) -> String {
    format!("{PERSONA}\n\nRelevantní části dokumentu:\n{context}")
}

/// Shared state for answering questions about the current document.
///
/// The document and the provider can both be swapped while the session is in
/// use; every question works against the snapshot it started with.
pub struct Session {
    documents: DocumentStore,
    provider: RwLock<Option<Arc<dyn CompletionProvider>>>,
    sleeper: Arc<dyn Sleep>,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    retry: RetryPolicy,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ChunkingConfig::default(), RetrievalConfig::default())
    }
}

impl Session {
    pub fn new(chunking: ChunkingConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            documents: DocumentStore::new(),
            provider: RwLock::new(None),
            sleeper: Arc::new(TokioSleep),
            chunking,
            retrieval,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_provider(self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.set_provider(Some(provider));
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Install or remove the completion provider.
    pub fn set_provider(&self, provider: Option<Arc<dyn CompletionProvider>>) {
        let mut guard = self
            .provider
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = provider;
    }

    fn provider(&self) -> Option<Arc<dyn CompletionProvider>> {
        self.provider
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.provider().is_some()
    }

    pub fn document(&self) -> Option<Arc<Document>> {
        self.documents.current()
    }

    /// Chunk `text` and make it the current document.
    pub fn load_text(
        &self,
        name: impl Into<String>,
        text: String,
    ) -> DocumentSummary {
        let document = Document::new(name, 1, text, &self.chunking);
        self.documents.replace(document).summary()
    }

    /// Read, chunk and install a document file.
    pub fn load_file(&self, path: &Path) -> Result<DocumentSummary> {
        let document = ingestion::read_document(path, &self.chunking)?;
        Ok(self.documents.replace(document).summary())
    }

    fn loaded_document(&self) -> Result<Arc<Document>> {
        self.documents
            .current()
            .filter(|document| !document.chunks.is_empty())
            .ok_or(Error::EmptyDocument)
    }

    /// Retrieve the context for `question` without calling the service.
    pub fn context(&self, question: &str) -> Result<RetrievedContext> {
        let document = self.loaded_document()?;
        Ok(retrieve(&document.chunks, question, &self.retrieval))
    }

    /// Answer `question` given the prior conversation.
    pub async fn answer(
        &self,
        question: &str,
        history: &[Message],
    ) -> Result<String> {
        let provider = self.provider().ok_or(Error::Unconfigured)?;
        let context = self.context(question)?;

        tracing::debug!(
            keywords = ?context.keywords,
            synonyms = ?context.synonym_additions(),
            context_chars = context.text.chars().count(),
            chunks = context.indices().len(),
            "retrieved context"
        );

        let system = system_prompt(&context.text);
        let request = CompletionRequest::new(system, history, question);
        complete_with_retry(
            provider.as_ref(),
            &request,
            &self.retry,
            self.sleeper.as_ref(),
        )
        .await
    }
}

/// A running conversation: history grows only with answered questions.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask `question`; on success both turns are appended to the history.
    pub async fn ask(
        &mut self,
        session: &Session,
        question: &str,
    ) -> Result<String> {
        let answer = session.answer(question, &self.history).await?;
        self.history.push(Message::user(question));
        self.history.push(Message::assistant(answer.clone()));
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;

    use super::*;

    /// Replies with canned results and remembers every request it saw.
    #[derive(Default)]
    struct Echo {
        requests: Mutex<Vec<CompletionRequest>>,
        failures: Mutex<Vec<Error>>,
    }

    #[async_trait]
    impl CompletionProvider for Echo {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(err) = self.failures.lock().unwrap().pop() {
                return Err(err);
            }
            let last = request.messages.last().unwrap();
            Ok(format!("odpověď na: {}", last.content))
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleep for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    const MANUAL: &str = "Obsah\n\
        Bezpečnostní pokyny\n\
        Čištění filtru: filtr vyjměte a propláchněte.\n\
        Technické údaje: napětí 230 V";

    fn session(provider: &Arc<Echo>) -> Session {
        let chunking = ChunkingConfig {
            chunk_size: 30,
            overlap: 0,
        };
        let retrieval = RetrievalConfig {
            baseline_chars: 25,
            max_context_chars: 200,
        };
        Session::new(chunking, retrieval)
            .with_provider(provider.clone())
            .with_sleeper(Arc::new(NoSleep))
    }

    #[tokio::test]
    async fn unconfigured_is_checked_before_document() {
        let session = Session::default();
        let err = session.answer("filtr", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Unconfigured));
    }

    #[tokio::test]
    async fn missing_document_is_reported() {
        let provider = Arc::new(Echo::default());
        let session = session(&provider);
        let err = session.answer("filtr", &[]).await.unwrap_err();
        assert!(matches!(err, Error::EmptyDocument));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_document_counts_as_empty() {
        let provider = Arc::new(Echo::default());
        let session = session(&provider);
        let summary = session.load_text("prázdný.txt", "\n \n".to_string());
        assert_eq!(summary.chunks, 0);
        assert!(matches!(
            session.answer("filtr", &[]).await,
            Err(Error::EmptyDocument)
        ));
    }

    #[tokio::test]
    async fn answer_sends_context_and_history() {
        let provider = Arc::new(Echo::default());
        let session = session(&provider);
        session.load_text("návod.txt", MANUAL.to_string());

        let history =
            vec![Message::user("ahoj"), Message::assistant("dobrý den")];
        let answer = session
            .answer("Jak vyčistit filtr?", &history)
            .await
            .unwrap();
        assert_eq!(answer, "odpověď na: Jak vyčistit filtr?");

        let requests = provider.requests.lock().unwrap();
        let request = &requests[0];
        assert!(request.system.starts_with("Jsi užitečný AI asistent"));
        assert!(request.system.contains("Relevantní části dokumentu:\nObsah"));
        assert!(request.system.contains("filtr vyjměte"));
        assert!(!request.system.contains("230 V"));
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0], Message::user("ahoj"));
    }

    #[tokio::test]
    async fn rate_limits_are_retried_through_the_session() {
        let provider = Arc::new(Echo::default());
        provider.failures.lock().unwrap().push(Error::RateLimited {
            retry_after: None,
            message: "busy".into(),
        });
        let session = session(&provider);
        session.load_text("návod.txt", MANUAL.to_string());

        session.answer("filtr", &[]).await.unwrap();
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn conversation_appends_only_successful_turns() {
        let provider = Arc::new(Echo::default());
        let session = session(&provider);
        session.load_text("návod.txt", MANUAL.to_string());
        let mut conversation = Conversation::new();

        conversation.ask(&session, "filtr").await.unwrap();
        assert_eq!(conversation.history().len(), 2);

        provider
            .failures
            .lock()
            .unwrap()
            .push(Error::Upstream("500: boom".into()));
        assert!(conversation.ask(&session, "údaje").await.is_err());
        assert_eq!(conversation.history().len(), 2);

        conversation.ask(&session, "údaje").await.unwrap();
        let history = conversation.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2], Message::user("údaje"));
    }

    #[test]
    fn context_without_document_is_empty_document() {
        assert!(matches!(
            Session::default().context("filtr"),
            Err(Error::EmptyDocument)
        ));
    }

    #[test]
    fn loading_replaces_previous_document() {
        let session = Session::default();
        session.load_text("a.txt", "první dokument".to_string());
        let summary = session.load_text("b.txt", "druhý dokument".to_string());

        assert_eq!(summary.name, "b.txt");
        assert_eq!(session.document().unwrap().name, "b.txt");
        let context = session.context("dokument").unwrap();
        assert_eq!(context.text, "druhý dokument");
    }

    #[test]
    fn provider_can_be_removed() {
        let provider = Arc::new(Echo::default());
        let session = session(&provider);
        assert!(session.is_configured());
        session.set_provider(None);
        assert!(!session.is_configured());
    }

    #[test]
    fn load_file_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manual.md");
        std::fs::write(&path, MANUAL).unwrap();

        let session = Session::default();
        let summary = session.load_file(&path).unwrap();
        assert_eq!(summary.name, "manual.md");
        assert_eq!(summary.chunks, 1);
    }
}
