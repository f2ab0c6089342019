use async_trait::async_trait;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use super::journal::{JournalEntry, JournalTap, RequestJournal};
use super::StubTarget;
use crate::error::{LoaderError, Result};
use crate::matching::{BodyMatcher, HeaderMatcher, MethodMatcher, UrlMatcher};
use crate::stub::{DelayDistribution, ResponseDefinition, StubRule};
use crate::template::{ResponseTemplater, TemplateRequest};

/// Settings for the in-process server
#[derive(Debug, Clone)]
pub struct EmbeddedOptions {
    /// Most recent requests kept in the journal; 0 keeps none
    pub journal_entries: usize,
}

impl Default for EmbeddedOptions {
    fn default() -> Self {
        Self {
            journal_entries: 200,
        }
    }
}

/// `wiremock::MockServer` started on an ephemeral localhost port
pub struct EmbeddedTarget {
    server: RwLock<Option<MockServer>>,
    address: SocketAddr,
    delay: Arc<parking_lot::RwLock<Option<DelayDistribution>>>,
    templater: Arc<ResponseTemplater>,
    journal: Arc<RequestJournal>,
}

impl EmbeddedTarget {
    pub async fn start(options: &EmbeddedOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").map_err(LoaderError::Bind)?;
        listener.set_nonblocking(true).map_err(LoaderError::Bind)?;
        let address = listener.local_addr().map_err(LoaderError::Bind)?;

        // wiremock's own journal is unbounded
        let server = MockServer::builder()
            .listener(listener)
            .disable_request_recording()
            .start()
            .await;

        let target = Self {
            server: RwLock::new(Some(server)),
            address,
            delay: Arc::new(parking_lot::RwLock::new(None)),
            templater: Arc::new(ResponseTemplater::new()),
            journal: Arc::new(RequestJournal::new(options.journal_entries)),
        };
        if let Some(server) = target.server.read().await.as_ref() {
            target.mount_journal(server).await;
        }

        info!(%address, journal_entries = options.journal_entries, "embedded mock server started");
        Ok(target)
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Most recent requests received, oldest first
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.entries()
    }

    async fn mount_journal(&self, server: &MockServer) {
        if self.journal.capacity() == 0 {
            return;
        }
        server
            .register(
                Mock::given(JournalTap(Arc::clone(&self.journal)))
                    .respond_with(ResponseTemplate::new(500))
                    .with_priority(1),
            )
            .await;
    }

    /// Translate a rule into a mounted-ready `wiremock` mock
    fn build_mock(&self, rule: &StubRule) -> Result<Mock> {
        let request = &rule.request;
        let mut builder = Mock::given(MethodMatcher(request.method));

        if let Some(url) = UrlMatcher::compile(request)? {
            builder = builder.and(url);
        }
        for (name, predicate) in &request.headers {
            builder = builder.and(HeaderMatcher::compile(name, predicate)?);
        }
        for predicate in &request.body_patterns {
            builder = builder.and(BodyMatcher::compile(predicate)?);
        }

        let templated = rule.response.is_templated();
        if templated {
            if let Some(body) = &rule.response.body {
                self.templater.validate(body)?;
            }
        }

        let mut mock = builder.respond_with(StubResponder {
            response: rule.response.clone(),
            templated,
            templater: Arc::clone(&self.templater),
            delay: Arc::clone(&self.delay),
        });
        if let Some(priority) = rule.priority {
            mock = mock.with_priority(priority);
        }
        Ok(mock)
    }
}

#[async_trait]
impl StubTarget for EmbeddedTarget {
    async fn register(&self, rule: &StubRule) -> Result<()> {
        let mock = self.build_mock(rule)?;
        let guard = self.server.read().await;
        let server = guard.as_ref().ok_or(LoaderError::TargetStopped)?;
        server.register(mock).await;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let guard = self.server.read().await;
        let server = guard.as_ref().ok_or(LoaderError::TargetStopped)?;
        server.reset().await;
        self.mount_journal(server).await;
        debug!(address = %self.address, "embedded mock server reset");
        Ok(())
    }

    async fn set_global_random_delay(&self, delay: DelayDistribution) -> Result<()> {
        *self.delay.write() = Some(delay);
        Ok(())
    }

    fn base_url(&self) -> String {
        format!("http://localhost:{}/", self.address.port())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(server) = self.server.write().await.take() {
            drop(server);
            info!(address = %self.address, "embedded mock server stopped");
        }
        Ok(())
    }
}

/// Produces a rule's response, rendering templates and applying the
/// server-wide delay per request
struct StubResponder {
    response: ResponseDefinition,
    templated: bool,
    templater: Arc<ResponseTemplater>,
    delay: Arc<parking_lot::RwLock<Option<DelayDistribution>>>,
}

impl Respond for StubResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = match (&self.response.body, self.templated) {
            (Some(template), true) => {
                match self
                    .templater
                    .render(template, &TemplateRequest::from_wiremock(request))
                {
                    Ok(rendered) => Some(rendered),
                    Err(e) => {
                        warn!(error = %e, url = %request.url, "response template failed");
                        return ResponseTemplate::new(500).set_body_string(e.to_string());
                    }
                }
            }
            (body, _) => body.clone(),
        };

        let mut template = ResponseTemplate::new(self.response.status);
        for (name, value) in &self.response.headers {
            template = template.insert_header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            template = template.set_body_bytes(body.into_bytes());
        }
        if let Some(delay) = *self.delay.read() {
            template = template.set_delay(delay.sample(&mut rand::thread_rng()));
        }
        template
    }
}
