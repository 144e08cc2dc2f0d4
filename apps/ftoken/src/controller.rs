//! Event loop tying the document, the watchers and the fetcher together.
//!
//! All state changes happen on one task, one event at a time. Timers and
//! fetches run on their own tasks and only ever post events back here.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::Config;
use crate::document::{Document, Form, IssuedToken};
use crate::error::{FetchError, FtokenError, FtokenResult};
use crate::fetch::TokenFetcher;
use crate::renewal::{PendingFetch, RenewalManager};
use crate::submit_gate;

/// Events processed by the [`Controller`]
#[derive(Debug)]
pub enum Event {
    /// Initial page load: gate, then wire
    PageReady,
    /// A partial replacement completed; forms are merged, then gate and wire
    ContentReplaced(Vec<Form>),
    /// The user committed a new value in a key field
    ValueChanged { key_field: String, value: String },
    /// A renewal timer fired
    TimerExpired {
        key_field: String,
        token_field: String,
        generation: u64,
    },
    /// A token request finished
    FetchCompleted {
        token_field: String,
        generation: u64,
        result: Result<IssuedToken, FetchError>,
    },
    Shutdown,
}

/// Cloneable sender used by embedders to drive a controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    events: UnboundedSender<Event>,
}

impl ControllerHandle {
    pub fn send(&self, event: Event) -> FtokenResult<()> {
        self.events
            .send(event)
            .map_err(|_| FtokenError::ControllerClosed)
    }

    pub fn page_ready(&self) -> FtokenResult<()> {
        self.send(Event::PageReady)
    }

    pub fn content_replaced(&self, fragment: Vec<Form>) -> FtokenResult<()> {
        self.send(Event::ContentReplaced(fragment))
    }

    pub fn value_changed(&self, key_field: &str, value: &str) -> FtokenResult<()> {
        self.send(Event::ValueChanged {
            key_field: key_field.to_string(),
            value: value.to_string(),
        })
    }

    pub fn shutdown(&self) -> FtokenResult<()> {
        self.send(Event::Shutdown)
    }
}

pub struct Controller<F> {
    document: Document,
    manager: RenewalManager,
    fetcher: Arc<F>,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
}

impl<F> Controller<F>
where
    F: TokenFetcher + 'static,
{
    pub fn new(config: &Config, document: Document, fetcher: F) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = RenewalManager::new(config.renewal_delay(), events_tx.clone());

        Self {
            document,
            manager,
            fetcher: Arc::new(fetcher),
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn manager(&self) -> &RenewalManager {
        &self.manager
    }

    /// Processes a single event
    pub fn process(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::PageReady => self.scan(),
            Event::ContentReplaced(fragment) => {
                log::debug!("Content replaced, {} form(s) merged", fragment.len());
                self.document.merge(fragment);
                self.scan();
            }
            Event::ValueChanged { key_field, value } => self.value_changed(&key_field, &value),
            Event::TimerExpired {
                key_field,
                token_field,
                generation,
            } => {
                match self.manager.on_timer_expired(
                    &mut self.document,
                    &key_field,
                    &token_field,
                    generation,
                ) {
                    Ok(Some(fetch)) => self.dispatch(fetch),
                    Ok(None) => {}
                    Err(e) => log::warn!("Renewal of {} failed: {}", token_field, e),
                }
            }
            Event::FetchCompleted {
                token_field,
                generation,
                result,
            } => self.fetch_completed(&token_field, generation, result),
            Event::Shutdown => {
                log::info!("Shutting down, cancelling renewal timers");
                self.manager.cancel_all();
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// Processes every event already queued, without waiting
    pub fn drain_pending(&mut self) -> ControlFlow<()> {
        let mut batch = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            batch.push(event);
        }
        self.process_batch(batch)
    }

    /// Runs until a [`Event::Shutdown`] is processed and returns the final document
    pub async fn run(mut self) -> Document {
        while let Some(first) = self.events_rx.recv().await {
            let mut batch = vec![first];
            while let Ok(event) = self.events_rx.try_recv() {
                batch.push(event);
            }
            if self.process_batch(batch).is_break() {
                break;
            }
        }

        self.manager.cancel_all();
        self.document
    }

    fn process_batch(&mut self, batch: Vec<Event>) -> ControlFlow<()> {
        for event in coalesce(batch) {
            if self.process(event).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // Gate first: a token rendered server-side must enable submission before
    // the renewal pass disables it again.
    fn scan(&mut self) {
        let enabled = submit_gate::run(&mut self.document);
        if !enabled.is_empty() {
            log::debug!("Submit gate enabled {:?}", enabled);
        }

        for fetch in self.manager.wire_all(&mut self.document) {
            self.dispatch(fetch);
        }
    }

    fn value_changed(&mut self, key_field: &str, value: &str) {
        if let Err(e) = self.document.set_key_value(key_field, value) {
            log::warn!("Ignoring value change: {}", e);
            return;
        }

        if !self.manager.is_wired(key_field) {
            log::debug!("Key field {} changed before wiring", key_field);
            return;
        }

        match self.manager.renew(&mut self.document, key_field) {
            Ok(Some(fetch)) => self.dispatch(fetch),
            Ok(None) => {}
            Err(e) => log::warn!("Renewal of {} failed: {}", key_field, e),
        }
    }

    fn dispatch(&self, fetch: PendingFetch) {
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let result = fetcher.fetch(&fetch.request).await;
            let _ = events.send(Event::FetchCompleted {
                token_field: fetch.request.token_field_id,
                generation: fetch.generation,
                result,
            });
        });
    }

    fn fetch_completed(
        &mut self,
        token_field: &str,
        generation: u64,
        result: Result<IssuedToken, FetchError>,
    ) {
        if !self.manager.is_current(token_field, generation) {
            log::debug!("Discarding superseded token response for {}", token_field);
            return;
        }

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                // Submission stays disabled; the next renewal tries again
                log::warn!("Token request for {} failed: {}", token_field, e);
                return;
            }
        };

        let Some(field) = self.document.token_field_mut(token_field) else {
            log::warn!("{}", FtokenError::UnknownTokenField(token_field.to_string()));
            return;
        };

        log::info!("Token {} issued for {}", token.name, token_field);
        field.value = Some(token);
        let form_id = field.form_id.clone();

        if submit_gate::gate_form(&mut self.document, &form_id) {
            log::debug!("Submission enabled for form {}", form_id);
        }
    }
}

/// Drops value changes overtaken by a later change of the same key field
/// within one batch, so only the committed value is requested.
fn coalesce(batch: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Event> = batch
        .into_iter()
        .rev()
        .filter(|event| match event {
            Event::ValueChanged { key_field, .. } => seen.insert(key_field.clone()),
            _ => true,
        })
        .collect();
    kept.reverse();
    kept
}
