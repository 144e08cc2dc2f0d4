//! Renewal Manager: keeps a fresh token behind every key field.
//!
//! Each key field drives a small state machine keyed by its token field:
//!
//! - **Dormant**: the trimmed key value is empty. Submission is disabled and
//!   there is neither a request nor a timer.
//! - **Renewing**: a fetch has been handed out and a timer is armed to run
//!   the same routine again `expiry - 2s` later.
//!
//! Every transition (wiring, value change, timer expiry) disables the owning
//! form's submission, cancels the previous timer and bumps the token field's
//! generation. Events carrying an older generation are stale and ignored.
//! The manager never enables submission; that is left to the Submit Gate
//! once a token has actually been written.

pub mod timer;

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::controller::Event;
use crate::document::Document;
use crate::encoding::request_identifier;
use crate::error::{FtokenError, FtokenResult};
use crate::fetch::FetchRequest;

pub use timer::RenewalTimer;

/// Configuration of a key field, resolved once when the field is wired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFieldConfig {
    pub key_field_id: String,
    pub token_field_id: String,
    /// Form containing the key field
    pub form_id: String,
    pub url_base: String,
    pub wrap: String,
}

impl KeyFieldConfig {
    /// Resolves the token field and form a key field refers to
    pub fn resolve(document: &Document, key_field_id: &str) -> FtokenResult<Self> {
        let (form, key) = document
            .key_field(key_field_id)
            .ok_or_else(|| FtokenError::UnknownKeyField(key_field_id.to_string()))?;
        let token = document
            .token_field(&key.token_field_id)
            .ok_or_else(|| FtokenError::UnknownTokenField(key.token_field_id.clone()))?;

        url::Url::parse(&token.url).map_err(|e| FtokenError::InvalidUrlBase {
            field: token.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            key_field_id: key_field_id.to_string(),
            token_field_id: token.id.clone(),
            form_id: form.id.clone(),
            url_base: token.url.clone(),
            wrap: token.wrap.clone(),
        })
    }

    /// `<url_base>/<request_id>/<token_field_id>/<form_id>`
    pub fn fetch_url(&self, request_id: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.url_base, request_id, self.token_field_id, self.form_id
        )
    }
}

/// A fetch the controller must start, tagged with the generation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub request: FetchRequest,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalState {
    Dormant,
    Renewing,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    timer: Option<RenewalTimer>,
}

/// Owns the renewal timers, one slot per token field
pub struct RenewalManager {
    configs: HashMap<String, KeyFieldConfig>,
    slots: HashMap<String, Slot>,
    next_generation: u64,
    renewal_delay: Duration,
    events: UnboundedSender<Event>,
}

impl RenewalManager {
    pub fn new(renewal_delay: Duration, events: UnboundedSender<Event>) -> Self {
        Self {
            configs: HashMap::new(),
            slots: HashMap::new(),
            next_generation: 0,
            renewal_delay,
            events,
        }
    }

    /// Wires every key field that still carries its marker, in document order.
    ///
    /// Each newly wired field runs the renewal routine once, so pre-filled
    /// values get a token straight away.
    pub fn wire_all(&mut self, document: &mut Document) -> Vec<PendingFetch> {
        let mut unwired = Vec::new();
        for form in &mut document.forms {
            for field in &mut form.key_fields {
                if field.needs_wiring {
                    field.needs_wiring = false;
                    unwired.push((field.id.clone(), form.id.clone()));
                }
            }
        }

        let mut fetches = Vec::new();
        for (key_field_id, form_id) in unwired {
            let config = match KeyFieldConfig::resolve(document, &key_field_id) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Key field {} left unwired: {}", key_field_id, e);
                    // No token can ever be fetched for it, keep the form closed
                    if let Some(form) = document.form_mut(&form_id) {
                        form.set_submit_disabled(true);
                    }
                    self.configs.remove(&key_field_id);
                    continue;
                }
            };

            log::info!(
                "Wired key field {} -> token field {} (form {})",
                config.key_field_id,
                config.token_field_id,
                config.form_id
            );
            let token_field_id = config.token_field_id.clone();
            let previous = self.configs.insert(key_field_id.clone(), config);
            if let Some(previous) = previous {
                if previous.token_field_id != token_field_id {
                    log::debug!(
                        "Key field {} moved from {} to {}",
                        key_field_id,
                        previous.token_field_id,
                        token_field_id
                    );
                    self.forget_if_orphaned(&previous.token_field_id);
                }
            }

            match self.renew(document, &key_field_id) {
                Ok(Some(fetch)) => fetches.push(fetch),
                Ok(None) => {}
                Err(e) => log::warn!("Initial renewal of {} failed: {}", key_field_id, e),
            }
        }

        fetches
    }

    /// The renewal routine for one key field.
    ///
    /// Returns the fetch to start, or `None` when the key is empty and the
    /// pair went dormant.
    pub fn renew(
        &mut self,
        document: &mut Document,
        key_field_id: &str,
    ) -> FtokenResult<Option<PendingFetch>> {
        let config = self
            .configs
            .get(key_field_id)
            .cloned()
            .ok_or_else(|| FtokenError::UnknownKeyField(key_field_id.to_string()))?;

        let Some(value) = document
            .key_field(key_field_id)
            .map(|(_, field)| field.value.clone())
        else {
            log::debug!("Key field {} was removed, dropping its renewal", key_field_id);
            self.configs.remove(key_field_id);
            self.forget_if_orphaned(&config.token_field_id);
            return Ok(None);
        };

        if let Some(form) = document.form_mut(&config.form_id) {
            form.set_submit_disabled(true);
        }
        // The old token belongs to the previous key value
        if let Some(token) = document.token_field_mut(&config.token_field_id) {
            token.value = None;
        }

        let generation = self.retire(&config.token_field_id);

        if value.trim().is_empty() {
            log::debug!(
                "Key field {} is empty, token field {} dormant",
                key_field_id,
                config.token_field_id
            );
            return Ok(None);
        }

        let request_id = request_identifier(&value);
        let request = FetchRequest {
            token_field_id: config.token_field_id.clone(),
            url: config.fetch_url(&request_id),
            wrap: config.wrap.clone(),
        };

        let timer = RenewalTimer::arm(
            self.renewal_delay,
            self.events.clone(),
            Event::TimerExpired {
                key_field: key_field_id.to_string(),
                token_field: config.token_field_id.clone(),
                generation,
            },
        );
        if let Some(slot) = self.slots.get_mut(&config.token_field_id) {
            slot.timer = Some(timer);
        }

        log::debug!(
            "Requesting token {} for {} (renewal in {:?})",
            request_id,
            config.token_field_id,
            self.renewal_delay
        );

        Ok(Some(PendingFetch {
            request,
            generation,
        }))
    }

    /// Handles a fired timer; stale timers are ignored
    pub fn on_timer_expired(
        &mut self,
        document: &mut Document,
        key_field_id: &str,
        token_field_id: &str,
        generation: u64,
    ) -> FtokenResult<Option<PendingFetch>> {
        if !self.is_current(token_field_id, generation) {
            log::debug!("Ignoring superseded timer for {}", token_field_id);
            return Ok(None);
        }

        log::debug!("Renewing token for {} before expiry", token_field_id);
        self.renew(document, key_field_id)
    }

    /// Cancels the slot's timer and starts a new generation for it
    fn retire(&mut self, token_field_id: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;

        let slot = self
            .slots
            .entry(token_field_id.to_string())
            .or_insert(Slot {
                generation,
                timer: None,
            });
        if let Some(timer) = slot.timer.take() {
            timer.cancel();
        }
        slot.generation = generation;

        generation
    }

    /// Drops the slot of a token field no wired key field feeds any more.
    ///
    /// The timer is cancelled and late fetch results no longer match any
    /// generation.
    fn forget_if_orphaned(&mut self, token_field_id: &str) {
        if self
            .configs
            .values()
            .any(|config| config.token_field_id == token_field_id)
        {
            return;
        }
        if let Some(slot) = self.slots.remove(token_field_id) {
            if let Some(timer) = slot.timer {
                timer.cancel();
            }
        }
    }

    /// True when `generation` is the latest one issued for the token field
    pub fn is_current(&self, token_field_id: &str, generation: u64) -> bool {
        self.slots
            .get(token_field_id)
            .is_some_and(|slot| slot.generation == generation)
    }

    pub fn is_wired(&self, key_field_id: &str) -> bool {
        self.configs.contains_key(key_field_id)
    }

    pub fn config(&self, key_field_id: &str) -> Option<&KeyFieldConfig> {
        self.configs.get(key_field_id)
    }

    pub fn state(&self, token_field_id: &str) -> Option<RenewalState> {
        self.slots.get(token_field_id).map(|slot| match slot.timer {
            Some(_) => RenewalState::Renewing,
            None => RenewalState::Dormant,
        })
    }

    pub fn has_live_timer(&self, token_field_id: &str) -> bool {
        self.slots
            .get(token_field_id)
            .and_then(|slot| slot.timer.as_ref())
            .is_some_and(RenewalTimer::is_live)
    }

    /// Number of timers that have not fired or been cancelled
    pub fn live_timers(&self) -> usize {
        self.slots
            .values()
            .filter_map(|slot| slot.timer.as_ref())
            .filter(|timer| timer.is_live())
            .count()
    }

    pub fn timer_delay(&self, token_field_id: &str) -> Option<Duration> {
        self.slots
            .get(token_field_id)
            .and_then(|slot| slot.timer.as_ref())
            .map(RenewalTimer::delay)
    }

    /// Cancels every timer; used on shutdown
    pub fn cancel_all(&mut self) {
        for slot in self.slots.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
            }
        }
    }
}
