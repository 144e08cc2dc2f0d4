//! Submit Gate: enables a form's submit controls once a token is present.
//!
//! The gate never disables anything and has no timer or network side
//! effects. Disabling is the Renewal Manager's job.

use crate::document::Document;
use crate::error::FtokenError;

/// Runs the gate over every token field not yet seen, in document order.
///
/// Returns the ids of the forms whose submit controls were enabled.
pub fn run(document: &mut Document) -> Vec<String> {
    let mut pending = Vec::new();
    for form in &mut document.forms {
        for field in &mut form.token_fields {
            if field.needs_gating {
                field.needs_gating = false;
                pending.push((field.id.clone(), field.form_id.clone(), field.has_token()));
            }
        }
    }

    let mut enabled = Vec::new();
    for (field_id, form_id, has_token) in pending {
        let Some(form) = document.form_mut(&form_id) else {
            log::warn!(
                "Skipping token field {}: {}",
                field_id,
                FtokenError::UnknownForm(form_id)
            );
            continue;
        };

        if has_token {
            form.set_submit_disabled(false);
            log::debug!("Token already present in {}, submission enabled", field_id);
            enabled.push(form_id);
        }
    }

    enabled
}

/// Re-evaluates a single form after one of its tokens changed.
///
/// The form opens only when every token field gating it holds a token.
/// Returns true when the form's submit controls were enabled.
pub fn gate_form(document: &mut Document, form_id: &str) -> bool {
    let mut gating = document
        .forms
        .iter()
        .flat_map(|form| form.token_fields.iter())
        .filter(|field| field.form_id == form_id)
        .peekable();

    if gating.peek().is_none() || !gating.all(|field| field.has_token()) {
        return false;
    }

    match document.form_mut(form_id) {
        Some(form) => {
            form.set_submit_disabled(false);
            true
        }
        None => {
            log::warn!("{}", FtokenError::UnknownForm(form_id.to_string()));
            false
        }
    }
}
