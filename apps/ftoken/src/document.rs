//! In-memory model of the forms an ftoken client manages.
//!
//! A [`Document`] is an ordered list of forms. Each form carries its submit
//! controls, the key fields whose values select a token, and the token
//! fields that receive issued tokens. Fields arrive with a transient marker
//! (`needs_wiring` / `needs_gating`) that the watchers strip the first time
//! they see the field, so a field is processed once per appearance.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FtokenError, FtokenResult};

fn default_true() -> bool {
    true
}

/// A token as produced by the issuing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Form field name, `ftoken.<expiry>` on the reference server
    pub name: String,
    pub value: String,
}

impl IssuedToken {
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// A submit-type control; disabled unless stated otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitControl {
    pub name: String,
    #[serde(default = "default_true")]
    pub disabled: bool,
}

/// Input whose value determines the token's request identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyField {
    pub id: String,
    /// Token field this key feeds
    pub token_field_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_true")]
    pub needs_wiring: bool,
}

/// Field that receives and stores the issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenField {
    pub id: String,
    /// Form whose submission this token gates
    pub form_id: String,
    /// Base of the issuing endpoint
    pub url: String,
    /// Wrap parameter forwarded to the fetcher
    #[serde(default)]
    pub wrap: String,
    #[serde(default)]
    pub value: Option<IssuedToken>,
    #[serde(default = "default_true")]
    pub needs_gating: bool,
}

impl TokenField {
    pub fn has_token(&self) -> bool {
        self.value.as_ref().is_some_and(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    #[serde(default)]
    pub submit_controls: Vec<SubmitControl>,
    #[serde(default)]
    pub key_fields: Vec<KeyField>,
    #[serde(default)]
    pub token_fields: Vec<TokenField>,
}

impl Form {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submit_controls: Vec::new(),
            key_fields: Vec::new(),
            token_fields: Vec::new(),
        }
    }

    pub fn with_submit(mut self, name: impl Into<String>) -> Self {
        self.submit_controls.push(SubmitControl {
            name: name.into(),
            disabled: true,
        });
        self
    }

    pub fn with_key_field(
        mut self,
        id: impl Into<String>,
        token_field_id: impl Into<String>,
    ) -> Self {
        self.key_fields.push(KeyField {
            id: id.into(),
            token_field_id: token_field_id.into(),
            value: String::new(),
            needs_wiring: true,
        });
        self
    }

    /// Adds a token field gating this form
    pub fn with_token_field(mut self, id: impl Into<String>, url: impl Into<String>) -> Self {
        let form_id = self.id.clone();
        self.token_fields.push(TokenField {
            id: id.into(),
            form_id,
            url: url.into(),
            wrap: String::new(),
            value: None,
            needs_gating: true,
        });
        self
    }

    /// Enables or disables every submit control of the form
    pub fn set_submit_disabled(&mut self, disabled: bool) {
        for control in &mut self.submit_controls {
            control.disabled = disabled;
        }
    }

    /// True when the form has submit controls and none is disabled
    pub fn is_submittable(&self) -> bool {
        !self.submit_controls.is_empty() && self.submit_controls.iter().all(|c| !c.disabled)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub forms: Vec<Form>,
}

impl Document {
    pub fn new(forms: Vec<Form>) -> Self {
        Self { forms }
    }

    /// Parses a JSON document layout
    pub fn from_json_str(json: &str) -> FtokenResult<Self> {
        let document: Self = serde_json::from_str(json)?;
        document.check_unique_ids()?;
        Ok(document)
    }

    /// Reads a JSON document layout from disk
    pub fn from_json_file(path: &Path) -> FtokenResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn check_unique_ids(&self) -> FtokenResult<()> {
        let mut seen = std::collections::HashSet::new();
        for form in &self.forms {
            if !seen.insert(("form", form.id.as_str())) {
                return Err(FtokenError::Layout(format!("duplicate form id {}", form.id)));
            }
            let fields = form
                .key_fields
                .iter()
                .map(|f| f.id.as_str())
                .chain(form.token_fields.iter().map(|f| f.id.as_str()));
            for id in fields {
                if !seen.insert(("field", id)) {
                    return Err(FtokenError::Layout(format!("duplicate field id {}", id)));
                }
            }
        }
        Ok(())
    }

    pub fn form(&self, id: &str) -> Option<&Form> {
        self.forms.iter().find(|f| f.id == id)
    }

    pub fn form_mut(&mut self, id: &str) -> Option<&mut Form> {
        self.forms.iter_mut().find(|f| f.id == id)
    }

    /// Looks up a key field together with the form containing it
    pub fn key_field(&self, id: &str) -> Option<(&Form, &KeyField)> {
        self.forms.iter().find_map(|form| {
            form.key_fields
                .iter()
                .find(|f| f.id == id)
                .map(|field| (form, field))
        })
    }

    pub fn key_field_mut(&mut self, id: &str) -> Option<&mut KeyField> {
        self.forms
            .iter_mut()
            .flat_map(|form| form.key_fields.iter_mut())
            .find(|f| f.id == id)
    }

    pub fn token_field(&self, id: &str) -> Option<&TokenField> {
        self.forms
            .iter()
            .flat_map(|form| form.token_fields.iter())
            .find(|f| f.id == id)
    }

    pub fn token_field_mut(&mut self, id: &str) -> Option<&mut TokenField> {
        self.forms
            .iter_mut()
            .flat_map(|form| form.token_fields.iter_mut())
            .find(|f| f.id == id)
    }

    /// Applies a partial replacement: forms with a known id are swapped in
    /// place, the rest are appended in fragment order.
    pub fn merge(&mut self, fragment: Vec<Form>) {
        for form in fragment {
            match self.forms.iter_mut().find(|f| f.id == form.id) {
                Some(existing) => *existing = form,
                None => self.forms.push(form),
            }
        }
    }

    /// Sets the value of a key field
    pub fn set_key_value(&mut self, id: &str, value: &str) -> FtokenResult<()> {
        let field = self
            .key_field_mut(id)
            .ok_or_else(|| FtokenError::UnknownKeyField(id.to_string()))?;
        field.value = value.to_string();
        Ok(())
    }
}
