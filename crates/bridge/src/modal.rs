use std::collections::HashMap;

use promptdock_core::PromptVariable;

/// Pre-fill for a variable control: the declared default, or the first
/// option for selects.
pub(crate) fn declared_default(variable: &PromptVariable) -> String {
    variable
        .default_value
        .clone()
        .or_else(|| variable.options.first().cloned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct FieldState {
    pub variable: PromptVariable,
    pub value: String,
}

enum ModalState {
    Open,
    Resolved(Option<HashMap<String, String>>),
}

/// Declarative variable dialog: one control per declared variable,
/// resolving exactly once. The host surface renders `fields()` and reports
/// user actions; the modal itself never touches the page.
///
/// Every exit path (submit, cancel, overlay click, close button) unmounts
/// the dialog. That is a contract, not a courtesy: a leaked overlay would
/// block the page's input until reload.
pub struct VariableModal {
    fields: Vec<FieldState>,
    state: ModalState,
    mounted: bool,
}

impl VariableModal {
    pub fn open(variables: &[PromptVariable]) -> Self {
        let fields = variables
            .iter()
            .map(|v| FieldState {
                value: declared_default(v),
                variable: v.clone(),
            })
            .collect();
        Self {
            fields,
            state: ModalState::Open,
            mounted: true,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn fields(&self) -> &[FieldState] {
        &self.fields
    }

    /// Update one control's value. Unknown names and resolved dialogs are
    /// ignored; returns whether the edit applied.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        if !matches!(self.state, ModalState::Open) {
            return false;
        }
        match self.fields.iter_mut().find(|f| f.variable.name == name) {
            Some(field) => {
                field.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn submit(&mut self) {
        let values = self
            .fields
            .iter()
            .map(|f| (f.variable.name.clone(), f.value.clone()))
            .collect();
        self.resolve(Some(values));
    }

    pub fn cancel(&mut self) {
        self.resolve(None);
    }

    pub fn click_overlay(&mut self) {
        self.resolve(None);
    }

    pub fn click_close(&mut self) {
        self.resolve(None);
    }

    /// The single resolution: `Some(values)` on submit, `None` on any
    /// dismissal. Yields nothing while the dialog is still open.
    pub fn take_resolution(&mut self) -> Option<Option<HashMap<String, String>>> {
        match std::mem::replace(&mut self.state, ModalState::Open) {
            ModalState::Open => None,
            ModalState::Resolved(values) => {
                self.state = ModalState::Resolved(None);
                Some(values)
            }
        }
    }

    fn resolve(&mut self, values: Option<HashMap<String, String>>) {
        if matches!(self.state, ModalState::Resolved(_)) {
            return;
        }
        self.state = ModalState::Resolved(values);
        self.mounted = false;
    }
}
