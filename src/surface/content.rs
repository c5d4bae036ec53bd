use anyhow::Result;

/// Style directive applied once after content load to hide scrollbars.
pub const SCROLLBAR_SUPPRESSION_CSS: &str = "::-webkit-scrollbar { display: none; }";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormId(pub usize);

/// Declared type of an input element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    Search,
    Text,
    Other(String),
}

impl InputKind {
    /// Parse an input `type` attribute. A missing or empty attribute is `text`.
    pub fn from_type_attr(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "text" => InputKind::Text,
            "search" => InputKind::Search,
            _ => InputKind::Other(value),
        }
    }
}

/// Input element as listed by a content surface, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputField {
    pub id: FieldId,
    pub kind: InputKind,
    /// Enclosing form, if any.
    pub form: Option<FormId>,
}

/// Notifications raised on a field after its value changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldEvent {
    Input,
    Change,
}

/// Document-like surface that accepts injected text.
pub trait ContentSurface: Send {
    /// Input elements in document order.
    fn input_fields(&self) -> Result<Vec<InputField>>;

    fn set_value(&mut self, field: FieldId, value: &str) -> Result<()>;

    fn notify(&mut self, field: FieldId, event: FieldEvent) -> Result<()>;

    fn submit_form(&mut self, form: FormId) -> Result<()>;

    fn inject_style(&mut self, css: &str) -> Result<()>;
}

/// Strategy deciding which input fields receive recognized text.
pub trait FieldMatcher: Send {
    fn matches(&self, field: &InputField) -> bool;
}

/// Matches `search` and `text` inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchOrTextInput;

impl FieldMatcher for SearchOrTextInput {
    fn matches(&self, field: &InputField) -> bool {
        matches!(field.kind, InputKind::Search | InputKind::Text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InjectOutcome {
    /// A matching field was filled and its form submitted.
    Submitted { field: FieldId, form: FormId },
    /// Matching fields were filled but none had a form that could be submitted.
    FilledWithoutSubmit { fields: usize },
    NoMatchingField,
}

/// Fill matching fields in document order until one form is submitted.
///
/// Each matching field gets the value plus `input` and `change` notifications.
/// The walk stops at the first field whose enclosing form was submitted.
/// Failures on individual fields are logged and the walk moves on.
pub fn inject_text(
    surface: &mut dyn ContentSurface,
    matcher: &dyn FieldMatcher,
    text: &str,
) -> Result<InjectOutcome> {
    let mut filled = 0usize;
    for field in surface.input_fields()? {
        if !matcher.matches(&field) {
            continue;
        }
        if let Err(err) = fill_field(surface, field.id, text) {
            log::warn!("surface: failed to fill field {:?}: {:#}", field.id, err);
            continue;
        }
        filled += 1;

        let Some(form) = field.form else {
            continue;
        };
        match surface.submit_form(form) {
            Ok(()) => {
                log::info!("surface: form {:?} submitted with: {}", form, text);
                return Ok(InjectOutcome::Submitted {
                    field: field.id,
                    form,
                });
            }
            Err(err) => log::warn!("surface: failed to submit form {:?}: {:#}", form, err),
        }
    }

    if filled == 0 {
        Ok(InjectOutcome::NoMatchingField)
    } else {
        Ok(InjectOutcome::FilledWithoutSubmit { fields: filled })
    }
}

fn fill_field(surface: &mut dyn ContentSurface, field: FieldId, text: &str) -> Result<()> {
    surface.set_value(field, text)?;
    surface.notify(field, FieldEvent::Input)?;
    surface.notify(field, FieldEvent::Change)?;
    Ok(())
}
