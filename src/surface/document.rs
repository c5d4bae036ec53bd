use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::content::{ContentSurface, FieldEvent, FieldId, FormId, InputField, InputKind};

#[derive(Clone, Debug)]
struct DocumentField {
    kind: InputKind,
    form: Option<FormId>,
    value: String,
    events: Vec<FieldEvent>,
}

/// Headless content surface: a flat list of input fields grouped into forms.
///
/// Records values, notifications, form submissions and injected styles so the
/// daemon can log them and tests can inspect them.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocument {
    fields: Vec<DocumentField>,
    forms: usize,
    submissions: Vec<(FormId, Vec<String>)>,
    styles: Vec<String>,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a form and return its id.
    pub fn add_form(&mut self) -> FormId {
        self.forms += 1;
        FormId(self.forms - 1)
    }

    /// Add an input with the given `type` attribute, optionally inside a form.
    pub fn add_input(&mut self, type_attr: &str, form: Option<FormId>) -> FieldId {
        self.fields.push(DocumentField {
            kind: InputKind::from_type_attr(type_attr),
            form,
            value: String::new(),
            events: Vec::new(),
        });
        FieldId(self.fields.len() - 1)
    }

    /// A single search form, the shape of a typical lookup page.
    pub fn search_page() -> Self {
        let mut doc = Self::new();
        let form = doc.add_form();
        doc.add_input("search", Some(form));
        doc
    }

    pub fn value(&self, field: FieldId) -> Option<&str> {
        self.fields.get(field.0).map(|f| f.value.as_str())
    }

    pub fn events(&self, field: FieldId) -> &[FieldEvent] {
        self.fields
            .get(field.0)
            .map(|f| f.events.as_slice())
            .unwrap_or(&[])
    }

    /// Submitted forms with the values of their fields at submit time.
    pub fn submissions(&self) -> &[(FormId, Vec<String>)] {
        &self.submissions
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    fn field_mut(&mut self, field: FieldId) -> Result<&mut DocumentField> {
        self.fields
            .get_mut(field.0)
            .ok_or_else(|| anyhow!("no input field {:?}", field))
    }
}

impl ContentSurface for InMemoryDocument {
    fn input_fields(&self) -> Result<Vec<InputField>> {
        Ok(self
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| InputField {
                id: FieldId(index),
                kind: field.kind.clone(),
                form: field.form,
            })
            .collect())
    }

    fn set_value(&mut self, field: FieldId, value: &str) -> Result<()> {
        self.field_mut(field)?.value = value.to_string();
        Ok(())
    }

    fn notify(&mut self, field: FieldId, event: FieldEvent) -> Result<()> {
        self.field_mut(field)?.events.push(event);
        Ok(())
    }

    fn submit_form(&mut self, form: FormId) -> Result<()> {
        if form.0 >= self.forms {
            return Err(anyhow!("no form {:?}", form));
        }
        let values = self
            .fields
            .iter()
            .filter(|field| field.form == Some(form))
            .map(|field| field.value.clone())
            .collect();
        self.submissions.push((form, values));
        Ok(())
    }

    fn inject_style(&mut self, css: &str) -> Result<()> {
        self.styles.push(css.to_string());
        Ok(())
    }
}

/// `InMemoryDocument` shared between the surface thread and an observer.
#[derive(Clone, Debug, Default)]
pub struct SharedDocument {
    inner: Arc<Mutex<InMemoryDocument>>,
}

impl SharedDocument {
    pub fn new(document: InMemoryDocument) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, InMemoryDocument>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("document lock poisoned"))
    }
}

impl ContentSurface for SharedDocument {
    fn input_fields(&self) -> Result<Vec<InputField>> {
        self.lock()?.input_fields()
    }

    fn set_value(&mut self, field: FieldId, value: &str) -> Result<()> {
        self.lock()?.set_value(field, value)
    }

    fn notify(&mut self, field: FieldId, event: FieldEvent) -> Result<()> {
        self.lock()?.notify(field, event)
    }

    fn submit_form(&mut self, form: FormId) -> Result<()> {
        self.lock()?.submit_form(form)
    }

    fn inject_style(&mut self, css: &str) -> Result<()> {
        self.lock()?.inject_style(css)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::content::{inject_text, InjectOutcome, SearchOrTextInput};

    #[test]
    fn fills_and_submits_first_search_field() -> Result<()> {
        let mut doc = InMemoryDocument::search_page();
        let outcome = inject_text(&mut doc, &SearchOrTextInput, "INV-2024")?;

        assert_eq!(
            outcome,
            InjectOutcome::Submitted {
                field: FieldId(0),
                form: FormId(0)
            }
        );
        assert_eq!(doc.value(FieldId(0)), Some("INV-2024"));
        assert_eq!(doc.events(FieldId(0)), &[FieldEvent::Input, FieldEvent::Change]);
        assert_eq!(doc.submissions(), &[(FormId(0), vec!["INV-2024".to_string()])]);
        Ok(())
    }

    #[test]
    fn skips_unmatched_inputs() -> Result<()> {
        let mut doc = InMemoryDocument::new();
        let form = doc.add_form();
        let password = doc.add_input("password", Some(form));
        let query = doc.add_input("text", Some(form));

        let outcome = inject_text(&mut doc, &SearchOrTextInput, "abc")?;
        assert_eq!(outcome, InjectOutcome::Submitted { field: query, form });
        assert_eq!(doc.value(password), Some(""));
        Ok(())
    }

    #[test]
    fn stops_after_first_submitted_form() -> Result<()> {
        let mut doc = InMemoryDocument::new();
        let first = doc.add_form();
        let second = doc.add_form();
        let a = doc.add_input("search", Some(first));
        let b = doc.add_input("search", Some(second));

        inject_text(&mut doc, &SearchOrTextInput, "abc")?;
        assert_eq!(doc.value(a), Some("abc"));
        assert_eq!(doc.value(b), Some(""));
        assert_eq!(doc.submissions().len(), 1);
        Ok(())
    }

    #[test]
    fn formless_fields_are_filled_until_a_form_is_found() -> Result<()> {
        let mut doc = InMemoryDocument::new();
        let loose = doc.add_input("text", None);
        let form = doc.add_form();
        let inside = doc.add_input("search", Some(form));

        let outcome = inject_text(&mut doc, &SearchOrTextInput, "abc")?;
        assert_eq!(outcome, InjectOutcome::Submitted { field: inside, form });
        assert_eq!(doc.value(loose), Some("abc"));
        Ok(())
    }

    #[test]
    fn reports_fields_filled_without_form() -> Result<()> {
        let mut doc = InMemoryDocument::new();
        doc.add_input("text", None);
        doc.add_input("search", None);
        let outcome = inject_text(&mut doc, &SearchOrTextInput, "abc")?;
        assert_eq!(outcome, InjectOutcome::FilledWithoutSubmit { fields: 2 });
        assert!(doc.submissions().is_empty());
        Ok(())
    }

    #[test]
    fn reports_missing_field() -> Result<()> {
        let mut doc = InMemoryDocument::new();
        doc.add_input("checkbox", None);
        let outcome = inject_text(&mut doc, &SearchOrTextInput, "abc")?;
        assert_eq!(outcome, InjectOutcome::NoMatchingField);
        Ok(())
    }
}
