//! The claim-appeal creation form.

use std::collections::HashSet;
use std::fmt::{self, Display};

use bytes::Bytes;
use rcm_model::{DenialLetter, LetterId, LetterStore};

/// A denial letter picked from disk, not yet stored anywhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UploadedFile {
    /// File name as picked by the user.
    pub file_name: String,
    /// MIME type, when the picker reports one.
    pub content_type: Option<String>,
    /// File content.
    pub data: Bytes,
}

/// Where the denial letter of a new claim comes from.
///
/// The variants are mutually exclusive: picking one source replaces the
/// other.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LetterSource {
    /// No letter attached.
    #[default]
    None,
    /// A letter that was uploaded and processed before.
    Existing(LetterId),
    /// A freshly uploaded file.
    Uploaded(UploadedFile),
}

/// Why the title blocks submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TitleError {
    /// The title is empty.
    Empty,
    /// Another claim already uses this exact title.
    Duplicate,
}

impl TitleError {
    /// The inline message to show under the title field.
    #[inline]
    pub fn message(&self) -> &'static str {
        match self {
            TitleError::Empty => "Please enter a title for your claim",
            TitleError::Duplicate => "You already have a claim with this title",
        }
    }
}

impl Display for TitleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for TitleError {}

/// What the submit handler receives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClaimSubmission {
    /// The validated title.
    pub title: String,
    /// The existing letter picked, if any.
    pub letter_id: Option<LetterId>,
    /// The uploaded letter, if any.
    pub file: Option<UploadedFile>,
}

/// Events dispatched to the [`ClaimForm`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormEvent {
    /// The title field changed.
    TitleChanged(String),
    /// An existing letter was picked, or the pick was cleared.
    LetterSelected(Option<LetterId>),
    /// A file was uploaded, or the upload was cleared.
    FileUploaded(Option<UploadedFile>),
    /// The user's existing letters arrived.
    LettersLoaded(Vec<DenialLetter>),
    /// The user pressed the create button.
    Submit,
}

/// Local state of the "create a claim appeal" form.
///
/// Nothing is persisted by the form itself. Submitting a valid draft
/// hands it to the caller's handler.
pub struct ClaimForm {
    title: String,
    title_error: Option<TitleError>,
    source: LetterSource,
    existing_titles: HashSet<String>,
    letters: Vec<DenialLetter>,
    letters_requested: bool,
    on_submit: Box<dyn FnMut(ClaimSubmission) + Send>,
}

impl ClaimForm {
    /// Creates an empty form.
    ///
    /// `existing_titles` are the titles of the user's claims, a new title
    /// must not match any of them exactly.
    pub fn new<I, S>(
        existing_titles: I,
        on_submit: impl FnMut(ClaimSubmission) + Send + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: String::new(),
            title_error: None,
            source: LetterSource::None,
            existing_titles: existing_titles.into_iter().map(Into::into).collect(),
            letters: vec![],
            letters_requested: false,
            on_submit: Box::new(on_submit),
        }
    }

    /// The title as typed.
    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The validation error shown under the title, if any.
    #[inline]
    pub fn title_error(&self) -> Option<TitleError> {
        self.title_error
    }

    /// The letter attached to the draft.
    #[inline]
    pub fn source(&self) -> &LetterSource {
        &self.source
    }

    /// The picked existing letter, if that is the current source.
    #[inline]
    pub fn selected_letter(&self) -> Option<&LetterId> {
        match &self.source {
            LetterSource::Existing(id) => Some(id),
            _ => None,
        }
    }

    /// The uploaded file, if that is the current source.
    #[inline]
    pub fn uploaded_file(&self) -> Option<&UploadedFile> {
        match &self.source {
            LetterSource::Uploaded(file) => Some(file),
            _ => None,
        }
    }

    /// The existing letters to offer, `None` when there are none to show.
    #[inline]
    pub fn letter_options(&self) -> Option<&[DenialLetter]> {
        if self.letters.is_empty() {
            None
        } else {
            Some(&self.letters)
        }
    }

    /// Fetches the user's existing letters. Only the first call hits the
    /// store. A failed fetch is logged and leaves the list empty.
    pub async fn load_denial_letters(
        &mut self,
        store: &dyn LetterStore,
        user_id: &str,
    ) {
        if self.letters_requested {
            return;
        }
        self.letters_requested = true;

        match store.list_denial_letters(user_id).await {
            Ok(letters) => {
                debug!("loaded {} denial letters", letters.len());
                self.letters = letters;
            }
            Err(err) => error!("failed to load denial letters: {err}"),
        }
    }

    /// Applies an event. Only [`ClaimFormEvent::Submit`] can fail.
    pub fn dispatch(&mut self, event: ClaimFormEvent) -> Result<(), TitleError> {
        match event {
            ClaimFormEvent::TitleChanged(title) => {
                self.title_error = self
                    .existing_titles
                    .contains(&title)
                    .then_some(TitleError::Duplicate);
                self.title = title;
            }
            ClaimFormEvent::LetterSelected(Some(id)) => {
                self.source = LetterSource::Existing(id);
            }
            ClaimFormEvent::LetterSelected(None) => {
                if matches!(self.source, LetterSource::Existing(_)) {
                    self.source = LetterSource::None;
                }
            }
            ClaimFormEvent::FileUploaded(Some(file)) => {
                self.source = LetterSource::Uploaded(file);
            }
            ClaimFormEvent::FileUploaded(None) => {
                if matches!(self.source, LetterSource::Uploaded(_)) {
                    self.source = LetterSource::None;
                }
            }
            ClaimFormEvent::LettersLoaded(letters) => self.letters = letters,
            ClaimFormEvent::Submit => return self.submit(),
        }
        Ok(())
    }

    fn submit(&mut self) -> Result<(), TitleError> {
        if self.title.is_empty() {
            self.title_error = Some(TitleError::Empty);
        }
        if let Some(err) = self.title_error {
            return Err(err);
        }

        let (letter_id, file) = match &self.source {
            LetterSource::None => (None, None),
            LetterSource::Existing(id) => (Some(id.clone()), None),
            LetterSource::Uploaded(file) => (None, Some(file.clone())),
        };
        (self.on_submit)(ClaimSubmission {
            title: self.title.clone(),
            letter_id,
            file,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rcm_test_model::TestStore;

    use super::*;

    fn recording_form(
        existing: &[&str],
    ) -> (ClaimForm, Arc<Mutex<Vec<ClaimSubmission>>>) {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let form = ClaimForm::new(existing.iter().copied(), {
            let submitted = Arc::clone(&submitted);
            move |submission| submitted.lock().unwrap().push(submission)
        });
        (form, submitted)
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_owned(),
            content_type: Some("application/pdf".to_owned()),
            data: Bytes::from_static(b"%PDF-1.7"),
        }
    }

    #[test]
    fn test_valid_title_submits() {
        let (mut form, submitted) = recording_form(&["Knee MRI"]);
        form.dispatch(ClaimFormEvent::TitleChanged("Hip MRI".to_owned()))
            .unwrap();
        assert_eq!(form.dispatch(ClaimFormEvent::Submit), Ok(()));

        let submitted = submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].title, "Hip MRI");
        assert_eq!(submitted[0].letter_id, None);
        assert_eq!(submitted[0].file, None);
    }

    #[test]
    fn test_empty_title_blocks() {
        let (mut form, submitted) = recording_form(&[]);
        assert_eq!(
            form.dispatch(ClaimFormEvent::Submit),
            Err(TitleError::Empty)
        );
        assert_eq!(
            form.title_error().map(|e| e.message()),
            Some("Please enter a title for your claim")
        );
        assert!(submitted.lock().unwrap().is_empty());

        form.dispatch(ClaimFormEvent::TitleChanged("Now titled".to_owned()))
            .unwrap();
        assert_eq!(form.title_error(), None);
    }

    #[test]
    fn test_duplicate_title_is_case_sensitive() {
        let (mut form, submitted) = recording_form(&["Knee MRI"]);
        form.dispatch(ClaimFormEvent::TitleChanged("Knee MRI".to_owned()))
            .unwrap();
        assert_eq!(form.title_error(), Some(TitleError::Duplicate));
        assert_eq!(
            form.dispatch(ClaimFormEvent::Submit),
            Err(TitleError::Duplicate)
        );
        assert_eq!(
            TitleError::Duplicate.to_string(),
            "You already have a claim with this title"
        );

        form.dispatch(ClaimFormEvent::TitleChanged("knee MRI".to_owned()))
            .unwrap();
        assert_eq!(form.title_error(), None);
        assert_eq!(form.dispatch(ClaimFormEvent::Submit), Ok(()));
        assert_eq!(submitted.lock().unwrap()[0].title, "knee MRI");
    }

    #[test]
    fn test_sources_are_exclusive() {
        let (mut form, submitted) = recording_form(&[]);
        form.dispatch(ClaimFormEvent::LetterSelected(Some("7".into())))
            .unwrap();
        form.dispatch(ClaimFormEvent::FileUploaded(Some(upload("denial.pdf"))))
            .unwrap();
        assert_eq!(form.selected_letter(), None);
        assert_eq!(form.uploaded_file().unwrap().file_name, "denial.pdf");

        form.dispatch(ClaimFormEvent::LetterSelected(Some("8".into())))
            .unwrap();
        assert_eq!(form.uploaded_file(), None);
        assert_eq!(form.selected_letter(), Some(&LetterId::new("8")));

        // Clearing the upload leaves the picked letter alone.
        form.dispatch(ClaimFormEvent::FileUploaded(None)).unwrap();
        assert_eq!(form.selected_letter(), Some(&LetterId::new("8")));

        form.dispatch(ClaimFormEvent::TitleChanged("Appeal".to_owned()))
            .unwrap();
        form.dispatch(ClaimFormEvent::Submit).unwrap();
        let submitted = submitted.lock().unwrap();
        assert_eq!(submitted[0].letter_id, Some(LetterId::new("8")));
        assert_eq!(submitted[0].file, None);
    }

    #[tokio::test]
    async fn test_load_denial_letters_once() {
        let store = TestStore::default();
        store.insert_letter("user-1", "1", "denial-march.pdf");

        let (mut form, _) = recording_form(&[]);
        assert_eq!(form.letter_options(), None);
        form.load_denial_letters(&store, "user-1").await;
        let options = form.letter_options().unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].file_name, "denial-march.pdf");

        store.insert_letter("user-1", "2", "denial-april.pdf");
        form.load_denial_letters(&store, "user-1").await;
        assert_eq!(form.letter_options().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_denial_letters_failure() {
        let store = TestStore::default();
        store.fail_letters("permission denied");

        let (mut form, _) = recording_form(&[]);
        form.load_denial_letters(&store, "user-1").await;
        assert_eq!(form.letter_options(), None);
    }
}
