//! Client core of the document chat and claims appeal UI: the input box,
//! the chat session with its transcript, and the claim draft form.
//!
//! Every component is a reducer over explicit events. Nothing here renders
//! anything, the host wires the state to its own views.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod chat_client;
pub mod claim_form;
mod context;
pub mod input_box;
mod session;
pub mod transcript;

pub use claim_form::{
    ClaimForm, ClaimFormEvent, ClaimSubmission, LetterSource, TitleError,
    UploadedFile,
};
pub use context::SessionContext;
pub use input_box::{InputBox, InputEvent, Key};
pub use session::{
    ChatSession, ChatSessionBuilder, SessionClosedError, SessionPhase,
    SessionSnapshot,
};
pub use transcript::{Transcript, Turn};
