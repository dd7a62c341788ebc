//! A simple program demonstrates how to use `rcm` as a library.

#[macro_use]
extern crate tracing;

use std::cell::RefCell;
use std::env;
use std::io::Write as _;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rcm::core::{
    ClaimFormEvent, InputBox, InputEvent, Key, SessionContext, SessionPhase,
    Transcript, UploadedFile,
};
use rcm::{Session, SessionBuilder, SupabaseConfigBuilder};
use rcm_model::{LetterId, MessageId};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Changed(Transcript, SessionPhase),
    Alert(String),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(project_url) = env::var("SUPABASE_URL") else {
        eprintln!("SUPABASE_URL environment variable is not set");
        return;
    };
    let Ok(anon_key) = env::var("SUPABASE_ANON_KEY") else {
        eprintln!("SUPABASE_ANON_KEY environment variable is not set");
        return;
    };
    let (Ok(user_id), Ok(record_id), Ok(chat_id)) = (
        env::var("RCM_USER_ID"),
        env::var("RCM_RECORD_ID"),
        env::var("RCM_CHAT_ID"),
    ) else {
        eprintln!(
            "RCM_USER_ID, RCM_RECORD_ID and RCM_CHAT_ID environment variables must be set"
        );
        return;
    };

    let mut config_builder =
        SupabaseConfigBuilder::with_anon_key(anon_key).with_project_url(project_url);
    if let Ok(functions_url) = env::var("SUPABASE_FUNCTIONS_URL") {
        config_builder = config_builder.with_functions_url(functions_url);
    }
    if let Ok(access_token) = env::var("SUPABASE_ACCESS_TOKEN") {
        config_builder = config_builder.with_access_token(access_token);
    }
    let config = config_builder.build();
    debug!("using {config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session = SessionBuilder::with_supabase(config)
        .on_change({
            let event_tx = event_tx.clone();
            move |transcript, phase| {
                event_tx
                    .send(SessionEvent::Changed(transcript.clone(), phase))
                    .ok();
            }
        })
        .on_alert({
            let event_tx = event_tx.clone();
            move |message| {
                event_tx.send(SessionEvent::Alert(message.to_owned())).ok();
            }
        })
        .build();

    let context = SessionContext::new(user_id, record_id, chat_id);
    if session.activate(Some(context.clone())).is_err() {
        return;
    }
    let Some(transcript) = wait_for_history(&mut event_rx).await else {
        return;
    };
    print_transcript(&transcript);

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let submitted = Rc::new(RefCell::new(None));
    let mut input_box = InputBox::new({
        let submitted = Rc::clone(&submitted);
        move |text| *submitted.borrow_mut() = Some(text)
    });

    'outer: loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        feed_line(&mut input_box, &line);
        let Some(text) = submitted.borrow_mut().take() else {
            // A trailing backslash continues the prompt on the next line.
            continue;
        };

        if let Some(command) = text.strip_prefix('/') {
            match run_command(&session, &context, command.trim()).await {
                CommandOutcome::Continue => continue,
                CommandOutcome::Quit => break,
            }
        }

        if session.send_message(&text).is_err() {
            break;
        }

        let mut progress_bar = None;
        let mut started = false;
        let mut printed = 0;

        loop {
            if !started {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("📄 Reading the document...");
                        progress_bar
                    })
                    .inc(1);
            }

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break 'outer;
                    };
                    event
                },
                _ = sleep => {
                    continue;
                }
            };

            match event {
                SessionEvent::Changed(transcript, phase) => {
                    if phase == SessionPhase::Streaming {
                        started = true;
                    }
                    if !started {
                        continue;
                    }
                    let response = transcript
                        .current()
                        .map(|turn| turn.response.as_str())
                        .unwrap_or_default();
                    if let Some(delta) = response.get(printed..) {
                        if !delta.is_empty() {
                            // Finish the progress bar before printing anything else.
                            if let Some(progress_bar) = progress_bar.take() {
                                progress_bar.finish_and_clear();
                                print!("{}🤖 ", BAR_CHAR.bright_cyan());
                            }
                            print!("{}", delta.bright_white());
                            std::io::stdout().flush().ok();
                            printed = response.len();
                        }
                    }
                    if phase == SessionPhase::Ready {
                        println!();
                        break;
                    }
                }
                SessionEvent::Alert(message) => {
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    print_alert(&message);
                }
            }
        }
        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }
    }

    session.close();
}

enum CommandOutcome {
    Continue,
    Quit,
}

async fn run_command(
    session: &Session,
    context: &SessionContext,
    command: &str,
) -> CommandOutcome {
    let (name, args) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "quit" | "exit" => return CommandOutcome::Quit,
        "history" => match session.snapshot().await {
            Ok(snapshot) => print_transcript(&snapshot.transcript),
            Err(_) => return CommandOutcome::Quit,
        },
        "select" => {
            let id = args.trim();
            let id = (!id.is_empty()).then(|| MessageId::new(id));
            if session.select(id).is_err() {
                return CommandOutcome::Quit;
            }
            if let Ok(snapshot) = session.snapshot().await {
                match snapshot.transcript.selected_turn() {
                    Some(turn) => println!(
                        "{}{}\n{}{}",
                        BAR_CHAR.bright_yellow(),
                        turn.prompt.bold(),
                        BAR_CHAR.bright_yellow(),
                        turn.response
                    ),
                    None => println!("Nothing selected."),
                }
            }
        }
        "claim" => create_claim(session, context, args).await,
        _ => println!("Commands: /history, /select [id], /claim <title> [#letter-id | @file], /quit"),
    }
    CommandOutcome::Continue
}

async fn create_claim(session: &Session, context: &SessionContext, args: &str) {
    let mut title = Vec::new();
    let mut events = Vec::new();
    for word in args.split_whitespace() {
        if let Some(id) = word.strip_prefix('#') {
            events.push(ClaimFormEvent::LetterSelected(Some(LetterId::new(id))));
        } else if let Some(path) = word.strip_prefix('@') {
            match tokio::fs::read(path).await {
                Ok(data) => events.push(ClaimFormEvent::FileUploaded(Some(
                    UploadedFile {
                        file_name: path.to_owned(),
                        content_type: None,
                        data: Bytes::from(data),
                    },
                ))),
                Err(err) => {
                    print_alert(&format!("Cannot read {path}: {err}"));
                    return;
                }
            }
        } else {
            title.push(word);
        }
    }

    let mut form = session
        .open_claim_form(&context.user_id, existing_claim_titles(), |claim| {
            let letter = match (&claim.letter_id, &claim.file) {
                (Some(id), _) => format!("letter {id}"),
                (_, Some(file)) => file.file_name.clone(),
                (None, None) => "no letter".to_owned(),
            };
            println!(
                "{}Claim draft \"{}\" ready with {letter}.",
                BAR_CHAR.bright_green(),
                claim.title.bold()
            );
        })
        .await;
    if let Some(letters) = form.letter_options() {
        for letter in letters {
            println!("  #{} {}", letter.id, letter.file_name);
        }
    }

    let title = title.join(" ");
    for event in [ClaimFormEvent::TitleChanged(title)].into_iter().chain(events) {
        if let Err(err) = form.dispatch(event) {
            print_alert(err.message());
            return;
        }
    }
    if let Err(err) = form.dispatch(ClaimFormEvent::Submit) {
        print_alert(err.message());
    }
}

/// Titles of the user's existing claims, from `RCM_CLAIM_TITLES`
/// separated by `;`.
fn existing_claim_titles() -> Vec<String> {
    env::var("RCM_CLAIM_TITLES")
        .map(|raw| parse_titles(&raw))
        .unwrap_or_default()
}

fn parse_titles(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .collect()
}

async fn wait_for_history(
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Option<Transcript> {
    loop {
        match event_rx.recv().await? {
            SessionEvent::Changed(transcript, SessionPhase::Ready) => {
                return Some(transcript);
            }
            SessionEvent::Changed(..) => {}
            SessionEvent::Alert(message) => print_alert(&message),
        }
    }
}

fn feed_line<F: FnMut(String)>(input_box: &mut InputBox<F>, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    let (line, continued) = match line.strip_suffix('\\') {
        Some(line) => (line, true),
        None => (line, false),
    };
    for c in line.chars() {
        input_box.dispatch(InputEvent::KeyDown {
            key: Key::Char(c),
            shift: false,
        });
    }
    input_box.dispatch(InputEvent::KeyDown {
        key: Key::Enter,
        shift: continued,
    });
}

fn print_transcript(transcript: &Transcript) {
    for turn in transcript.turns() {
        let id = turn
            .message_id
            .as_ref()
            .map(|id| format!("#{id} "))
            .unwrap_or_default();
        println!("{}{id}{}", BAR_CHAR.bright_yellow(), turn.prompt.bold());
        println!("{}🤖 {}", BAR_CHAR.bright_cyan(), turn.response);
    }
}

fn print_alert(message: &str) {
    eprintln!("{}⚠️  {}", BAR_CHAR.bright_red(), message.bright_red());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_titles() {
        assert_eq!(
            parse_titles("Knee MRI; Back MRI;;  "),
            ["Knee MRI", "Back MRI"]
        );
        assert!(parse_titles("").is_empty());
    }

    #[test]
    fn test_feed_line_blank_then_prompt() {
        let submitted = Rc::new(RefCell::new(Vec::new()));
        let mut input_box = InputBox::new({
            let submitted = Rc::clone(&submitted);
            move |text| submitted.borrow_mut().push(text)
        });

        feed_line(&mut input_box, "   \n");
        feed_line(&mut input_box, "first\\\n");
        feed_line(&mut input_box, "second\n");
        assert_eq!(*submitted.borrow(), ["first\nsecond"]);

        feed_line(&mut input_box, "  \n");
        feed_line(&mut input_box, "hi\n");
        assert_eq!(*submitted.borrow(), ["first\nsecond", "hi"]);
    }
}
