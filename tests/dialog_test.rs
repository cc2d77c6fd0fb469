mod common;

use common::{engine_with, RecordingTransport, Sent, Spoken};
use page_speaker::dialog::{buttons, messages, Action, Dialog, Incoming, Keyboard, Stage};
use page_speaker::rate_limiter::RateLimiter;
use tempfile::{tempdir, TempDir};

const USER: &str = "bob";

fn dialog(pages: &[&str], limiter: RateLimiter) -> (Dialog, Spoken, TempDir) {
    let dir = tempdir().unwrap();
    let spoken = Spoken::default();
    let engine = engine_with(dir.path(), pages, &spoken);
    (Dialog::new(engine, limiter, 1024), spoken, dir)
}

fn text(s: &str) -> Incoming {
    Incoming::Text(s.to_string())
}

fn upload(name: &str) -> Incoming {
    Incoming::Document {
        file_name: name.to_string(),
        bytes: b"%PDF-1.4 fake".to_vec(),
    }
}

#[test]
fn test_start_shows_menu_without_saved_file() {
    let (mut dialog, _, _dir) = dialog(&["a"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, Incoming::Start, &mut chat);

    assert_eq!(chat.texts(), vec![messages::GREETING, messages::MENU]);
    assert_eq!(
        chat.last_keyboard(),
        Some(Keyboard::Reply(vec![buttons::UPLOAD.to_string()]))
    );
    assert_eq!(dialog.stage(USER), Stage::Menu);
}

#[test]
fn test_upload_then_read_whole_book() {
    let (mut dialog, spoken, dir) = dialog(&["zero", "", "two"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, upload("book.pdf"), &mut chat);
    assert!(dir.path().join("temp_bob.pdf").is_file());
    assert_eq!(chat.texts(), vec![messages::UPLOADED, messages::START_PROMPT]);
    assert_eq!(dialog.stage(USER), Stage::StartPrompt);

    chat.clear();
    dialog.handle(USER, text(buttons::FROM_START), &mut chat);
    assert_eq!(chat.audio(), vec![dir.path().join("temp_bob.mp3")]);
    assert_eq!(chat.texts(), vec![messages::HINT]);
    assert_eq!(
        chat.last_keyboard(),
        Some(Keyboard::Inline(vec![
            (buttons::NEXT_PAGE.to_string(), Action::NextPage),
            (buttons::MENU.to_string(), Action::Menu),
        ]))
    );
    assert_eq!(dialog.stage(USER), Stage::Reading);

    dialog.handle(USER, Incoming::Callback(Action::NextPage), &mut chat);
    assert_eq!(chat.audio().len(), 2);

    chat.clear();
    dialog.handle(USER, Incoming::Callback(Action::NextPage), &mut chat);
    assert!(chat.audio().is_empty());
    assert_eq!(chat.texts(), vec![messages::BOOK_OVER, messages::MENU]);
    assert_eq!(dialog.stage(USER), Stage::Menu);

    assert_eq!(
        spoken.texts(),
        vec!["Page 1.\nzero".to_string(), "Page 3.\ntwo".to_string()]
    );
}

#[test]
fn test_menu_offers_saved_file() {
    let (mut dialog, _, dir) = dialog(&["a", "b"], RateLimiter::default());
    std::fs::write(dir.path().join("temp_bob.pdf"), b"%PDF").unwrap();
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, Incoming::Callback(Action::Menu), &mut chat);
    assert_eq!(
        chat.last_keyboard(),
        Some(Keyboard::Reply(vec![
            buttons::UPLOAD.to_string(),
            buttons::USE_UPLOADED.to_string()
        ]))
    );

    chat.clear();
    dialog.handle(USER, text(buttons::USE_UPLOADED), &mut chat);
    assert_eq!(chat.texts(), vec![messages::ACCEPTED, messages::START_PROMPT]);

    chat.clear();
    dialog.handle(USER, text(buttons::HOME), &mut chat);
    assert_eq!(chat.texts(), vec![messages::MENU]);

    chat.clear();
    dialog.handle(USER, text(buttons::UPLOAD), &mut chat);
    assert_eq!(chat.texts(), vec![messages::SEND_DOCUMENT]);
}

#[test]
fn test_page_number_is_one_based() {
    let (mut dialog, spoken, _dir) = dialog(&["a", "b", "c"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, upload("book.pdf"), &mut chat);
    dialog.handle(USER, text("3"), &mut chat);

    assert_eq!(spoken.texts(), vec!["Page 3.\nc".to_string()]);
    assert_eq!(dialog.engine().cursor(USER).unwrap().current_page(), 3);

    chat.clear();
    dialog.handle(USER, Incoming::Callback(Action::NextPage), &mut chat);
    assert_eq!(chat.texts(), vec![messages::BOOK_OVER, messages::MENU]);
}

#[test]
fn test_missing_page_goes_back_to_menu() {
    let (mut dialog, _, _dir) = dialog(&["a", "b"], RateLimiter::default());
    let mut chat = RecordingTransport::default();
    dialog.handle(USER, upload("book.pdf"), &mut chat);

    chat.clear();
    dialog.handle(USER, text("9"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::PAGE_MISSING, messages::MENU]);
    assert_eq!(dialog.stage(USER), Stage::Menu);

    dialog.handle(USER, text(buttons::USE_UPLOADED), &mut chat);
    chat.clear();
    dialog.handle(USER, text("0"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::PAGE_MISSING, messages::MENU]);
}

#[test]
fn test_gibberish_repeats_start_prompt() {
    let (mut dialog, _, _dir) = dialog(&["a"], RateLimiter::default());
    let mut chat = RecordingTransport::default();
    dialog.handle(USER, upload("book.pdf"), &mut chat);

    chat.clear();
    dialog.handle(USER, text("page two please"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::START_PROMPT]);
}

#[test]
fn test_rejects_unsupported_and_large_uploads() {
    let (mut dialog, _, dir) = dialog(&["a"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, upload("notes.txt"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::UNSUPPORTED, messages::MENU]);

    chat.clear();
    dialog.handle(
        USER,
        Incoming::Document {
            file_name: "huge.pdf".to_string(),
            bytes: vec![0; 4096],
        },
        &mut chat,
    );
    assert_eq!(chat.texts(), vec![messages::TOO_LARGE, messages::MENU]);
    assert!(!dir.path().join("temp_bob.pdf").exists());
}

#[test]
fn test_delivery_failure_is_reported() {
    let (mut dialog, _, _dir) = dialog(&["a"], RateLimiter::default());
    let mut chat = RecordingTransport {
        fail_audio: true,
        ..Default::default()
    };
    dialog.handle(USER, upload("book.pdf"), &mut chat);

    chat.clear();
    dialog.handle(USER, text(buttons::FROM_START), &mut chat);
    assert_eq!(chat.texts(), vec![messages::DELIVERY_PROBLEM, messages::MENU]);
}

#[test]
fn test_next_page_without_session_is_internal_error() {
    let (mut dialog, _, _dir) = dialog(&["a"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, Incoming::Callback(Action::NextPage), &mut chat);
    assert_eq!(chat.texts(), vec![messages::INTERNAL_ERROR, messages::MENU]);
}

#[test]
fn test_voice_preference_survives_new_session() {
    let (mut dialog, _, _dir) = dialog(&["a", "b"], RateLimiter::default());
    let mut chat = RecordingTransport::default();

    dialog.handle(USER, text("/voice cloud"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::VOICE_SET]);

    dialog.handle(USER, upload("book.pdf"), &mut chat);
    dialog.handle(USER, text(buttons::FROM_START), &mut chat);
    let voice = dialog.engine().cursor(USER).unwrap().reader().voice().id();
    assert_eq!(voice, "cloud");

    chat.clear();
    dialog.handle(USER, text("/voice nope"), &mut chat);
    assert_eq!(chat.texts(), vec!["Voices: broken, cloud, offline".to_string()]);

    chat.clear();
    dialog.handle(USER, text("/voice broken"), &mut chat);
    assert_eq!(chat.texts(), vec![messages::INTERNAL_ERROR, messages::MENU]);
    let voice = dialog.engine().cursor(USER).unwrap().reader().voice().id();
    assert_eq!(voice, "cloud");
}

#[test]
fn test_page_requests_are_rate_limited() {
    let (mut dialog, _, _dir) = dialog(&["a", "b", "c"], RateLimiter::new(1, 5));
    let mut chat = RecordingTransport::default();
    dialog.handle(USER, upload("book.pdf"), &mut chat);
    dialog.handle(USER, text(buttons::FROM_START), &mut chat);

    chat.clear();
    dialog.handle(USER, Incoming::Callback(Action::NextPage), &mut chat);
    assert!(matches!(
        chat.sent.as_slice(),
        [Sent::Text(t, Some(Keyboard::Inline(_)))] if t == messages::RATE_LIMITED
    ));
    assert_eq!(dialog.engine().cursor(USER).unwrap().current_page(), 1);
}

#[test]
fn test_new_upload_drops_old_session() {
    let (mut dialog, _, dir) = dialog(&["a", "b"], RateLimiter::default());
    let mut chat = RecordingTransport::default();
    dialog.handle(USER, upload("book.pdf"), &mut chat);
    dialog.handle(USER, text(buttons::FROM_START), &mut chat);
    assert!(dialog.engine().has_session(USER));

    dialog.handle(USER, upload("other.PDF"), &mut chat);
    assert!(!dialog.engine().has_session(USER));
    assert!(dir.path().join("temp_bob.pdf").is_file());
}
