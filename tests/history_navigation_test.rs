use std::cell::RefCell;
use std::rc::Rc;

use browser_session::{
    Callback, HandlerReturn, LoadError, MockLoader, NavigationCause, NavigationOutcome, Result,
    ScriptError, Session,
};

const A: &str = "http://app.local/a.html";
const B: &str = "http://app.local/b.html";
const B_X: &str = "http://app.local/b.html#x";
const C: &str = "http://app.local/c.html";

fn fixture() -> MockLoader {
    let loader = MockLoader::strict();
    loader.page_with(A, "A", |dom, body| {
        dom.create_element(body, "a", &[("id", "to-b"), ("href", "b.html")])
            .expect("anchor");
    });
    loader.page_with(B, "B", |dom, body| {
        dom.create_element(body, "a", &[("id", "to-x"), ("href", "#x")])
            .expect("anchor");
        dom.create_element(body, "a", &[("id", "to-c"), ("href", "c.html")])
            .expect("anchor");
        dom.create_element(body, "button", &[("id", "back"), ("type", "button")])
            .expect("button");
        let form = dom
            .create_element(body, "form", &[("id", "search"), ("action", "c.html")])
            .expect("form");
        dom.create_element(form, "input", &[("name", "q"), ("value", "a b")])
            .expect("input");
        dom.create_element(form, "button", &[("id", "go")])
            .expect("submit");
        let post = dom
            .create_element(
                body,
                "form",
                &[("id", "upload"), ("action", "c.html"), ("method", "POST")],
            )
            .expect("post form");
        dom.create_element(post, "input", &[("name", "q"), ("value", "ignored")])
            .expect("input");
    });
    loader.page(C, "C");
    loader
}

fn urls(session: &Session) -> Result<Vec<String>> {
    Ok(session
        .history(session.top())?
        .entries()
        .iter()
        .map(|entry| entry.url().to_string())
        .collect())
}

fn script_error(err: browser_session::Error) -> ScriptError {
    ScriptError::new(err.to_string())
}

#[test]
fn back_forward_then_navigate_truncates_forward_entries() -> Result<()> {
    let mut session = Session::open(A, fixture())?;
    let top = session.top();
    assert_eq!((session.history_length(top)?, session.history_index(top)?), (1, 0));

    session.click(session.element_by_id(top, "to-b")?)?;
    assert_eq!(session.location(top)?.as_str(), B);
    assert_eq!((session.history_length(top)?, session.history_index(top)?), (2, 1));

    session.click(session.element_by_id(top, "to-x")?)?;
    assert_eq!(session.location(top)?.as_str(), B_X);
    assert_eq!((session.history_length(top)?, session.history_index(top)?), (3, 2));

    let back = session.element_by_id(top, "back")?;
    session.add_event_listener(
        back,
        "click",
        Callback::new(move |session, _| {
            session.history_back(top).map_err(script_error)?;
            Ok(HandlerReturn::Undefined)
        }),
        false,
    )?;
    session.click(back)?;
    assert_eq!(session.location(top)?.as_str(), B);
    assert_eq!(session.history_index(top)?, 1);

    assert!(session.history_back(top)?);
    assert_eq!(session.location(top)?.as_str(), A);
    assert_eq!(session.title(top)?, "A");
    assert_eq!(session.history_index(top)?, 0);

    assert!(session.history_forward(top)?);
    assert_eq!(session.location(top)?.as_str(), B);
    assert_eq!(session.history_index(top)?, 1);

    session.click(session.element_by_id(top, "to-c")?)?;
    assert_eq!(session.location(top)?.as_str(), C);
    assert_eq!((session.history_length(top)?, session.history_index(top)?), (3, 2));
    assert_eq!(urls(&session)?, vec![A, B, C]);
    Ok(())
}

#[test]
fn fragment_navigation_queues_hashchange_without_loading() -> Result<()> {
    let loader = fixture();
    let mut session = Session::open(B, loader.clone())?;
    let top = session.top();
    loader.take_requests();
    let document = session.current_document(top)?;

    let changes = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&changes);
    session.add_event_listener(
        top,
        "hashchange",
        Callback::new(move |_, event| {
            let change = event.hash_change().expect("hashchange detail");
            seen.borrow_mut()
                .push((change.old_url.clone(), change.new_url.clone()));
            Ok(HandlerReturn::Undefined)
        }),
        false,
    )?;

    session.click(session.element_by_id(top, "to-x")?)?;
    assert!(loader.take_requests().is_empty());
    assert_eq!(session.current_document(top)?, document);
    assert_eq!(*changes.borrow(), vec![(B.to_string(), B_X.to_string())]);

    // Same URL again: entry replaced, nothing fired.
    session.set_location(top, "#x")?;
    assert_eq!(session.history_length(top)?, 2);
    assert_eq!(changes.borrow().len(), 1);

    assert!(session.history_back(top)?);
    assert_eq!(session.current_document(top)?, document);
    assert_eq!(changes.borrow().last(), Some(&(B_X.to_string(), B.to_string())));
    Ok(())
}

#[test]
fn go_outside_history_is_a_silent_noop() -> Result<()> {
    let mut session = Session::open(A, fixture())?;
    let top = session.top();
    session.set_location(top, "b.html")?;
    session.take_navigations();

    assert!(!session.history_go(top, 1)?);
    assert!(!session.history_go(top, -2)?);
    assert!(!session.history_go(top, i64::MIN)?);
    assert_eq!(session.history_index(top)?, 1);
    assert!(session.take_navigations().is_empty());
    assert_eq!(session.history_item(top, 1)?.map(|entry| entry.title()), Some("B"));
    assert!(session.history_item(top, 2)?.is_none());
    Ok(())
}

#[test]
fn cancelled_link_click_leaves_history_untouched() -> Result<()> {
    let loader = fixture();
    let mut session = Session::open(A, loader.clone())?;
    let top = session.top();
    loader.take_requests();
    let anchor = session.element_by_id(top, "to-b")?;
    session.add_event_listener(
        anchor,
        "click",
        Callback::new(|_, event| {
            event.prevent_default();
            Ok(HandlerReturn::Undefined)
        }),
        false,
    )?;

    let outcome = session.click(anchor)?;
    assert!(outcome.cancelled);
    assert_eq!(session.location(top)?.as_str(), A);
    assert_eq!(session.history_length(top)?, 1);
    assert!(loader.take_requests().is_empty());

    let requested = session.request_navigation(
        top,
        "b.html",
        NavigationCause::LinkClick { source: anchor },
    )?;
    assert_eq!(requested, NavigationOutcome::Cancelled);
    assert!(session.take_navigations().is_empty());
    Ok(())
}

#[test]
fn failed_load_creates_no_entry() -> Result<()> {
    let loader = fixture();
    loader.fail(
        "http://app.local/down.html",
        LoadError::Transport("connection reset".into()),
    );
    let mut session = Session::open(A, loader)?;
    let top = session.top();

    let outcome = session.set_location(top, "down.html")?;
    assert_eq!(
        outcome,
        NavigationOutcome::Failed(LoadError::Transport("connection reset".into()))
    );
    assert_eq!(
        session.set_location(top, "missing.html")?,
        NavigationOutcome::Failed(LoadError::Status(404))
    );
    assert_eq!(session.location(top)?.as_str(), A);
    assert_eq!(session.history_length(top)?, 1);
    Ok(())
}

#[test]
fn replace_and_reload_keep_length() -> Result<()> {
    let mut session = Session::open(A, fixture())?;
    let top = session.top();
    session.set_location(top, "b.html")?;

    let loads = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&loads);
    session.set_event_handler(
        top,
        "load",
        Some(Callback::new(move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(HandlerReturn::Undefined)
        })),
    )?;

    let before = session.current_document(top)?;
    assert!(session.history_go(top, 0)?);
    assert_ne!(session.current_document(top)?, before);
    assert_eq!(session.history_length(top)?, 2);
    assert_eq!(*loads.borrow(), 1);

    session.replace_location(top, "c.html")?;
    assert_eq!(urls(&session)?, vec![A, C]);
    assert_eq!(session.history_index(top)?, 1);
    assert_eq!(*loads.borrow(), 2);
    Ok(())
}

#[test]
fn truncated_documents_are_collected() -> Result<()> {
    let mut session = Session::open(A, fixture())?;
    let top = session.top();
    session.set_location(top, "b.html")?;
    let b_document = session.current_document(top)?;
    let b_anchor = session.element_by_id(top, "to-c")?;
    session.add_event_listener(
        b_anchor,
        "click",
        Callback::new(|_, _| Ok(HandlerReturn::Undefined)),
        false,
    )?;

    session.history_back(top)?;
    assert!(session.document(b_document).is_some());

    session.set_location(top, "c.html")?;
    assert!(session.document(b_document).is_none());
    assert_eq!(session.listener_count(b_anchor, "click"), 0);
    assert_eq!(urls(&session)?, vec![A, C]);
    Ok(())
}

#[test]
fn get_form_submission_serialises_named_controls() -> Result<()> {
    let mut session = Session::open(B, fixture())?;
    let top = session.top();
    session.click(session.element_by_id(top, "go")?)?;
    assert_eq!(session.location(top)?.as_str(), "http://app.local/c.html?q=a+b");

    let records = session.take_navigations();
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0].cause, NavigationCause::FormSubmit { .. }));
    assert_eq!(records[0].from.as_ref().map(|url| url.as_str()), Some(B));
    Ok(())
}

#[test]
fn post_form_navigates_to_the_bare_action() -> Result<()> {
    let mut session = Session::open(B, fixture())?;
    let top = session.top();
    let outcome = session.submit(session.element_by_id(top, "upload")?)?;
    assert_eq!(outcome, NavigationOutcome::Committed { index: 1, length: 2 });
    let location = session.location(top)?;
    assert_eq!(location.as_str(), C);
    assert_eq!(location.query(), None);
    Ok(())
}

#[test]
fn submit_listener_can_cancel_form_navigation() -> Result<()> {
    let mut session = Session::open(B, fixture())?;
    let top = session.top();
    let form = session.element_by_id(top, "search")?;
    session.set_event_handler(
        form,
        "submit",
        Some(Callback::new(|_, _| Ok(HandlerReturn::Bool(false)))),
    )?;
    assert_eq!(session.submit(form)?, NavigationOutcome::Cancelled);
    assert_eq!(session.location(top)?.as_str(), B);
    Ok(())
}

#[test]
fn navigation_trace_lines_are_buffered() -> Result<()> {
    let mut session = Session::open(A, fixture())?;
    let top = session.top();
    session.enable_trace(true);
    session.set_trace_events(false);
    session.set_location(top, "b.html")?;
    session.history_go(top, 5)?;

    let logs = session.take_trace_logs();
    assert!(logs.iter().any(|line| line == &format!("[nav] push {B} index=1 length=2")));
    assert!(logs.iter().any(|line| line == "[nav] go delta=5 ignored"));
    assert!(logs.iter().all(|line| !line.starts_with("[event]")));
    assert!(session.take_trace_logs().is_empty());

    session.set_trace_log_limit(1)?;
    session.history_back(top)?;
    session.history_forward(top)?;
    assert_eq!(session.take_trace_logs().len(), 1);
    assert!(session.set_trace_log_limit(0).is_err());
    Ok(())
}
