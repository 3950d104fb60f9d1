use browser_session::{MockLoader, Result, Session};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};
use tracing_subscriber::EnvFilter;

const HISTORY_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/history_property_fuzz_test.txt";
const DEFAULT_HISTORY_PROPTEST_CASES: u32 = 128;
const PAGE_COUNT: u8 = 4;

#[derive(Clone, Debug)]
enum HistoryAction {
    Navigate(u8),
    Fragment(u8),
    Replace(u8),
    Go(i64),
}

fn env_proptest_cases(var_name: &str, default_cases: u32) -> u32 {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_cases)
}

fn history_proptest_cases() -> u32 {
    std::env::var("BROWSER_SESSION_HISTORY_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or_else(|| {
            env_proptest_cases(
                "BROWSER_SESSION_PROPTEST_CASES",
                DEFAULT_HISTORY_PROPTEST_CASES,
            )
        })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn page_url(page: u8) -> String {
    format!("http://app.local/p{page}.html")
}

fn history_action_strategy() -> BoxedStrategy<HistoryAction> {
    prop_oneof![
        4 => (0..PAGE_COUNT).prop_map(HistoryAction::Navigate),
        2 => (0..3u8).prop_map(HistoryAction::Fragment),
        1 => (0..PAGE_COUNT).prop_map(HistoryAction::Replace),
        4 => (-3i64..=3).prop_map(HistoryAction::Go),
    ]
    .boxed()
}

fn history_action_sequence_strategy() -> BoxedStrategy<Vec<HistoryAction>> {
    vec(history_action_strategy(), 1..=32).boxed()
}

/// Expected session history: URLs plus the current index.
#[derive(Debug)]
struct HistoryModel {
    urls: Vec<String>,
    index: usize,
}

impl HistoryModel {
    fn new(url: String) -> Self {
        Self {
            urls: vec![url],
            index: 0,
        }
    }

    fn current(&self) -> &str {
        &self.urls[self.index]
    }

    fn push_or_replace(&mut self, url: String) {
        if url == self.current() {
            self.urls[self.index] = url;
            return;
        }
        self.urls.truncate(self.index + 1);
        self.urls.push(url);
        self.index = self.urls.len() - 1;
    }

    fn apply(&mut self, action: &HistoryAction) {
        match action {
            HistoryAction::Navigate(page) => self.push_or_replace(page_url(*page)),
            HistoryAction::Fragment(fragment) => {
                let base = self.current().split('#').next().unwrap_or_default();
                let url = format!("{base}#f{fragment}");
                self.push_or_replace(url);
            }
            HistoryAction::Replace(page) => self.urls[self.index] = page_url(*page),
            HistoryAction::Go(delta) => {
                let target = self.index as i64 + delta;
                if (0..self.urls.len() as i64).contains(&target) {
                    self.index = target as usize;
                }
            }
        }
    }
}

fn run_action(session: &mut Session, action: &HistoryAction) -> Result<()> {
    let top = session.top();
    match action {
        HistoryAction::Navigate(page) => session.set_location(top, &page_url(*page)).map(drop),
        HistoryAction::Fragment(fragment) => {
            session.set_location(top, &format!("#f{fragment}")).map(drop)
        }
        HistoryAction::Replace(page) => session.replace_location(top, &page_url(*page)).map(drop),
        HistoryAction::Go(delta) => session.history_go(top, *delta).map(drop),
    }
}

fn fixture() -> MockLoader {
    let loader = MockLoader::strict();
    for page in 0..PAGE_COUNT {
        loader.page(&page_url(page), &format!("Page {page}"));
    }
    loader
}

fn assert_history_matches_model(actions: &[HistoryAction]) -> TestCaseResult {
    init_tracing();
    let mut session = Session::open(&page_url(0), fixture())
        .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
    let mut model = HistoryModel::new(page_url(0));
    let top = session.top();

    for (step, action) in actions.iter().enumerate() {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_action(&mut session, action)
        }));
        match outcome {
            Err(_) => {
                prop_assert!(false, "action panicked at step {step}: {action:?}, actions={actions:?}");
            }
            Ok(Err(error)) => {
                prop_assert!(
                    false,
                    "action returned error at step {step}: {action:?}, error={error:?}, actions={actions:?}"
                );
            }
            Ok(Ok(())) => {}
        }
        model.apply(action);

        let history = session
            .history(top)
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        let urls: Vec<String> = history
            .entries()
            .iter()
            .map(|entry| entry.url().to_string())
            .collect();
        prop_assert_eq!(&urls, &model.urls, "entries after step {}: {:?}", step, action);
        prop_assert_eq!(history.index(), model.index, "index after step {}: {:?}", step, action);
        prop_assert!(history.index() < history.len());

        let location = session
            .location(top)
            .map_err(|err| TestCaseError::fail(format!("{err:?}")))?;
        prop_assert_eq!(location.as_str(), model.current());
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: history_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(HISTORY_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn history_operations_follow_the_list_model(actions in history_action_sequence_strategy()) {
        assert_history_matches_model(&actions)?;
    }
}
