//! Property-based tests for the dispatcher
//!
//! These tests verify the persistence and ordering invariants across
//! generated conversations.

use super::*;
use crate::storage::MemoryStore;
use crate::testing::{
    CallLog, Outbox, RecordingInterceptor, RecordingStore, RootDialog, SignupDialog, SignupState,
};
use crate::update::Message;
use proptest::prelude::*;
use std::future::Future;

// ============================================================================
// Test Helpers
// ============================================================================

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn text_update(chat_id: i64, text: &str) -> Update {
    Update {
        update_id: 1,
        message: Some(Message::text(chat_id, text)),
        ..Update::default()
    }
}

fn signup_bot(outbox: &Outbox, log: &CallLog) -> (Dispatcher<Arc<RecordingStore>>, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new());
    let dispatcher = Dispatcher::builder(store.clone(), RootDialog::new(outbox.clone(), log.clone()))
        .dialog(SignupDialog::new(outbox.clone(), log.clone()))
        .unwrap()
        .build();
    (dispatcher, store)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Anything the root dialog answers without switching
fn arb_root_text() -> impl Strategy<Value = String> {
    prop_oneof![Just("/start".to_string()), "[a-z /]{0,12}"]
        .prop_filter("switches dialog", |t| t != "/signup")
}

fn arb_chat_id() -> impl Strategy<Value = i64> {
    prop_oneof![1i64..1_000_000, -1_000_000_000_000i64..-1]
}

fn arb_signup_state() -> impl Strategy<Value = SignupState> {
    (0u8..3, "[a-z_]{0,8}", "[a-z0-9]{0,8}").prop_map(|(step, user_name, password)| SignupState {
        step,
        user_name,
        password,
    })
}

fn arb_target() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("root"), Just("signup")]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Handlers that leave state unchanged never write to the store
    #[test]
    fn prop_unchanged_state_never_writes(texts in proptest::collection::vec(arb_root_text(), 1..10)) {
        let outbox = Outbox::default();
        let (dispatcher, store) = signup_bot(&outbox, &CallLog::default());

        block_on(async {
            for text in &texts {
                dispatcher.handle_bot_update(text_update(1, text)).await.unwrap();
            }
        });

        prop_assert_eq!(store.saves(), 0);
        prop_assert_eq!(store.gets(), texts.len());
        prop_assert_eq!(outbox.sent().len(), texts.len());
    }

    /// Events a dialog ignores leave any stored state byte-for-byte intact
    #[test]
    fn prop_ignored_event_keeps_record(state in arb_signup_state(), event in any::<u64>()) {
        let (dispatcher, store) = signup_bot(&Outbox::default(), &CallLog::default());
        let key = ConversationKey::new(5);
        let blob = serde_json::to_vec(&state).unwrap();
        store.seed(key, "signup", &blob);

        block_on(dispatcher.handle_foreign_event(key, event)).unwrap();

        prop_assert_eq!(store.saves(), 0);
        prop_assert_eq!(store.record(key).map(|r| r.state), Some(blob));
    }

    /// Conversations without a record are served by the root dialog
    #[test]
    fn prop_unknown_conversations_start_at_root(chat_ids in proptest::collection::hash_set(arb_chat_id(), 1..8)) {
        let outbox = Outbox::default();
        let (dispatcher, store) = signup_bot(&outbox, &CallLog::default());

        block_on(async {
            for chat_id in &chat_ids {
                dispatcher.handle_bot_update(text_update(*chat_id, "/start")).await.unwrap();
            }
        });

        let replied: Vec<i64> = outbox.sent().into_iter().map(|(chat_id, _)| chat_id).collect();
        prop_assert_eq!(replied.len(), chat_ids.len());
        for chat_id in &chat_ids {
            prop_assert!(replied.contains(chat_id));
            prop_assert!(store.record(ConversationKey::new(*chat_id)).is_none());
        }
    }

    /// Interceptors nest in registration order for any chain length
    #[test]
    fn prop_interceptors_nest_in_order(count in 0usize..6) {
        const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];
        let log = CallLog::default();
        let mut builder = Dispatcher::builder(MemoryStore::new(), RootDialog::with_log(log.clone()));
        for name in &NAMES[..count] {
            builder = builder.interceptor(RecordingInterceptor::new(*name, log.clone()));
        }
        let dispatcher = builder.build();

        block_on(dispatcher.handle_bot_update(text_update(1, "/start"))).unwrap();

        let mut expected: Vec<String> = NAMES[..count]
            .iter()
            .map(|n| format!("{n}:before:handle_chat_update:root"))
            .collect();
        expected.push("root:handle_chat_update".to_string());
        expected.extend(
            NAMES[..count]
                .iter()
                .rev()
                .map(|n| format!("{n}:after:handle_chat_update:root")),
        );
        prop_assert_eq!(log.entries(), expected);
    }

    /// Every switch finishes the old dialog before starting the new one and
    /// leaves the target in the store
    #[test]
    fn prop_forced_switches_are_ordered(targets in proptest::collection::vec(arb_target(), 1..8)) {
        let log = CallLog::default();
        let (dispatcher, store) = signup_bot(&Outbox::default(), &log);
        let key = ConversationKey::new(9);

        block_on(async {
            for target in &targets {
                let switch = dispatcher.switch_to(target).unwrap();
                dispatcher.force_dialog(key, switch).await.unwrap();
            }
        });

        let entries = log.entries();
        prop_assert_eq!(entries.len(), targets.len() * 2);
        let mut active = "root";
        for (pair, target) in entries.chunks(2).zip(&targets) {
            prop_assert_eq!(&pair[0], &format!("{active}:on_finish"));
            prop_assert_eq!(&pair[1], &format!("{target}:on_start"));
            active = *target;
        }
        prop_assert_eq!(store.saves(), targets.len());
        prop_assert_eq!(store.record(key).map(|r| r.name), Some(active.to_string()));
    }

    /// The signup form accepts exactly the inputs its rule allows
    #[test]
    fn prop_signup_verdict(
        user in "[a-z0-9_]{1,10}",
        password in "[a-z0-9]{1,10}",
        confirm_same in any::<bool>(),
    ) {
        let outbox = Outbox::default();
        let (dispatcher, store) = signup_bot(&outbox, &CallLog::default());
        let confirmation = if confirm_same { password.clone() } else { format!("{password}!") };

        block_on(async {
            for text in ["/signup", user.as_str(), password.as_str(), confirmation.as_str()] {
                dispatcher.handle_bot_update(text_update(3, text)).await.unwrap();
            }
        });

        let accepted = user.len() > 5 && password.len() > 5 && confirm_same;
        let verdict = if accepted { "Success!" } else { "Fail!" };
        let texts = outbox.texts();
        prop_assert_eq!(texts.last().map(String::as_str), Some(verdict));
        let record = store.record(ConversationKey::new(3)).unwrap();
        prop_assert_eq!(record.name, "root");
    }
}
