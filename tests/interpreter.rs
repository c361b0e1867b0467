//! Step interpreter tests against the scripted browser

mod support;

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};

use scenario_runner::browser::ElementProperty;
use scenario_runner::interpreter::{ExecutionContext, Interpreter};
use scenario_runner::scenario::{Status, StepDefinition, StepResult, Variables};
use scenario_runner::{Error, Result};

use support::{ClickEffect, Fake};

const DIALOG: &str = "[role='dialog'][aria-modal='true']";
const RETRY_BUTTON: &str = "button:has-text('확인했어요') >> nth=0";

async fn run_step(fake: &Fake, step: Value) -> Result<StepResult> {
    run_step_with(fake, step, &Variables::new()).await
}

async fn run_step_with(fake: &Fake, step: Value, variables: &Variables) -> Result<StepResult> {
    let step: StepDefinition = serde_json::from_value(step).unwrap();
    let mut session = fake.session();
    let interpreter = Interpreter::default();
    let mut ctx = ExecutionContext {
        session: &mut session,
        variables,
        step_num: 1,
        screenshot_prefix: None,
        auth_state_path: Path::new("/nonexistent/auth.json"),
    };
    interpreter.execute(&step, &mut ctx).await
}

/// Run steps in order on one session, stopping at the first error
async fn run_steps(fake: &Fake, steps: Vec<Value>) -> Result<Vec<StepResult>> {
    let mut session = fake.session();
    let interpreter = Interpreter::default();
    let variables = Variables::new();
    let mut results = Vec::new();
    for (i, step) in steps.into_iter().enumerate() {
        let step: StepDefinition = serde_json::from_value(step).unwrap();
        let mut ctx = ExecutionContext {
            session: &mut session,
            variables: &variables,
            step_num: i + 1,
            screenshot_prefix: None,
            auth_state_path: Path::new("/nonexistent/auth.json"),
        };
        results.push(interpreter.execute(&step, &mut ctx).await?);
    }
    Ok(results)
}

fn assignment(id: i64, name: &str) -> String {
    json!({ "data": { "gaCompanyId": id, "gaCompanyName": name } }).to_string()
}

#[tokio::test(start_paused = true)]
async fn retry_matches_on_third_attempt() {
    let fake = Fake::new();
    fake.script(|s| {
        s.route_bodies.extend([
            assignment(1, "Alpha"),
            assignment(2, "Beta"),
            assignment(3, "Gamma"),
        ]);
    });

    let result = run_step(
        &fake,
        json!({"action": "retryUntilGa", "targetGaCompanyId": "3", "description": "Get GA 3"}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Pass);
    assert_eq!(
        result.description,
        "Get GA 3 (matched on attempt 3 (id=3, Gamma))"
    );
    fake.log(|log| {
        assert_eq!(log.routes_registered, 3);
        assert_eq!(log.routes_deregistered, 3);
        assert_eq!(log.aborted, ["r1", "r2"]);
        assert_eq!(log.fulfilled, ["r3"]);
    });
}

#[tokio::test(start_paused = true)]
async fn retry_gives_up_after_max_attempts() {
    let fake = Fake::new();
    fake.script(|s| s.route_bodies.push_back(assignment(9, "Other")));

    let result = run_step(
        &fake,
        json!({"action": "retryUntilGa", "targetGaCompanyId": 3, "maxRetries": 2}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Fail);
    let error = result.error.unwrap();
    assert!(error.contains("id=3"), "{}", error);
    assert!(error.contains("2 attempts"), "{}", error);
    fake.log(|log| {
        assert_eq!(log.routes_registered, 2);
        assert_eq!(log.routes_deregistered, 2);
        assert!(log.fulfilled.is_empty());
    });
}

#[tokio::test(start_paused = true)]
async fn retry_never_judges_a_late_response_as_its_own() {
    let fake = Fake::new();
    fake.script(|s| {
        // The first call answers with the target, but only after the
        // attempt has stopped waiting for it.
        s.route_bodies.extend([
            assignment(3, "Late"),
            assignment(9, "Other"),
            assignment(9, "Other"),
        ]);
        s.route_latencies.extend([
            Duration::from_millis(1_700),
            Duration::from_millis(50),
            Duration::from_millis(50),
        ]);
    });

    let result = run_step(
        &fake,
        json!({"action": "retryUntilGa", "targetGaCompanyId": 3, "maxRetries": 3}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Fail);
    let error = result.error.unwrap();
    assert!(error.contains("3 attempts"), "{}", error);
    fake.log(|log| {
        assert!(log.fulfilled.is_empty());
        assert_eq!(log.aborted, ["r1", "r2", "r3"]);
        assert_eq!(log.routes_registered, 3);
        assert_eq!(log.routes_deregistered, 3);
    });
}

#[tokio::test(start_paused = true)]
async fn retry_matches_after_discarding_a_late_mismatch() {
    let fake = Fake::new();
    fake.script(|s| {
        s.route_bodies
            .extend([assignment(9, "Slow"), assignment(3, "Target")]);
        s.route_latencies.push_back(Duration::from_millis(1_700));
    });

    let result = run_step(
        &fake,
        json!({"action": "retryUntilGa", "targetGaCompanyId": 3, "maxRetries": 3}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Pass);
    assert!(result.description.contains("attempt 2 (id=3, Target)"));
    fake.log(|log| {
        assert_eq!(log.aborted, ["r1"]);
        assert_eq!(log.fulfilled, ["r2"]);
    });
}

#[tokio::test(start_paused = true)]
async fn retry_click_failure_still_deregisters() {
    let fake = Fake::new();
    fake.script(|s| {
        s.failing_clicks.insert(RETRY_BUTTON.to_string());
    });

    let result = run_step(&fake, json!({"action": "retryUntilGa", "targetGaCompanyId": 3}))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert!(result.error.unwrap().starts_with("click failed:"));
    fake.log(|log| {
        assert_eq!(log.routes_registered, 1);
        assert_eq!(log.routes_deregistered, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn retry_without_target_is_a_configuration_failure() {
    let fake = Fake::new();
    let result = run_step(&fake, json!({"action": "retryUntilGa"}))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert!(result.error.unwrap().contains("targetGaCompanyId"));
    fake.log(|log| assert_eq!(log.routes_registered, 0));
}

#[tokio::test(start_paused = true)]
async fn terms_ticks_unchecked_boxes_and_agrees() {
    let checkboxes = format!("{} >> input[type='checkbox']", DIALOG);
    let agree = format!("{} >> button >> nth=-1", DIALOG);
    let fake = Fake::new();
    fake.script(|s| {
        s.counts.insert(DIALOG.to_string(), 1);
        s.counts.insert(checkboxes.clone(), 2);
        let props = &mut s.properties;
        props.insert((format!("{} >> nth=0", DIALOG), ElementProperty::Visible), true);
        props.insert((format!("{} >> nth=0", checkboxes), ElementProperty::Visible), true);
        props.insert((format!("{} >> nth=1", checkboxes), ElementProperty::Visible), true);
        props.insert((format!("{} >> nth=1", checkboxes), ElementProperty::Checked), true);
        props.insert((agree.clone(), ElementProperty::Visible), true);
        props.insert((agree.clone(), ElementProperty::Enabled), true);
    });

    let result = run_step(&fake, json!({"action": "handleTermsAgreement"}))
        .await
        .unwrap();

    assert!(result.passed());
    assert_eq!(result.description, "handleTermsAgreement (terms agreed)");
    fake.log(|log| {
        assert_eq!(
            log.calls,
            [
                format!("click {} >> nth=0 (force)", checkboxes),
                format!("click {}", agree),
            ]
        );
    });
}

#[tokio::test(start_paused = true)]
async fn terms_absent_fails_only_when_required() {
    let fake = Fake::new();

    let optional = run_step(&fake, json!({"action": "handleTermsAgreement"}))
        .await
        .unwrap();
    assert!(optional.passed());

    let required = run_step(&fake, json!({"action": "handleTermsAgreement", "required": true}))
        .await
        .unwrap();
    assert_eq!(required.status, Status::Fail);
}

#[tokio::test(start_paused = true)]
async fn unknown_action_fails_with_its_name() {
    let fake = Fake::new();
    let result = run_step(&fake, json!({"action": "hover", "selector": "#menu"}))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert_eq!(result.error.as_deref(), Some("Unknown action: 'hover'"));
}

#[tokio::test(start_paused = true)]
async fn navigate_detects_expired_session() {
    let fake = Fake::new();
    fake.script(|s| {
        s.redirects.insert(
            "https://app.example.com/counsel".to_string(),
            "https://app.example.com/web-login?next=/counsel".to_string(),
        );
    });

    let result = run_step(
        &fake,
        json!({"action": "navigate", "url": "https://app.example.com/counsel"}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert!(result.error.unwrap().starts_with("Session expired"));
}

#[tokio::test(start_paused = true)]
async fn navigate_error_propagates() {
    let fake = Fake::new();
    fake.script(|s| {
        s.failing_gotos.insert("https://down.example.com".to_string());
    });

    let result = run_step(&fake, json!({"action": "navigate", "url": "https://down.example.com"})).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn expect_url_reports_expected_and_actual() {
    let fake = Fake::new();
    let result = run_step(&fake, json!({"action": "expect", "type": "url", "value": "/complete"}))
        .await
        .unwrap();

    let error = result.error.unwrap();
    assert!(error.contains("/complete"));
    assert!(error.contains("about:blank"));
}

#[tokio::test(start_paused = true)]
async fn expect_visible_tries_each_alternative() {
    let fake = Fake::new();
    fake.script(|s| {
        s.present.insert("#second >> nth=0".to_string());
    });

    let hit = run_step(&fake, json!({"action": "expect", "type": "visible", "selector": "#first, #second"}))
        .await
        .unwrap();
    assert!(hit.passed());

    let miss = run_step(&fake, json!({"action": "expect", "type": "visible", "selector": "#first, #third"}))
        .await
        .unwrap();
    assert!(miss.error.unwrap().contains("#first, #third"));
}

#[tokio::test(start_paused = true)]
async fn expect_hidden_passes_for_absent_or_unlocatable_elements() {
    let fake = Fake::new();
    fake.script(|s| {
        s.failing_selectors.insert("div:bad(".to_string());
    });

    let absent = run_step(&fake, json!({"action": "expect", "type": "hidden", "selector": "#toast"}))
        .await
        .unwrap();
    assert!(absent.passed());

    let broken = run_step(&fake, json!({"action": "expect", "type": "hidden", "selector": "div:bad("}))
        .await
        .unwrap();
    assert!(broken.passed());
}

#[tokio::test(start_paused = true)]
async fn expect_hidden_rechecks_once() {
    let fake = Fake::new();
    fake.script(|s| {
        s.counts.insert("#toast".to_string(), 1);
        s.property_answers.insert(
            ("#toast >> nth=0".to_string(), ElementProperty::Visible),
            [true, false].into(),
        );
        s.counts.insert("#banner".to_string(), 1);
        s.properties
            .insert(("#banner >> nth=0".to_string(), ElementProperty::Visible), true);
    });

    let faded = run_step(&fake, json!({"action": "expect", "type": "hidden", "selector": "#toast"}))
        .await
        .unwrap();
    assert!(faded.passed());

    let stuck = run_step(&fake, json!({"action": "expect", "type": "hidden", "selector": "#banner"}))
        .await
        .unwrap();
    assert_eq!(stuck.status, Status::Fail);
    assert_eq!(
        stuck.error.as_deref(),
        Some("Expected hidden, still visible: #banner")
    );
}

#[tokio::test(start_paused = true)]
async fn expect_disabled_and_enabled_read_the_first_match() {
    let fake = Fake::new();
    fake.script(|s| {
        s.present.insert("#submit >> nth=0".to_string());
        s.properties
            .insert(("#submit >> nth=0".to_string(), ElementProperty::Enabled), true);
    });

    let enabled = run_step(&fake, json!({"action": "expect", "type": "enabled", "selector": "#submit"}))
        .await
        .unwrap();
    assert!(enabled.passed());

    let disabled = run_step(&fake, json!({"action": "expect", "type": "disabled", "selector": "#submit"}))
        .await
        .unwrap();
    assert_eq!(disabled.status, Status::Fail);
    assert_eq!(
        disabled.error.as_deref(),
        Some("Expected disabled, got enabled: #submit")
    );
}

#[tokio::test(start_paused = true)]
async fn expect_enabled_fails_when_element_never_attaches() {
    let fake = Fake::new();
    let result = run_step(&fake, json!({"action": "expect", "type": "enabled", "selector": "#missing"}))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Fail);
    let error = result.error.unwrap();
    assert!(error.starts_with("#missing: "), "{}", error);
    assert!(error.contains("5000 ms"), "{}", error);
}

#[tokio::test(start_paused = true)]
async fn wait_for_url_honours_exclude_until_timeout() {
    let fake = Fake::new();
    let outcome = run_steps(
        &fake,
        vec![
            json!({"action": "navigate", "url": "https://app.example.com/car-insurance/history"}),
            json!({
                "action": "waitForUrl",
                "pattern": "**/car-insurance**",
                "exclude": "/history",
                "timeout": 500
            }),
        ],
    )
    .await;

    match outcome {
        Err(Error::UrlTimeout {
            pattern,
            last_url,
            timeout_ms,
        }) => {
            assert_eq!(pattern, "**/car-insurance**");
            assert_eq!(last_url, "https://app.example.com/car-insurance/history");
            assert_eq!(timeout_ms, 500);
        }
        other => panic!("expected URL timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn wait_for_url_passes_once_matched() {
    let fake = Fake::new();
    let results = run_steps(
        &fake,
        vec![
            json!({"action": "navigate", "url": "https://app.example.com/car-insurance/history"}),
            json!({"action": "waitForUrl", "pattern": "**/car-insurance**", "timeout": 500}),
        ],
    )
    .await
    .unwrap();

    assert!(results.iter().all(StepResult::passed));
}

#[tokio::test(start_paused = true)]
async fn inject_user_info_formats_phone() {
    let fake = Fake::new();
    let result = run_step(
        &fake,
        json!({
            "action": "injectUserInfo",
            "store": "COUNSEL",
            "userData": {"name": "Kim", "phone": "01012345678"},
            "description": "Inject user"
        }),
    )
    .await
    .unwrap();

    assert!(result.passed());
    assert_eq!(result.description, "Inject user (name=Kim, gender=(none))");
    fake.log(|log| {
        let arg = &log.evaluations[0];
        assert_eq!(arg["global"], "__COUNSEL_STORE__");
        assert_eq!(arg["state"]["userInfo"]["phone"], "010-1234-5678");
    });
}

#[tokio::test(start_paused = true)]
async fn inject_into_unknown_store_fails() {
    let fake = Fake::new();
    let result = run_step(
        &fake,
        json!({"action": "injectStoreData", "store": "CART", "data": {"step": 2}}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert!(result.error.unwrap().contains("COUNSEL"));
    fake.log(|log| assert!(log.evaluations.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn fetch_and_inject_reports_fetch_errors() {
    let fake = Fake::new();
    fake.script(|s| {
        s.evaluate_results
            .push_back(json!({"error": "HTTP 401 from /api/me"}));
    });

    let result = run_step(
        &fake,
        json!({"action": "fetchAndInjectUserInfo", "store": "COUNSEL", "endpoint": "/api/me"}),
    )
    .await
    .unwrap();

    assert_eq!(result.status, Status::Fail);
    assert!(result.error.unwrap().contains("HTTP 401"));
}

#[tokio::test(start_paused = true)]
async fn session_storage_before_navigation_uses_init_script() {
    let fake = Fake::new();
    let result = run_step(
        &fake,
        json!({"action": "setSessionStorage", "key": "entry", "value": "banner"}),
    )
    .await
    .unwrap();

    assert!(result.passed());
    fake.log(|log| {
        assert_eq!(
            log.init_scripts,
            [r#"window.sessionStorage.setItem("entry", "banner");"#]
        );
        assert!(log.evaluations.is_empty());
    });
}

#[tokio::test(start_paused = true)]
async fn session_storage_after_navigation_sets_item_on_page() {
    let fake = Fake::new();
    let results = run_steps(
        &fake,
        vec![
            json!({"action": "navigate", "url": "https://app.example.com/car-insurance"}),
            json!({"action": "setSessionStorage", "key": "entry", "value": "banner"}),
        ],
    )
    .await
    .unwrap();

    assert!(results[1].passed());
    fake.log(|log| {
        assert_eq!(log.evaluations, [json!(["entry", "banner"])]);
        assert!(log.init_scripts.is_empty());
    });
}

#[tokio::test(start_paused = true)]
async fn cancel_existing_uses_base_url_variable() {
    let fake = Fake::new();
    let mut variables = Variables::new();
    variables.insert("baseUrl".to_string(), "https://app.example.com".to_string());

    let result = run_step_with(&fake, json!({"action": "cancelExistingCounsel"}), &variables)
        .await
        .unwrap();

    assert!(result.passed());
    fake.log(|log| {
        assert_eq!(log.visited, ["https://app.example.com/car-insurance/history"]);
    });
}

#[tokio::test(start_paused = true)]
async fn cancel_existing_skips_when_history_redirects() {
    let fake = Fake::new();
    fake.script(|s| {
        s.redirects.insert(
            "https://app.example.com/car-insurance/history".to_string(),
            "https://app.example.com/car-insurance".to_string(),
        );
    });

    let result = run_step(
        &fake,
        json!({"action": "cancelExistingCounsel", "baseUrl": "https://app.example.com"}),
    )
    .await
    .unwrap();

    assert_eq!(result.description, "cancelExistingCounsel (nothing to cancel)");
}

const HISTORY: &str = "https://app.example.com/car-insurance/history";
const CANCEL_BUTTON: &str = "button:has-text('상담 취소하기') >> nth=0";
const CANCEL_MODAL: &str = "[role='dialog'], [aria-modal='true']";
const CANCEL_CONFIRM: &str =
    "[role='dialog'], [aria-modal='true'] >> button:has-text('상담 취소') >> nth=0";

/// History page with one cancel control and a confirm modal
fn history_with_items(fake: &Fake, confirm_effects: Vec<ClickEffect>) {
    fake.script(|s| {
        s.present.insert(CANCEL_BUTTON.to_string());
        s.present.insert(CANCEL_CONFIRM.to_string());
        s.counts.insert(CANCEL_MODAL.to_string(), 1);
        s.click_effects
            .insert(CANCEL_CONFIRM.to_string(), confirm_effects.into());
    });
}

#[tokio::test(start_paused = true)]
async fn cancel_existing_counts_until_button_is_gone() {
    let fake = Fake::new();
    history_with_items(
        &fake,
        vec![ClickEffect::none(), ClickEffect::hide(CANCEL_BUTTON)],
    );

    let result = run_step(
        &fake,
        json!({"action": "cancelExistingCounsel", "baseUrl": "https://app.example.com/"}),
    )
    .await
    .unwrap();

    assert!(result.passed());
    assert_eq!(result.description, "cancelExistingCounsel (2 cancelled)");
    fake.log(|log| {
        assert_eq!(log.visited, [HISTORY]);
        let confirms = log
            .calls
            .iter()
            .filter(|c| c.as_str() == format!("click {}", CANCEL_CONFIRM))
            .count();
        assert_eq!(confirms, 2);
    });
}

#[tokio::test(start_paused = true)]
async fn cancel_existing_stops_when_page_leaves_history() {
    let fake = Fake::new();
    history_with_items(
        &fake,
        vec![ClickEffect::goto("https://app.example.com/car-insurance")],
    );

    let result = run_step(
        &fake,
        json!({"action": "cancelExistingCounsel", "baseUrl": "https://app.example.com"}),
    )
    .await
    .unwrap();

    assert!(result.passed());
    assert_eq!(result.description, "cancelExistingCounsel (1 cancelled)");
    fake.log(|log| {
        let cancels = log
            .calls
            .iter()
            .filter(|c| c.as_str() == format!("click {}", CANCEL_BUTTON))
            .count();
        assert_eq!(cancels, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn markers_always_pass() {
    let fake = Fake::new();
    for kind in ["loadState", "launchBrowser"] {
        let result = run_step(&fake, json!({"action": kind})).await.unwrap();
        assert!(result.passed(), "{}", kind);
    }
    let manual = run_step(&fake, json!({"action": "manualAction", "instruction": "Check the PDF"}))
        .await
        .unwrap();
    assert_eq!(manual.description, "manualAction (manual)");
}
