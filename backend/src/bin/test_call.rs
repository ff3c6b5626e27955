//! Utility binary for checking the outbound-call setup
//! This is a utility binary, not part of the main application
//!
//! Without arguments it only reports which settings are present.
//! With `--place` it places one real call and prints the outcome.

use crm_actions_backend::calls::{CallRequest, CallResult, CancelSignal};
use crm_actions_backend::config::Config;
use crm_actions_backend::state::AppState;
use std::env;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Checking outbound call configuration...\n");
    let config = Config::from_env();

    let checks = [
        ("VAPI_API_KEY", config.voice.api_key.is_some()),
        ("VAPI_PHONE_NUMBER_ID", config.voice.phone_number_id.is_some()),
        ("VAPI_ASSISTANT_ID", config.voice.assistant_id.is_some()),
        (
            "DEFAULT_CUSTOMER_NUMBER",
            config.voice.default_customer_number.is_some(),
        ),
    ];

    let mut missing = 0;
    for (name, present) in checks {
        if present {
            println!("   ✓ {} is set", name);
        } else {
            missing += 1;
            eprintln!("   ✗ {} is not set", name);
        }
    }

    println!(
        "\n   Polling every {}s, giving up after {}s{}",
        config.polling.interval.as_secs(),
        config.polling.max_wait.as_secs(),
        config
            .polling
            .max_attempts
            .map(|n| format!(" or {} polls", n))
            .unwrap_or_default()
    );

    if !env::args().any(|arg| arg == "--place") {
        println!("\nRun with --place to dial DEFAULT_CUSTOMER_NUMBER for real.");
        return Ok(());
    }

    if missing > 0 {
        return Err(format!("{} required setting(s) missing", missing).into());
    }

    println!("\nPlacing call to {:?}...", config.voice.default_customer_number);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::from_config(&config, shutdown_rx)?;

    let handle = state.calls.submit(CallRequest::default()).await?;
    println!("   ✓ Call submitted: {}", handle);

    let mut cancel = CancelSignal::never();
    let result = state
        .calls
        .await_completion_with(&handle, &mut cancel, |update| {
            println!("   poll #{}: {}", update.attempt, update.status);
        })
        .await?;

    print_result(&result);
    Ok(())
}

fn print_result(result: &CallResult) {
    println!("\n   ✓ Call finished with status '{}' after {} polls", result.status, result.polls);
    if let Some(reason) = &result.ended_reason {
        println!("   Ended reason: {}", reason);
    }
    match &result.transcript {
        Some(utterances) => {
            println!("\n   Transcript:");
            for utterance in utterances {
                println!("   {:?}: {}", utterance.speaker, utterance.text);
            }
        }
        None => println!("\n   No transcript available"),
    }
    if let Some(summary) = &result.summary {
        println!("\n   Summary: {}", summary);
    }
}
