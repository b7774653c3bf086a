// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance submit` command implementation.
//!
//! Runs one audio turn through the full pipeline: charge, store, queue, and
//! wait for the worker pool to finish the analysis.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use parlance_config::ParlanceConfig;
use parlance_core::types::{Message, PronunciationAnalysis, Thread, now_timestamp};
use parlance_core::{MessageId, ParlanceError, ThreadId, UnitOfWork, UserId, work};
use parlance_ledger::{CostSchedule, CreditLedger};
use parlance_speech::{FsBlobStore, MlAnalyzer, MlTranscriber};
use parlance_worker::{
    AudioSubmission, Intake, JobOutcome, PoolSettings, PronunciationWorker, SpeechServices,
    WorkerPool, WorkerSettings, install_signal_handler,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Arguments for `parlance submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    pub user: String,
    /// Audio file to submit.
    pub file: PathBuf,
    /// Existing thread to add the turn to; a new thread is created otherwise.
    #[arg(long)]
    pub thread: Option<String>,
    /// Phrase the speaker was asked to say. Defaults to the transcript.
    #[arg(long)]
    pub expected: Option<String>,
    /// Overrides the content type guessed from the file extension.
    #[arg(long)]
    pub content_type: Option<String>,
    /// Print the final message as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run_submit(config: &ParlanceConfig, args: SubmitArgs) -> Result<(), ParlanceError> {
    let storage = crate::open_storage(config).await?;
    let user_id = UserId(args.user.clone());

    let ledger = CreditLedger::new(Arc::clone(&storage));
    ledger
        .initialize(&user_id, config.credits.default_allowance)
        .await?;
    ledger.refresh_if_due(&user_id, Utc::now()).await?;

    let thread_id = match &args.thread {
        Some(id) => ThreadId(id.clone()),
        None => create_thread(storage.as_ref(), &user_id).await?,
    };

    let audio = tokio::fs::read(&args.file)
        .await
        .map_err(|e| ParlanceError::Internal(format!("cannot read {}: {e}", args.file.display())))?;
    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| content_type_for(&args.file).to_string());

    let blobs = Arc::new(FsBlobStore::new(&config.blob));
    let services = SpeechServices {
        blobs: blobs.clone(),
        transcriber: Arc::new(MlTranscriber::new(&config.transcription)?),
        analyzer: Arc::new(MlAnalyzer::new(&config.analysis)?),
    };
    let cancel = install_signal_handler();
    let worker = PronunciationWorker::new(
        Arc::clone(&storage),
        services,
        WorkerSettings::from_config(config),
    );
    let pool = WorkerPool::start(
        worker,
        &PoolSettings::from_config(&config.worker),
        cancel.clone(),
    );
    let mut outcomes = pool.subscribe();
    let intake = Intake::new(
        Arc::clone(&storage),
        blobs,
        pool.queue(),
        CostSchedule::from_config(&config.credits),
        config.worker.job_deadline(),
    );

    let submitted = intake
        .submit_audio_turn(AudioSubmission {
            user_id: user_id.clone(),
            thread_id,
            audio,
            content_type,
            expected_text: args.expected.clone(),
        })
        .await;
    let accepted = match submitted {
        Ok(accepted) => accepted,
        Err(e) => {
            pool.shutdown().await;
            return Err(e);
        }
    };
    let message_id = accepted.message.id.clone();
    let balance = ledger.balance(&user_id).await?;
    let outcome = if accepted.queued {
        eprintln!("accepted {message_id} (balance {balance}), analyzing...");
        wait_for(&mut outcomes, &message_id, &cancel).await
    } else {
        eprintln!("accepted {message_id} (balance {balance}), not queued");
        None
    };
    let report = pool.shutdown().await;
    if report.abandoned > 0 {
        warn!(abandoned = report.abandoned, "jobs left pending");
    }

    let id = message_id.clone();
    let message = storage
        .ambient(work(move |scope| scope.get_message(&id)))
        .await?
        .ok_or_else(|| ParlanceError::not_found("message", message_id.as_str()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&message)
            .map_err(|e| ParlanceError::Internal(format!("failed to render message: {e}")))?;
        println!("{json}");
    } else {
        print_message(&message, outcome.as_ref());
    }
    Ok(())
}

async fn create_thread<U: UnitOfWork>(
    store: &U,
    user_id: &UserId,
) -> Result<ThreadId, ParlanceError> {
    let thread = Thread {
        id: ThreadId::generate(),
        user_id: user_id.clone(),
        name: "cli".to_string(),
        created_at: now_timestamp(),
    };
    let id = thread.id.clone();
    store
        .transaction(work(move |scope| scope.insert_thread(&thread)))
        .await?;
    info!(thread_id = %id, "thread created");
    Ok(id)
}

/// Waits for the outcome of `message_id`, or `None` on interrupt.
async fn wait_for(
    outcomes: &mut broadcast::Receiver<JobOutcome>,
    message_id: &MessageId,
    cancel: &CancellationToken,
) -> Option<JobOutcome> {
    loop {
        tokio::select! {
            received = outcomes.recv() => match received {
                Ok(outcome) if outcome.message_id() == message_id => return Some(outcome),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed job outcomes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            },
            _ = cancel.cancelled() => return None,
        }
    }
}

fn print_message(message: &Message, outcome: Option<&JobOutcome>) {
    println!("message:    {}", message.id);
    println!("status:     {}", message.pronunciation_status);
    if !message.content.is_empty() {
        println!("transcript: {}", message.content);
    }
    match outcome {
        Some(JobOutcome::Completed { phonemes, .. }) => {
            println!("phonemes:   {phonemes} recorded");
        }
        Some(JobOutcome::Failed { reason, .. }) => println!("error:      {reason}"),
        Some(JobOutcome::Aborted { error, .. }) => println!("aborted:    {error}"),
        None => println!("interrupted; the message stays pending"),
    }

    let analysis = message
        .pronunciation_result
        .clone()
        .and_then(|value| serde_json::from_value::<PronunciationAnalysis>(value).ok());
    if let Some(analysis) = analysis {
        println!("expected:   /{}/", analysis.expected_ipa);
        println!("heard:      /{}/", analysis.audio_ipa);
        println!(
            "matches:    {}/{} ({} substituted, {} deleted, {} inserted)",
            analysis.match_count,
            analysis.phoneme_count,
            analysis.substitution_count,
            analysis.deletion_count,
            analysis.insertion_count
        );
    }
}

/// Content type guessed from a file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
