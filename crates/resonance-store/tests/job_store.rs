//! Integration tests against the real SQLite backend, covering the
//! invariants in spec §8 (Testable Properties).

use resonance_core::model::{SourceKind, Stage};
use resonance_store::traits::ArtifactRefs;
use resonance_store::JobStore;

async fn open_temp() -> (resonance_store::SqliteJobStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobstore.db");
    let store = resonance_store::open(path.to_str().unwrap()).await.unwrap();
    (store, dir)
}

#[tokio::test]
async fn insert_and_claim_full_pipeline() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/test", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    let claimed = store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.stage, Stage::Downloading);

    store.complete(id, Stage::Downloaded, ArtifactRefs { audio_path: Some("audio/1/a.wav".into()), ..Default::default() }).await.unwrap();

    let claimed = store.claim_submission("worker-b", Stage::Transcribing, chrono::Duration::minutes(10)).await.unwrap().unwrap();
    assert_eq!(claimed.stage, Stage::Transcribing);
    store.complete(id, Stage::Transcribed, ArtifactRefs { transcript_path: Some("transcripts/1.json".into()), ..Default::default() }).await.unwrap();

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Transcribed);
    assert_eq!(submission.transcript_path.as_deref(), Some("transcripts/1.json"));
}

#[tokio::test]
async fn duplicate_source_within_dedup_window_is_rejected() {
    let (store, _dir) = open_temp().await;
    store
        .insert_submission(SourceKind::RemoteUrl, "https://example/dup", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    let err = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/dup", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap_err();
    assert_eq!(err.taxonomy_tag(), "duplicate-source");
}

#[tokio::test]
async fn no_two_claims_for_the_same_submission() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/race", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    let a = store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();
    let b = store.claim_submission("worker-b", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();
    assert!(a.is_some());
    assert!(b.is_none(), "a second worker must not be able to claim the same submission");
    assert_eq!(a.unwrap().id, id);
}

#[tokio::test]
async fn sweep_reclaims_expired_claims() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/crash", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    // Negative lease so the claim is immediately expired.
    store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::seconds(-60)).await.unwrap().unwrap();

    let reclaimed = store.sweep_expired_claims().await.unwrap();
    assert_eq!(reclaimed, 1);

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Queued);
    assert!(submission.claim_owner.is_none());

    let claimed_again = store.claim_submission("worker-b", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();
    assert!(claimed_again.is_some());
}

#[tokio::test]
async fn sweep_expired_claims_increments_lease_expiration_count() {
    let (store, _dir) = open_temp().await;
    store
        .insert_submission(SourceKind::RemoteUrl, "https://example/lease", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    assert_eq!(store.stats().await.unwrap().lease_expirations_last_hour, 0);

    store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::seconds(-60)).await.unwrap().unwrap();
    store.sweep_expired_claims().await.unwrap();

    assert_eq!(store.stats().await.unwrap().lease_expirations_last_hour, 1);
}

#[tokio::test]
async fn cancel_requested_between_stages_is_swept_to_cancelled() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/cancel", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();

    let claimed = store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap().unwrap();
    store.complete(id, Stage::Downloaded, ArtifactRefs { audio_path: Some("audio/1/a.wav".into()), ..Default::default() }).await.unwrap();
    assert_eq!(claimed.stage, Stage::Downloading);

    store.request_cancel(id).await.unwrap();

    // No worker ever claims a cancel-requested submission again, so nothing
    // but the sweep can move it out of `downloaded`.
    let reclaimed = store.claim_submission("worker-b", Stage::Transcribing, chrono::Duration::minutes(10)).await.unwrap();
    assert!(reclaimed.is_none());

    let swept = store.sweep_cancelled_submissions().await.unwrap();
    assert_eq!(swept, 1);

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Cancelled);
}

#[tokio::test]
async fn sweep_cancelled_submissions_skips_active_claims() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/cancel-running", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();
    store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();
    store.request_cancel(id).await.unwrap();

    let swept = store.sweep_cancelled_submissions().await.unwrap();
    assert_eq!(swept, 0, "a submission mid-stage must finish before being swept to cancelled");

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Downloading);
}

#[tokio::test]
async fn backpressure_rejects_insert_at_high_water_mark() {
    let (store, _dir) = open_temp().await;
    store
        .insert_submission(SourceKind::RemoteUrl, "https://example/1", "user-1", None, chrono::Duration::hours(24), 1)
        .await
        .unwrap();

    let err = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/2", "user-1", None, chrono::Duration::hours(24), 1)
        .await
        .unwrap_err();
    assert_eq!(err.taxonomy_tag(), "backpressure");
}

#[tokio::test]
async fn fail_retriable_reverts_to_prerequisite_with_backoff() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/retry", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();
    store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();

    store.fail(id, "timeout", true, 3, chrono::Duration::seconds(30)).await.unwrap();

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Queued);
    assert_eq!(submission.status, resonance_core::model::Status::Pending);
    assert_eq!(submission.attempts, 1);
    assert!(submission.next_attempt_at.is_some());
}

#[tokio::test]
async fn fail_exhausted_attempts_is_terminal() {
    let (store, _dir) = open_temp().await;
    let id = store
        .insert_submission(SourceKind::RemoteUrl, "https://example/exhaust", "user-1", None, chrono::Duration::hours(24), 1000)
        .await
        .unwrap();
    store.claim_submission("worker-a", Stage::Downloading, chrono::Duration::minutes(10)).await.unwrap();

    store.fail(id, "bad url", false, 3, chrono::Duration::seconds(2)).await.unwrap();

    let submission = store.get_submission(id).await.unwrap();
    assert_eq!(submission.stage, Stage::Failed);
}
