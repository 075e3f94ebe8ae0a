//! End-to-end tests driving a real `git` binary against a local bare
//! upstream repository.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use gitsync::{Checkout, CommitAction, Config, OpContext, Repo, StderrKind, SyncError};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageNote {
    image: String,
    tag: String,
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Bare upstream with one commit on `main` adding `manifests/deployment.yaml`.
/// Returns the upstream URL (a local path) and the seed clone used to
/// author further upstream history.
fn seed_upstream(root: &Path) -> (String, PathBuf) {
    let upstream = root.join("upstream.git");
    let seed = root.join("seed");

    git(root, &["init", "--bare", "-b", "main", "upstream.git"]);
    git(root, &["init", "-b", "main", "seed"]);
    git(&seed, &["config", "user.name", "Seed"]);
    git(&seed, &["config", "user.email", "seed@localhost"]);

    std::fs::create_dir_all(seed.join("manifests")).unwrap();
    std::fs::write(seed.join("manifests/deployment.yaml"), "replicas: 1\n").unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-m", "initial manifests"]);
    git(&seed, &["remote", "add", "origin", upstream.to_str().unwrap()]);
    git(&seed, &["push", "origin", "main"]);

    (upstream.to_str().unwrap().to_string(), seed)
}

fn test_config() -> Config {
    Config {
        branch: "main".to_string(),
        path: "manifests".to_string(),
        notes_ref: "choerodon".to_string(),
        skip_message: " [ci skip]".to_string(),
        ..Config::default()
    }
}

async fn checkout(root: &Path, url: &str, config: Config) -> Checkout {
    Repo::new(url)
        .with_workdir_root(root)
        .clone(&OpContext::unbounded(), config)
        .await
        .expect("clone failed")
}

#[tokio::test]
async fn clone_then_clean_leaves_no_directory() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());

    let co = checkout(root.path(), &url, test_config()).await;
    let dir = co.dir().to_path_buf();
    assert!(dir.is_dir());
    assert!(co.manifest_dir().join("deployment.yaml").is_file());

    co.clean();
    assert!(!dir.exists());
    co.clean(); // idempotent
}

#[tokio::test]
async fn commit_and_push_without_changes_is_a_sentinel() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    let head_before = co.head_revision(&ctx).await.unwrap();

    let err = co
        .commit_and_push::<ImageNote>(
            &ctx,
            CommitAction {
                author: None,
                message: "noop".to_string(),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_no_changes());

    // No commit was performed locally, and the upstream did not move.
    assert_eq!(co.head_revision(&ctx).await.unwrap(), head_before);
    let fresh = checkout(root.path(), &url, test_config()).await;
    assert_eq!(fresh.head_revision(&ctx).await.unwrap(), head_before);
}

#[tokio::test]
async fn commit_and_push_advances_head_and_round_trips_the_note() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    let head_before = co.head_revision(&ctx).await.unwrap();

    std::fs::write(
        co.manifest_dir().join("deployment.yaml"),
        "replicas: 1\nimage: app:v2\n",
    )
    .unwrap();

    let note = ImageNote {
        image: "app".to_string(),
        tag: "v2".to_string(),
    };
    co.commit_and_push(
        &ctx,
        CommitAction {
            author: None,
            message: "bump app to v2".to_string(),
        },
        Some(&note),
    )
    .await
    .unwrap();

    let head = co.head_revision(&ctx).await.unwrap();
    assert_ne!(head, head_before);

    // Note round-trip: serialize → attach → read → equal.
    let read: Option<ImageNote> = co.get_note(&ctx, &head).await.unwrap();
    assert_eq!(read, Some(note));
    let absent: Option<ImageNote> = co.get_note(&ctx, &head_before).await.unwrap();
    assert_eq!(absent, None);

    // note_rev_list membership matches get_note found-ness.
    let noted = co.note_rev_list(&ctx).await.unwrap();
    assert!(noted.contains(&head));
    assert!(!noted.contains(&head_before));
    assert_eq!(noted.len(), 1);

    // The skip marker was appended to the agent-authored message.
    let log = co.commits(&ctx, "HEAD").await.unwrap();
    assert_eq!(log[0].revision, head);
    assert!(log[0].message.ends_with(" [ci skip]"));

    // The branch and the notes ref both reached the upstream.
    let fresh = checkout(root.path(), &url, test_config()).await;
    assert_eq!(fresh.head_revision(&ctx).await.unwrap(), head);
    fresh
        .fetch(&ctx, &["refs/notes/choerodon:refs/notes/choerodon"])
        .await
        .unwrap();
    let fetched: Option<ImageNote> = fresh.get_note(&ctx, &head).await.unwrap();
    assert!(fetched.is_some());
}

#[tokio::test]
async fn commit_and_push_applies_the_author_override() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    std::fs::write(co.manifest_dir().join("deployment.yaml"), "replicas: 5\n").unwrap();

    co.commit_and_push::<ImageNote>(
        &ctx,
        CommitAction {
            author: Some("Operator <op@example.com>".to_string()),
            message: "bump replicas".to_string(),
        },
        None,
    )
    .await
    .unwrap();

    let author = git(co.dir(), &["log", "-1", "--pretty=%an <%ae>"]);
    assert_eq!(author.trim(), "Operator <op@example.com>");
}

#[tokio::test]
async fn move_sync_tag_and_push_records_the_reconciled_commit() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    let head = co.head_revision(&ctx).await.unwrap();

    // The devops tag was never created: resolving it is an unknown
    // revision, not a crash.
    let err = co.dev_ops_sync_revision(&ctx).await.unwrap_err();
    assert_eq!(err.git_kind(), Some(StderrKind::UnknownRevision));

    co.move_sync_tag_and_push(&ctx, &head, "sync checkpoint")
        .await
        .unwrap();
    assert_eq!(co.sync_revision(&ctx).await.unwrap(), head);

    // Advancing an existing tag never fails with "already exists".
    co.move_sync_tag_and_push(&ctx, "HEAD", "sync checkpoint again")
        .await
        .unwrap();
    assert_eq!(co.sync_revision(&ctx).await.unwrap(), head);

    // A fresh clone sees the pushed tag.
    let fresh = checkout(root.path(), &url, test_config()).await;
    assert_eq!(fresh.sync_revision(&ctx).await.unwrap(), head);
}

#[tokio::test]
async fn changed_files_excludes_deletions_and_resolves_both_forms() {
    let root = TempDir::new().unwrap();
    let (url, seed) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    // Tip commit adds one file and deletes another.
    std::fs::write(seed.join("manifests/service.yaml"), "port: 80\n").unwrap();
    git(&seed, &["rm", "-q", "manifests/deployment.yaml"]);
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-m", "swap deployment for service"]);
    git(&seed, &["push", "origin", "main"]);

    let co = checkout(root.path(), &url, test_config()).await;
    let (absolute, relative) = co.changed_files(&ctx, "HEAD~1").await.unwrap();

    assert_eq!(relative, vec!["manifests/service.yaml".to_string()]);
    assert_eq!(absolute, vec![co.dir().join("manifests/service.yaml")]);
    assert_eq!(
        absolute[0].file_name().unwrap(),
        Path::new(&relative[0]).file_name().unwrap()
    );

    // Leading-slash subdirectories are rejected before any subprocess.
    let bad = checkout(
        root.path(),
        &url,
        Config {
            path: "/manifests".to_string(),
            ..test_config()
        },
    )
    .await;
    let err = bad.changed_files(&ctx, "HEAD~1").await.unwrap_err();
    assert!(matches!(err, SyncError::AbsoluteSubdir(_)));
}

#[tokio::test]
async fn changed_files_sees_uncommitted_working_tree_edits() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    std::fs::write(co.manifest_dir().join("deployment.yaml"), "replicas: 3\n").unwrap();

    let (_, relative) = co.changed_files(&ctx, "HEAD").await.unwrap();
    assert_eq!(relative, vec!["manifests/deployment.yaml".to_string()]);
}

#[tokio::test]
async fn file_last_commit_and_rev_list_walk_history() {
    let root = TempDir::new().unwrap();
    let (url, seed) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    std::fs::write(seed.join("manifests/service.yaml"), "port: 80\n").unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-m", "add service"]);
    git(&seed, &["push", "origin", "main"]);

    let co = checkout(root.path(), &url, test_config()).await;
    let head = co.head_revision(&ctx).await.unwrap();

    let all = co.rev_list(&ctx, "HEAD").await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], head);

    // deployment.yaml was last touched by the initial commit.
    assert_eq!(
        co.file_last_commit(&ctx, "manifests/deployment.yaml")
            .await
            .unwrap(),
        all[1]
    );
    assert_eq!(
        co.file_last_commit(&ctx, "manifests/service.yaml")
            .await
            .unwrap(),
        head
    );
}

#[tokio::test]
async fn mirror_clone_carries_all_refs() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    let head = co.head_revision(&ctx).await.unwrap();
    co.move_sync_tag_and_push(&ctx, &head, "sync checkpoint")
        .await
        .unwrap();

    let mirror = Repo::new(&url)
        .with_workdir_root(root.path())
        .mirror(&ctx, test_config())
        .await
        .unwrap();
    assert_eq!(mirror.head_revision(&ctx).await.unwrap(), head);
    assert_eq!(mirror.sync_revision(&ctx).await.unwrap(), head);
}

#[tokio::test]
async fn fetch_of_missing_remote_ref_is_swallowed() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    co.fetch(&ctx, &["refs/notes/never-written:refs/notes/never-written"])
        .await
        .unwrap();
}

#[tokio::test]
async fn check_push_leaves_no_tag_on_the_upstream() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    co.check_push(&ctx).await.unwrap();

    let upstream_tags = git(&root.path().join("upstream.git"), &["tag"]);
    assert!(!upstream_tags.contains("sync-write-check"));
}

#[tokio::test]
async fn expired_context_refuses_network_operations() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());

    let expired = OpContext::with_timeout(Duration::ZERO);
    let err = Repo::new(&url)
        .with_workdir_root(root.path())
        .clone(&expired, test_config())
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());

    let co = checkout(root.path(), &url, test_config()).await;
    let (canceled, handle) = OpContext::cancellable();
    handle.cancel();
    let err = co.head_revision(&canceled).await.unwrap_err();
    assert!(err.is_canceled());
}

#[tokio::test]
async fn push_failure_is_wrapped_with_the_upstream_url() {
    let root = TempDir::new().unwrap();
    let (url, _) = seed_upstream(root.path());
    let ctx = OpContext::unbounded();

    let co = checkout(root.path(), &url, test_config()).await;
    // Break the upstream out from under the checkout.
    std::fs::remove_dir_all(root.path().join("upstream.git")).unwrap();

    std::fs::write(co.manifest_dir().join("deployment.yaml"), "replicas: 9\n").unwrap();
    let err = co
        .commit_and_push::<ImageNote>(
            &ctx,
            CommitAction {
                author: None,
                message: "bump".to_string(),
            },
            None,
        )
        .await
        .unwrap_err();
    match err {
        SyncError::Push { upstream, .. } => assert_eq!(upstream, url),
        other => panic!("expected push error, got: {other}"),
    }
}
