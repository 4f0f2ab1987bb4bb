//! End-to-end shell session tests against the real platform shell.

#![cfg(unix)]

use shrimp_shell::{CommandRequest, ShellManager, ShellManagerConfig};

fn manager() -> ShellManager {
    ShellManager::new(ShellManagerConfig::default())
}

fn request(command: &str) -> CommandRequest {
    CommandRequest {
        command: command.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn echo_returns_stdout_and_exit_zero() {
    let manager = manager();
    let result = manager.run_command(request("echo shrimp")).await.unwrap();
    assert_eq!(result.exit_code, Some(0));
    assert!(result.stdout.contains("shrimp"));
    assert!(!result.timed_out);
}

#[tokio::test]
async fn state_persists_across_commands_on_one_session() {
    let manager = manager();
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let set = CommandRequest {
        session_id: Some(id.clone()),
        command: "FOO=shrimp".to_string(),
        ..Default::default()
    };
    manager.run_command(set).await.unwrap();

    let get = CommandRequest {
        session_id: Some(id),
        command: "echo value:$FOO".to_string(),
        ..Default::default()
    };
    let result = manager.run_command(get).await.unwrap();
    assert!(result.stdout.contains("value:shrimp"));
}

#[tokio::test]
async fn cwd_follows_the_reported_pwd() {
    let manager = manager();
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let req = CommandRequest {
        session_id: Some(id),
        // A real shell `cd` wrapped in a compound command dodges the local
        // intercept, exercising the $PWD capture path.
        command: "cd /tmp && pwd".to_string(),
        ..Default::default()
    };
    let result = manager.run_command(req).await.unwrap();
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.cwd, session.cwd());
    assert!(result.cwd.ends_with("tmp"));
}

#[tokio::test]
async fn cd_intercept_resolves_and_validates() {
    let manager = manager();
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let good = CommandRequest {
        session_id: Some(id.clone()),
        command: "cd /tmp".to_string(),
        ..Default::default()
    };
    let result = manager.run_command(good).await.unwrap();
    assert_eq!(result.exit_code, Some(0));
    assert!(result.stdout.ends_with("tmp"));

    let bad = CommandRequest {
        session_id: Some(id),
        command: "cd /no/such/dir/shrimp".to_string(),
        ..Default::default()
    };
    let result = manager.run_command(bad).await.unwrap();
    assert_eq!(result.exit_code, Some(1));
    assert!(result.stderr.contains("cd: no such directory"));
}

#[tokio::test]
async fn busy_session_fails_fast_with_structured_result() {
    let manager = std::sync::Arc::new(manager());
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let slow = CommandRequest {
        session_id: Some(id.clone()),
        command: "sleep 1".to_string(),
        ..Default::default()
    };
    let bg = {
        let manager = std::sync::Arc::clone(&manager);
        tokio::spawn(async move { manager.run_command(slow).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let second = CommandRequest {
        session_id: Some(id),
        command: "echo should-not-run".to_string(),
        ..Default::default()
    };
    let result = manager.run_command(second).await.unwrap();
    assert_eq!(result.exit_code, None);
    assert!(!result.timed_out);
    assert!(result.stderr.contains("in flight"));

    let first = bg.await.unwrap().unwrap();
    assert_eq!(first.exit_code, Some(0));
}

#[tokio::test]
async fn timed_out_command_completes_through_write_stdin() {
    let manager = manager();
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let req = CommandRequest {
        session_id: Some(id.clone()),
        command: "sleep 0.4; echo finally".to_string(),
        timeout_ms: Some(100),
        ..Default::default()
    };
    let result = manager.run_command(req).await.unwrap();
    assert!(result.timed_out);
    assert_eq!(result.exit_code, None);
    assert!(!result.stdout.contains("finally"));

    // Once the command actually finishes, the sentinel is revealed and a
    // write_stdin drain completes it.
    let drained = manager.write_stdin(&id, "", 600).await.unwrap();
    let completed = drained.completed.expect("command should have completed");
    assert_eq!(completed.exit_code, Some(0));
    assert!(drained.stdout.contains("finally"));
}

#[tokio::test]
async fn interactive_read_loop() {
    let manager = manager();
    let session = manager.create_session(None).unwrap();
    let id = session.id.0.clone();

    let req = CommandRequest {
        session_id: Some(id.clone()),
        command: "read line; echo got:$line".to_string(),
        timeout_ms: Some(100),
        interactive: true,
        ..Default::default()
    };
    let result = manager.run_command(req).await.unwrap();
    assert!(result.timed_out);

    let fed = manager.write_stdin(&id, "shrimp\n", 300).await.unwrap();
    assert!(fed.stdout.contains("got:shrimp"), "stdout: {}", fed.stdout);
    let completed = fed.completed.expect("interactive child should exit");
    assert_eq!(completed.exit_code, Some(0));
}

#[tokio::test]
async fn capacity_evicts_oldest_session() {
    let manager = ShellManager::new(ShellManagerConfig {
        max_sessions: 2,
        ..Default::default()
    });
    let first = manager.create_session(None).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let _second = manager.create_session(None).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let _third = manager.create_session(None).unwrap();

    assert_eq!(manager.session_count(), 2);
    assert!(manager.get(&first.id.0).is_err());
}

#[tokio::test]
async fn write_stdin_on_unknown_session_errors() {
    let manager = manager();
    let err = manager.write_stdin("nope", "", 0).await.unwrap_err();
    assert!(matches!(err, shrimp_shell::ShellError::UnknownSession(_)));
}
