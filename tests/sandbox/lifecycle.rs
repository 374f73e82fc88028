use std::sync::Arc;
use std::time::Duration;

use prepbox::{
    EngineSession, Error, ExerciseInput, ExerciseKind, LoadOutcome, MetricsSnapshot, NullSink,
    Sandbox, SandboxConfig, SessionState,
};

use crate::common::*;

#[tokio::test(flavor = "current_thread")]
async fn test_interpreter_start_failure_is_sticky_until_retry() {
    let backend = Arc::new(ScriptedInterpreter::failing_start("runtime assets missing"));
    let sandbox = sandbox_with(Arc::new(NullSink), backend.clone());
    let exercise = ExerciseInput::new(ExerciseKind::Python);

    let err = sandbox.prepare(exercise.clone()).await.unwrap_err();
    assert!(matches!(err, Error::EngineInitialization(_)));
    assert!(err.user_message().contains("Reload"));
    assert!(sandbox.interpreter_session().state().is_failed());

    assert_error_contains(sandbox.prepare(exercise.clone()).await, &["runtime assets missing"]);
    assert_eq!(backend.starts(), 1);

    sandbox.retry();
    assert_eq!(
        sandbox.interpreter_session().state(),
        SessionState::Uninitialized
    );
    assert!(sandbox.prepare(exercise).await.is_err());
    assert_eq!(backend.starts(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn test_slow_interpreter_start_times_out() {
    let config = SandboxConfig {
        init_timeout_ms: 20,
        ..SandboxConfig::default()
    };
    let backend =
        Arc::new(ScriptedInterpreter::new().with_start_delay(Duration::from_millis(500)));
    let sandbox = Sandbox::with_backend(config, Arc::new(NullSink), backend).unwrap();

    let err = sandbox
        .prepare(ExerciseInput::new(ExerciseKind::Python))
        .await
        .unwrap_err();
    assert_error_contains::<()>(Err(err), &["did not start within 20ms"]);
    assert!(sandbox.interpreter_session().state().is_failed());
}

#[tokio::test(flavor = "current_thread")]
async fn test_abandoned_prepare_does_not_wedge_interpreter() {
    let backend =
        Arc::new(ScriptedInterpreter::new().with_start_delay(Duration::from_millis(200)));
    let sandbox = sandbox_with(Arc::new(NullSink), backend.clone());
    let exercise = ExerciseInput::new(ExerciseKind::Python);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), sandbox.prepare(exercise.clone())).await;
    assert!(abandoned.is_err());
    assert_eq!(
        sandbox.interpreter_session().state(),
        SessionState::Uninitialized
    );

    sandbox.prepare(exercise).await.unwrap();
    assert!(sandbox.interpreter_session().is_ready());
    assert_eq!(backend.starts(), 2);
    assert!(sandbox.submit("print(1)").await.is_ok());
}

#[tokio::test(flavor = "current_thread")]
async fn test_shutdown_releases_engines_and_state() {
    let (sandbox, _) = seeded_sql_sandbox().await;
    assert!(sandbox.loader().active_signature().await.is_some());

    sandbox.shutdown().await;
    assert_eq!(sandbox.sql_session().state(), SessionState::Uninitialized);
    assert_eq!(
        sandbox.interpreter_session().state(),
        SessionState::Uninitialized
    );
    assert!(sandbox.loader().active_signature().await.is_none());
    assert_eq!(sandbox.metrics().snapshot(), MetricsSnapshot::default());
    assert!(sandbox.submit("SELECT 1").await.unwrap_err().is_not_ready());

    // A fresh engine has no tables, so the same definition loads again.
    let outcome = sandbox.prepare(shop_exercise()).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Completed(_)));
}
