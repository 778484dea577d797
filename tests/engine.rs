use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use probevisor::{
    EngineBuilder, EngineConfig, EngineState, Event, EventKind, MetricsWriter, Registry,
    RuntimeError, Subscribe, TaskContext, TaskError, TaskFailure, TaskFn, TaskRef,
};

type Journal = Arc<Mutex<Vec<String>>>;

fn recorded(name: &'static str, journal: &Journal) -> TaskRef<()> {
    let journal = Arc::clone(journal);
    TaskFn::arc(name, move |_: TaskContext| {
        let journal = Arc::clone(&journal);
        async move {
            journal.lock().push(name.to_string());
            Ok(())
        }
    })
}

fn failing(name: &'static str) -> TaskRef<()> {
    TaskFn::arc(name, move |_: TaskContext| async move {
        Err(TaskError::fail(format!("{name} broke")))
    })
}

async fn drain(mut rx: mpsc::Receiver<TaskFailure>) -> Vec<TaskFailure> {
    let mut out = Vec::new();
    while let Some(f) = rx.recv().await {
        out.push(f);
    }
    out
}

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn batch_runs_each_task_once_in_order() {
    let journal = Journal::default();
    let engine = EngineBuilder::new(())
        .with_tasks(vec![
            recorded("a", &journal),
            recorded("b", &journal),
            recorded("c", &journal),
        ])
        .build_single()
        .unwrap();

    let rx = engine.start(CancellationToken::new()).unwrap();
    assert!(drain(rx).await.is_empty());
    engine.wait().await;

    assert_eq!(*journal.lock(), ["a", "b", "c"]);
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.queue().is_empty());
}

#[tokio::test]
async fn tasks_behind_the_terminal_never_run() {
    let journal = Journal::default();
    let engine = EngineBuilder::new(())
        .with_tasks(vec![recorded("a", &journal)])
        .build_single()
        .unwrap();
    engine.add_task(recorded("late", &journal));

    let rx = engine.start(CancellationToken::new()).unwrap();
    drain(rx).await;
    engine.wait().await;

    assert_eq!(*journal.lock(), ["a"]);
    assert_eq!(engine.queue().len(), 1);
}

#[tokio::test]
async fn repeat_stops_once_predicate_holds() {
    let journal = Journal::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let engine = EngineBuilder::new(())
        .with_tasks(vec![recorded("x", &journal)])
        .build_repeat(move || seen.fetch_add(1, Ordering::SeqCst) >= 1)
        .unwrap();

    let rx = engine.start(CancellationToken::new()).unwrap();
    assert!(drain(rx).await.is_empty());
    engine.wait().await;

    assert_eq!(*journal.lock(), ["x"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn blocked_task_observes_deadline() {
    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);
    let blocker: TaskRef<()> = TaskFn::arc("blocker", move |ctx: TaskContext| {
        let flag = Arc::clone(&flag);
        async move {
            ctx.cancelled().await;
            flag.store(ctx.is_expired(), Ordering::SeqCst);
            Err(TaskError::Canceled)
        }
    });

    let engine = EngineBuilder::new(())
        .with_config(EngineConfig::default().with_task_timeout(Duration::from_secs(10)))
        .with_tasks(vec![blocker])
        .build_single()
        .unwrap();

    let started = tokio::time::Instant::now();
    let failures = drain(engine.start(CancellationToken::new()).unwrap()).await;

    assert!(expired.load(Ordering::SeqCst));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "blocker");
    assert!(matches!(failures[0].error, TaskError::Canceled));
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_task_reported_as_timeout() {
    let stubborn: TaskRef<()> = TaskFn::arc("stubborn", |_: TaskContext| async {
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Ok(())
    });

    let cfg = EngineConfig::default()
        .with_task_timeout(Duration::from_secs(60))
        .with_cancel_grace(Duration::from_secs(5));
    let engine = EngineBuilder::new(())
        .with_config(cfg)
        .with_tasks(vec![stubborn])
        .build_single()
        .unwrap();

    let failures = drain(engine.start(CancellationToken::new()).unwrap()).await;
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].error,
        TaskError::Timeout { timeout } if timeout == Duration::from_secs(60)
    ));
}

#[tokio::test]
async fn failures_are_forwarded_and_loop_continues() {
    let journal = Journal::default();
    let engine = EngineBuilder::new(())
        .with_tasks(vec![
            failing("first"),
            recorded("ok", &journal),
            failing("second"),
        ])
        .build_single()
        .unwrap();

    let failures = drain(engine.start(CancellationToken::new()).unwrap()).await;
    let names: Vec<&str> = failures.iter().map(|f| f.task.as_str()).collect();

    assert_eq!(names, ["first", "second"]);
    assert_eq!(failures[0].to_string(), "task \"first\": execution failed: first broke");
    assert_eq!(*journal.lock(), ["ok"]);
}

#[tokio::test]
async fn stop_lets_in_flight_task_finish() {
    let journal = Journal::default();
    let started = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));

    let slow: TaskRef<()> = {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        TaskFn::arc("slow", move |ctx: TaskContext| {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.store(!ctx.is_cancelled(), Ordering::SeqCst);
                Ok(())
            }
        })
    };

    let engine = EngineBuilder::new(())
        .with_tasks(vec![slow, recorded("after", &journal)])
        .build_single()
        .unwrap();

    let rx = engine.start(CancellationToken::new()).unwrap();
    started.notified().await;
    engine.stop();

    assert!(drain(rx).await.is_empty());
    engine.wait().await;
    assert!(finished.load(Ordering::SeqCst));
    assert!(journal.lock().is_empty());
}

#[tokio::test]
async fn root_cancellation_reaches_in_flight_task() {
    let started = Arc::new(Notify::new());
    let waiter: TaskRef<()> = {
        let started = Arc::clone(&started);
        TaskFn::arc("waiter", move |ctx: TaskContext| {
            let started = Arc::clone(&started);
            async move {
                started.notify_one();
                ctx.cancelled().await;
                Err(TaskError::Canceled)
            }
        })
    };

    let engine = EngineBuilder::new(())
        .with_tasks(vec![waiter])
        .build_repeat_forever()
        .unwrap();

    let root = CancellationToken::new();
    let rx = engine.start(root.clone()).unwrap();
    started.notified().await;
    root.cancel();

    let failures = tokio::time::timeout(Duration::from_secs(5), drain(rx))
        .await
        .expect("stream should close after root cancellation");
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].error, TaskError::Canceled));
}

fn instant(counter: &Arc<AtomicUsize>) -> TaskRef<()> {
    let counter = Arc::clone(counter);
    TaskFn::arc("instant", move |_: TaskContext| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test(flavor = "current_thread")]
async fn busy_loop_of_instant_tasks_still_lets_stop_through() {
    let runs = Arc::new(AtomicUsize::new(0));
    let engine = EngineBuilder::new(())
        .with_tasks(vec![instant(&runs)])
        .build_repeat_forever()
        .unwrap();
    let _rx = engine.start(CancellationToken::new()).unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop();
        engine.wait().await;
    })
    .await
    .expect("stop should be observed while the loop is busy");

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(runs.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn dropping_a_stopped_loop_engine_frees_its_queue() {
    let runs = Arc::new(AtomicUsize::new(0));
    let engine = EngineBuilder::new(())
        .with_tasks(vec![instant(&runs)])
        .build_repeat_forever()
        .unwrap();
    let _rx = engine.start(CancellationToken::new()).unwrap();

    while runs.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.stop();
    engine.wait().await;
    assert!(!engine.queue().is_empty());

    let queue = Arc::downgrade(engine.queue());
    drop(engine);
    assert!(queue.upgrade().is_none());
}

#[tokio::test]
async fn second_start_is_rejected() {
    let engine = EngineBuilder::new(()).build_single().unwrap();
    let _rx = engine.start(CancellationToken::new()).unwrap();

    let err = engine.start(CancellationToken::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyStarted));
    engine.wait().await;
}

#[tokio::test]
async fn continuous_engine_accepts_tasks_at_any_time() {
    let journal = Journal::default();
    let engine = EngineBuilder::new(()).build().unwrap();
    let rx = engine.start(CancellationToken::new()).unwrap();

    let handle = engine.handle();
    assert!(handle.add_task(recorded("injected", &journal)));
    assert!(handle.add_task(handle.terminal_task()));

    let failures = tokio::time::timeout(Duration::from_secs(5), drain(rx))
        .await
        .expect("terminal task should stop the engine");
    assert!(failures.is_empty());
    assert_eq!(*journal.lock(), ["injected"]);
}

#[tokio::test]
async fn dropped_error_stream_does_not_stall_the_loop() {
    let engine = EngineBuilder::new(())
        .with_tasks(vec![failing("a"), failing("b"), failing("c")])
        .with_config(EngineConfig {
            error_capacity: 1,
            ..EngineConfig::default()
        })
        .build_single()
        .unwrap();

    drop(engine.start(CancellationToken::new()).unwrap());
    tokio::time::timeout(Duration::from_secs(5), engine.wait())
        .await
        .expect("loop should run to the terminal task");
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn subscribers_see_every_outcome_before_wait_returns() {
    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(MetricsWriter::register(&registry).unwrap());
    let recorder = Arc::new(Recorder::default());
    let journal = Journal::default();

    let engine = EngineBuilder::new(())
        .with_registry(Arc::clone(&registry))
        .with_subscribers(vec![
            metrics.clone() as Arc<dyn Subscribe>,
            recorder.clone() as Arc<dyn Subscribe>,
        ])
        .with_tasks(vec![recorded("good", &journal), failing("bad")])
        .build_single()
        .unwrap();

    drain(engine.start(CancellationToken::new()).unwrap()).await;
    engine.wait().await;

    assert_eq!(metrics.outcomes("good", "success"), 1);
    assert_eq!(metrics.outcomes("bad", "failure"), 1);
    assert_eq!(metrics.outcomes("terminal_task", "success"), 1);

    let kinds = recorder.kinds.lock();
    assert_eq!(kinds.first(), Some(&EventKind::TaskStarting));
    assert_eq!(kinds.last(), Some(&EventKind::EngineStopped));
    assert!(kinds.contains(&EventKind::ShutdownRequested));

    let text = registry.render();
    assert!(text.contains(r#"probevisor_engine_task_outcomes_total{task="bad",outcome="failure"} 1"#));
    assert!(text.contains("probevisor_queue_length 0"));
}

#[tokio::test]
async fn wait_returns_at_once_when_never_started() {
    let engine = EngineBuilder::new(()).build_single().unwrap();
    engine.wait().await;
    assert_eq!(engine.state(), EngineState::Initialized);
}
