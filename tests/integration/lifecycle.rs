//! Full session runs: real HTTP client against the fake server, real
//! device channel over an in-memory pipe.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use thermobridge::engine::{SessionController, Supervisor};
use thermobridge::simulation::{BoptestClient, OverwriteCommands, SimulationApi};
use thermobridge::state::SharedState;
use thermobridge::status;
use thermobridge::types::{BridgeError, ExitReason, LoopPhase, SessionId};

use crate::fake_boptest::{config, DuplexConnector, FakeBoptest, SESSION_ID, TESTCASE_ID};

/// 30 s steps at 300× → one tick every 100 ms.
const FAST_SCALE: f64 = 300.0;

fn supervisor_for(base_url: &str, testcase_id: &str) -> (Supervisor, DuplexStream) {
    let cfg = config(base_url, testcase_id, FAST_SCALE);
    let sim = BoptestClient::new(&cfg.simulation.base_url, Duration::from_secs(5)).unwrap();
    let (connector, thermostat) = DuplexConnector::pair();
    let state = Arc::new(SharedState::new(cfg.simulation.start_datetime().unwrap()));
    let sup = Supervisor::new(SessionController::new(
        Arc::new(cfg),
        Arc::new(sim),
        Arc::new(connector),
        state,
    ));
    (sup, thermostat)
}

/// Everything the bridge wrote to the thermostat, decoded.
async fn drain_device(thermostat: &mut DuplexStream) -> Vec<Value> {
    let mut bytes = Vec::new();
    thermostat.read_to_end(&mut bytes).await.unwrap();
    serde_json::Deserializer::from_slice(&bytes)
        .into_iter::<Value>()
        .map(|v| v.unwrap())
        .collect()
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_full_session_until_stop() {
    let (fake, addr) = FakeBoptest::new().spawn().await;
    let (sup, mut thermostat) = supervisor_for(&format!("http://{addr}"), TESTCASE_ID);
    let state = sup.state().clone();

    sup.start().await.unwrap();
    thermostat.write_all(b"{\"input0\":1,\"input1\":0,\"input2\":1}\n").await.unwrap();
    wait_for(|| state.actuators.snapshot().cooling == 1).await;
    let ticks_before_cooling = state.ticks();

    wait_for(|| state.ticks() >= ticks_before_cooling + 3).await;
    let report = sup.shutdown().await.unwrap().unwrap();

    assert_eq!(report.exit, ExitReason::StopRequested);
    assert_eq!(report.session, Some(SessionId(SESSION_ID.into())));
    assert_eq!(FakeBoptest::count(&fake.selects), 1);
    assert_eq!(FakeBoptest::count(&fake.advances), report.ticks);
    assert_eq!(FakeBoptest::count(&fake.kpi_requests), 1);
    assert_eq!(FakeBoptest::count(&fake.stops), 1);
    assert_eq!(state.phase(), LoopPhase::Stopped);

    let init = fake.initialize_bodies.lock().unwrap().clone();
    assert_eq!(init, vec![serde_json::json!({"start_time": 46800, "warmup_period": 0})]);
    let steps = fake.step_bodies.lock().unwrap().clone();
    assert_eq!(steps, vec![serde_json::json!({"step": 30})]);

    // Every advance after the cooling frame carries the negated AC command.
    let bodies = fake.advance_bodies.lock().unwrap().clone();
    for body in &bodies[ticks_before_cooling as usize + 1..] {
        assert_eq!(body["overwrite_ACstatus_u"], "-1");
        assert_eq!(body["overwrite_FurnaceStatus_u"], "0");
        assert_eq!(body["overwrite_ACstatus_activate"], "1");
    }

    // One temperature frame per tick, in Celsius.
    let frames = drain_device(&mut thermostat).await;
    assert_eq!(frames.len() as u64, report.ticks);
    for frame in &frames {
        assert!((frame["temperature"].as_f64().unwrap() - 22.0).abs() < 1e-6);
    }

    let snap = status::snapshot(&state).await;
    assert!((snap.indoor_temp.unwrap() - 71.6).abs() < 1e-6);
    assert!((snap.outdoor_temp.unwrap() - 32.0).abs() < 1e-6);
    assert_eq!(snap.hvac_status.to_string(), "Cool");

    let kpis = state.kpis().await.unwrap();
    assert_eq!(kpis["tdis_tot"], 0.25);
}

#[tokio::test]
async fn test_advance_failure_ends_session_and_releases_everything() {
    let fake = FakeBoptest { fail_advance_at: Some(3), ..FakeBoptest::new() };
    let (fake, addr) = fake.spawn().await;
    let (sup, mut thermostat) = supervisor_for(&format!("http://{addr}"), TESTCASE_ID);
    let state = sup.state().clone();

    sup.start().await.unwrap();
    let report = sup.join().await.unwrap().unwrap();

    assert_eq!(report.exit, ExitReason::AdvanceFailed);
    assert_eq!(report.ticks, 2);
    assert_eq!(FakeBoptest::count(&fake.advances), 3);
    assert_eq!(FakeBoptest::count(&fake.stops), 1);
    assert!(!state.is_running());

    // Device closed: the thermostat sees end of stream after two frames.
    assert_eq!(drain_device(&mut thermostat).await.len(), 2);

    // No advances after the failure.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(FakeBoptest::count(&fake.advances), 3);
}

#[tokio::test]
async fn test_unknown_testcase_closes_device_without_stop() {
    let (fake, addr) = FakeBoptest::new().spawn().await;
    let (sup, mut thermostat) = supervisor_for(&format!("http://{addr}"), "no-such-case");

    sup.start().await.unwrap();
    let result = sup.join().await.unwrap();

    assert!(matches!(result, Err(BridgeError::Selection(_))));
    assert_eq!(FakeBoptest::count(&fake.stops), 0);
    assert_eq!(FakeBoptest::count(&fake.advances), 0);
    assert!(drain_device(&mut thermostat).await.is_empty());

    // A new run may be started once the failed one is done.
    assert!(!sup.is_active().await);
}

#[tokio::test]
async fn test_client_rejects_malformed_advance_payload() {
    let fake = FakeBoptest { malformed_advance: true, ..FakeBoptest::new() };
    let (_fake, addr) = fake.spawn().await;
    let client = BoptestClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    let session = client.select_testcase(TESTCASE_ID).await.unwrap();
    let commands = OverwriteCommands::from_actuators(&Default::default());
    let err = client.advance(&session, &commands).await.unwrap_err();
    assert!(matches!(err, BridgeError::Advance(_)));
}

#[tokio::test]
async fn test_client_session_calls() {
    let (fake, addr) = FakeBoptest::new().spawn().await;
    let client = BoptestClient::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();

    let session = client.select_testcase(TESTCASE_ID).await.unwrap();
    assert_eq!(session.as_str(), SESSION_ID);
    client.initialize(&session, 46_800, 0).await.unwrap();
    client.set_step(&session, 30).await.unwrap();

    let readings = client
        .advance(&session, &OverwriteCommands::from_actuators(&Default::default()))
        .await
        .unwrap();
    assert!((readings.zone_temp_k - 295.15).abs() < 1e-9);

    let kpis = client.kpi(&session).await.unwrap();
    assert!(kpis["pgas_tot"].is_null());

    client.stop(&session).await;
    assert_eq!(FakeBoptest::count(&fake.stops), 1);

    let err = client.select_testcase("missing").await.unwrap_err();
    assert!(matches!(err, BridgeError::Selection(_)));
}

#[tokio::test]
async fn test_stop_against_unreachable_server_does_not_error() {
    // Port 9 on loopback: nothing listening.
    let client = BoptestClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    client.stop(&SessionId("gone".into())).await;
}
