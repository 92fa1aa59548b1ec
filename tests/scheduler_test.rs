//! Tests for the poll loop: one cycle across several printers

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use common::{StubResponse, StubServer};
use printwatch::adapter::get_adapter;
use printwatch::camera::{Camera, LightController, WledLight};
use printwatch::config::{DeviceConfig, GlobalSettings, ProtocolKind};
use printwatch::notification::{
    urgency_meets_threshold, NotificationChannel, NotificationDispatcher, NotificationMessage,
    SendResult, Urgency,
};
use printwatch::publisher::{EventSink, PrinterEvent};
use printwatch::watcher::{CooldownPolicy, Device, LifecycleTracker, Pipeline, Scheduler, TransitionKind};
use printwatch::{DeviceState, PrintState, ProtocolAdapter, Result, WatchError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Returns queued states one per poll, then repeats the last one
struct ScriptedAdapter {
    states: Mutex<VecDeque<DeviceState>>,
}

impl ScriptedAdapter {
    fn new(states: Vec<DeviceState>) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(states.into()),
        })
    }
}

impl ProtocolAdapter for ScriptedAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::OctoPrint
    }

    fn poll<'a>(&'a self, _device: &'a DeviceConfig) -> BoxFuture<'a, DeviceState> {
        let state = {
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states.front().cloned().unwrap_or_default()
            }
        };
        async move { state }.boxed()
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<PrinterEvent>>,
    fail: bool,
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish<'a>(&'a self, event: &'a PrinterEvent) -> BoxFuture<'a, Result<()>> {
        async move {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                Err(WatchError::sink("recording", "broker down"))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

struct RecordingChannel {
    sent: Mutex<Vec<NotificationMessage>>,
    fail: bool,
}

impl RecordingChannel {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn should_send(&self, message: &NotificationMessage) -> bool {
        urgency_meets_threshold(message.urgency, Urgency::Low)
    }

    fn send<'a>(&'a self, message: &'a NotificationMessage) -> BoxFuture<'a, Result<SendResult>> {
        async move {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Ok(SendResult::Failed("chat not found".to_string()))
            } else {
                Ok(SendResult::Sent)
            }
        }
        .boxed()
    }
}

fn device_config(id: &str, protocol: &str, extra: &str) -> DeviceConfig {
    serde_yaml::from_str(&format!(
        "id: {}\nprotocol: {}\napi_key: k\nstatus_interval: 900\n{}",
        id, protocol, extra
    ))
    .unwrap()
}

fn printing(remaining: u64) -> DeviceState {
    DeviceState {
        print_state: PrintState::Printing,
        still_printing: remaining,
        already_printed: 600,
        progress: 0.5,
        job_name: "cube.gcode".to_string(),
        ..DeviceState::default()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn build(
    settings: GlobalSettings,
    devices: Vec<Device>,
    channel: Arc<RecordingChannel>,
    sink: Arc<RecordingSink>,
) -> Scheduler {
    let mut dispatcher = NotificationDispatcher::new();
    dispatcher.register_channel(channel);
    let tracker = LifecycleTracker::new(CooldownPolicy::from_settings(&settings));
    Scheduler::new(Pipeline::new(settings, tracker, dispatcher, sink), devices)
}

#[tokio::test]
async fn test_unreachable_printer_still_published_and_others_notified() {
    // Given: one printer nobody answers for, and one that just started a job
    let settings = GlobalSettings {
        poll_timeout_secs: 2,
        ..GlobalSettings::default()
    };
    let ghost_config = device_config("ghost", "prusalink", "host: 127.0.0.1\nport: 9\n");
    let ghost = Device::new(
        ghost_config,
        get_adapter(ProtocolKind::PrusaLink, std::time::Duration::from_secs(2)).unwrap(),
    );
    let ender = Device::new(
        device_config("ender", "octoprint", "url: http://octopi.local\n"),
        ScriptedAdapter::new(vec![printing(3600)]),
    );

    let channel = RecordingChannel::new(false);
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = build(settings, vec![ghost, ender], channel.clone(), sink.clone());

    // When: one cycle runs
    let outcomes = scheduler.run_cycle(t0()).await;

    // Then: the unreachable printer is Unknown but still published
    assert_eq!(outcomes[0].device_id, "ghost");
    assert_eq!(outcomes[0].print_state, PrintState::Unknown);
    assert!(!outcomes[0].notified);
    assert!(outcomes[0].published);

    // And: the other printer was processed and notified
    assert_eq!(outcomes[1].transition, TransitionKind::JobStarted);
    assert!(outcomes[1].notified);

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].state.print_state, PrintState::Unknown);
    assert_eq!(events[0].status_line, "");
    assert_eq!(events[1].status_line, "ender:P 1:00");

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].device_id.as_deref(), Some("ender"));
    assert_eq!(sent[0].urgency, Urgency::Medium);
    assert!(sent[0].content.starts_with("<b>Printjob started on ender</b>"));
}

#[tokio::test]
async fn test_full_job_lifecycle_notifications() {
    let settings = GlobalSettings {
        cooldown_secs: 600,
        cooldown_temperature: 35.0,
        ..GlobalSettings::default()
    };
    let mut ended = DeviceState::default();
    ended.temperature.bed = 55.0;
    let mut cooled = DeviceState::default();
    cooled.temperature.bed = 30.0;

    let device = Device::new(
        device_config("mk4", "octoprint", "url: http://mk4.local\n"),
        ScriptedAdapter::new(vec![
            printing(1200),
            printing(1140),
            printing(60),
            ended.clone(),
            ended,
            cooled,
        ]),
    );
    let channel = RecordingChannel::new(false);
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = build(settings, vec![device], channel.clone(), sink.clone());

    let minute = Duration::seconds(60);
    let mut kinds = Vec::new();
    for i in 0..6 {
        let outcome = scheduler.run_cycle(t0() + minute * i).await.remove(0);
        kinds.push((outcome.transition, outcome.notified));
    }

    assert_eq!(
        kinds,
        vec![
            (TransitionKind::JobStarted, true),
            (TransitionKind::SteadyPrinting, false),
            (TransitionKind::SteadyPrinting, false),
            (TransitionKind::JobEnded, true),
            (TransitionKind::Cooldown, false),
            (TransitionKind::CooldownEnded, true),
        ]
    );

    let headers: Vec<String> = channel
        .sent()
        .iter()
        .map(|m| m.content.lines().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        headers,
        vec![
            "<b>Printjob started on mk4</b>",
            "<b>Printjob ended on mk4</b>",
            "<b>Printer mk4 final cool down</b>",
        ]
    );

    // Every cycle is published regardless of notifications
    assert_eq!(sink.events.lock().unwrap().len(), 6);
    assert!(scheduler.record("mk4").unwrap().last_state.cooldown_deadline.is_none());
}

#[tokio::test]
async fn test_failed_delivery_does_not_advance_throttle() {
    let device = Device::new(
        device_config("mk4", "octoprint", "url: http://mk4.local\n"),
        ScriptedAdapter::new(vec![printing(3600)]),
    );
    let channel = RecordingChannel::new(true);
    let sink = Arc::new(RecordingSink::default());
    let mut scheduler = build(GlobalSettings::default(), vec![device], channel.clone(), sink);

    let first = scheduler.run_cycle(t0()).await.remove(0);
    assert!(first.delivery[0].1.is_failed());
    assert!(!first.notified);
    assert_eq!(
        scheduler.record("mk4").unwrap().last_notified_at,
        DateTime::<Utc>::MIN_UTC
    );

    // Steady printing right after: throttle window never started, so it retries
    let second = scheduler.run_cycle(t0() + Duration::seconds(60)).await.remove(0);
    assert_eq!(second.transition, TransitionKind::SteadyPrinting);
    assert_eq!(second.delivery.len(), 1);
    assert!(!second.notified);
    assert_eq!(channel.sent().len(), 2);
}

#[tokio::test]
async fn test_publish_failure_does_not_stop_cycle() {
    let devices = vec![
        Device::new(
            device_config("a", "octoprint", "url: http://a.local\n"),
            ScriptedAdapter::new(vec![printing(100)]),
        ),
        Device::new(
            device_config("b", "octoprint", "url: http://b.local\n"),
            ScriptedAdapter::new(vec![DeviceState::default()]),
        ),
    ];
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..RecordingSink::default()
    });
    let settings = GlobalSettings {
        concurrent_polls: true,
        ..GlobalSettings::default()
    };
    let mut scheduler = build(settings, devices, RecordingChannel::new(false), sink.clone());

    let outcomes = scheduler.run_cycle(t0()).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.published));
    assert_eq!(sink.events.lock().unwrap().len(), 2);
    assert_eq!(
        scheduler.record("a").unwrap().last_state.print_state,
        PrintState::Printing
    );
}

#[tokio::test]
async fn test_notification_carries_lit_snapshot() {
    // Given: a printer with a camera and a WLED strip that is currently off
    let jpeg = [0xff_u8, 0xd8, 0xff, 0xdb, 0x00, 0x43];
    let server = StubServer::start(vec![
        ("/snapshot.jpg", StubResponse::bytes("image/jpeg", &jpeg)),
        ("/json/state", StubResponse::json(serde_json::json!({"on": false, "bri": 80}))),
    ])
    .await;
    let light = Arc::new(WledLight::new(&server.url(""), reqwest::Client::new()));
    let camera = Camera::new(
        reqwest::Client::new(),
        server.url("/snapshot.jpg"),
        Some(light as Arc<dyn LightController>),
        std::time::Duration::ZERO,
    );
    let device = Device::new(
        device_config("mk4", "octoprint", "url: http://mk4.local\n"),
        ScriptedAdapter::new(vec![printing(3600)]),
    )
    .with_camera(Some(camera));

    let channel = RecordingChannel::new(false);
    let mut scheduler = build(
        GlobalSettings::default(),
        vec![device],
        channel.clone(),
        Arc::new(RecordingSink::default()),
    );

    // When: the job start is notified
    let outcome = scheduler.run_cycle(t0()).await.remove(0);

    // Then: the message carries the picture
    assert_eq!(outcome.transition, TransitionKind::JobStarted);
    assert!(outcome.notified);
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].image.as_deref(), Some(&jpeg[..]));

    // And: the light was saved, switched on, and put back around the snapshot
    assert_eq!(
        server.calls(),
        vec![
            "GET /json/state",
            "POST /json/state",
            "GET /snapshot.jpg",
            "POST /json/state",
        ]
    );
    let requests = server.requests();
    let switched: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(switched, serde_json::json!({"on": true}));
    let restored: serde_json::Value = serde_json::from_slice(&requests[3].body).unwrap();
    assert_eq!(restored, serde_json::json!({"on": false, "bri": 80}));

    // When: the next poll is throttled
    let second = scheduler.run_cycle(t0() + Duration::seconds(60)).await.remove(0);

    // Then: no notification, so no picture is taken
    assert!(!second.notified);
    assert_eq!(server.calls().len(), 4);
}
