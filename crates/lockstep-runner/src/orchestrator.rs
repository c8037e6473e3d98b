//! Scenario orchestration.
//!
//! Drives the whole run: launch every instance under its adapter, install
//! the breakpoints the pause actions imply, finish configuration, then play
//! the scripted action sequence. Teardown runs on every exit path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

use lockstep_config::{Action, Instance, Scenario};
use lockstep_dap::{DapClient, LaunchArguments, StoppedEventBody};

use crate::adapter::{AdapterLauncher, AdapterSpawner, ProcessHandle};
use crate::error::RunnerError;
use crate::instance::{self, InstanceRuntime};
use crate::resolver;

/// Run a scenario to completion.
///
/// Action references are checked before any adapter is spawned; after that,
/// every launched adapter process is terminated no matter how the run ends.
pub async fn run(scenario: &Scenario) -> Result<(), RunnerError> {
    run_with(scenario, AdapterLauncher::new()).await
}

async fn run_with<S: AdapterSpawner>(
    scenario: &Scenario,
    spawner: S,
) -> Result<(), RunnerError> {
    check_references(scenario)?;
    let mut orchestrator = Orchestrator::new(spawner);
    let outcome = orchestrator.drive(scenario).await;
    orchestrator.teardown();
    outcome
}

/// Verify that every instance-addressed action names a configured instance.
pub fn check_references(scenario: &Scenario) -> Result<(), RunnerError> {
    for action in &scenario.sequence {
        if let Some(id) = action.instance() {
            if scenario.instance(id).is_none() {
                return Err(RunnerError::UnknownInstance { id: id.to_string() });
            }
        }
    }
    Ok(())
}

struct Orchestrator<S: AdapterSpawner> {
    launcher: S,
    instances: Vec<InstanceRuntime<S::Process>>,
}

impl<S: AdapterSpawner> Orchestrator<S> {
    fn new(launcher: S) -> Self {
        Self {
            launcher,
            instances: Vec::new(),
        }
    }

    async fn drive(&mut self, scenario: &Scenario) -> Result<(), RunnerError> {
        self.launch_all(scenario).await?;
        self.install_all_breakpoints(scenario).await?;
        self.complete_all().await?;
        self.execute(&scenario.sequence).await
    }

    async fn launch_all(&mut self, scenario: &Scenario) -> Result<(), RunnerError> {
        for descriptor in &scenario.instances {
            let mut process = self
                .launcher
                .spawn(descriptor.adapter, &descriptor.cwd)
                .await?;
            match connect_and_launch(descriptor, process.addr()).await {
                Ok(client) => {
                    info!(instance = %descriptor.id, addr = process.addr(), "instance launched");
                    self.instances.push(InstanceRuntime {
                        descriptor: descriptor.clone(),
                        client,
                        process,
                        thread_id: 0,
                        breakpoints: HashMap::new(),
                    });
                }
                Err(e) => {
                    // This process never reaches the runtime list, so
                    // teardown would miss it. Reap it here.
                    if let Err(kill_err) = process.terminate() {
                        warn!(instance = %descriptor.id, error = %kill_err,
                              "failed to terminate adapter after launch failure");
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn install_all_breakpoints(&mut self, scenario: &Scenario) -> Result<(), RunnerError> {
        let mut resolved = Vec::new();
        for action in &scenario.sequence {
            if let Action::Pause {
                instance,
                file,
                marker,
            } = action
            {
                let line = resolver::find_marker_line(file, marker)?;
                let file = std::fs::canonicalize(file)?;
                info!(instance = %instance, file = %file.display(), line, marker = %marker,
                      "resolved pause marker");
                resolved.push((instance.clone(), file, line));
            }
        }
        for group in group_breakpoints(&resolved) {
            let runtime = self.runtime_mut(&group.instance)?;
            let bindings =
                instance::install_breakpoints(&mut runtime.client, &group.file, &group.lines)
                    .await?;
            runtime.record_bindings(bindings);
            info!(instance = %group.instance, file = %group.file.display(),
                  count = group.lines.len(), "breakpoints installed");
        }
        Ok(())
    }

    async fn complete_all(&mut self) -> Result<(), RunnerError> {
        for runtime in &mut self.instances {
            runtime.thread_id =
                instance::complete_configuration(&mut runtime.client, &runtime.descriptor.id)
                    .await?;
        }
        Ok(())
    }

    async fn execute(&mut self, sequence: &[Action]) -> Result<(), RunnerError> {
        for action in sequence {
            match action {
                Action::Run { instance } => {
                    let runtime = self.runtime_mut(instance)?;
                    let thread_id = runtime.thread_id;
                    action_run(&mut runtime.client, thread_id).await?;
                    info!(instance = %instance, "run");
                }
                Action::Pause { instance, .. } => {
                    let runtime = self.runtime_mut(instance)?;
                    let stopped = action_pause(&mut runtime.client).await?;
                    report_stop(runtime, &stopped);
                }
                Action::Continue { instance } => {
                    let runtime = self.runtime_mut(instance)?;
                    let thread_id = runtime.thread_id;
                    action_continue(&mut runtime.client, thread_id).await?;
                    info!(instance = %instance, "continue");
                }
                Action::Sleep { seconds } => {
                    info!(seconds, "sleep");
                    tokio::time::sleep(Duration::from_secs(*seconds)).await;
                }
            }
        }
        Ok(())
    }

    fn runtime_mut(&mut self, id: &str) -> Result<&mut InstanceRuntime<S::Process>, RunnerError> {
        self.instances
            .iter_mut()
            .find(|r| r.descriptor.id == id)
            .ok_or_else(|| RunnerError::UnknownInstance { id: id.to_string() })
    }

    fn teardown(&mut self) {
        for runtime in &mut self.instances {
            if let Err(e) = runtime.process.terminate() {
                warn!(instance = %runtime.descriptor.id, error = %e,
                      "failed to terminate adapter process");
            } else {
                info!(instance = %runtime.descriptor.id, "adapter terminated");
            }
        }
        self.instances.clear();
    }
}

async fn connect_and_launch(
    descriptor: &Instance,
    addr: &str,
) -> Result<DapClient<TcpStream>, RunnerError> {
    let mut client = DapClient::connect(addr).await?;
    let args = LaunchArguments {
        program: descriptor.program.clone(),
        cwd: descriptor.cwd.to_string_lossy().into_owned(),
        env: descriptor.env_map()?,
        stop_on_entry: true,
    };
    instance::launch_handshake(&mut client, &args).await?;
    Ok(client)
}

/// Resume a thread and wait for the continue acknowledgment.
async fn action_run<S>(client: &mut DapClient<S>, thread_id: i64) -> Result<(), RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    client.continue_thread(thread_id).await?;
    client.read_response("continue").await?;
    Ok(())
}

/// Block until the instance reports a stop.
async fn action_pause<S>(client: &mut DapClient<S>) -> Result<StoppedEventBody, RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    let event = client.read_event("stopped").await?;
    Ok(event.parse_body()?)
}

/// Resume a thread without waiting for any reply.
async fn action_continue<S>(client: &mut DapClient<S>, thread_id: i64) -> Result<(), RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    client.continue_thread(thread_id).await?;
    Ok(())
}

fn report_stop<P>(runtime: &InstanceRuntime<P>, stopped: &StoppedEventBody) {
    let instance = runtime.descriptor.id.as_str();
    let hits = stopped.hit_breakpoint_ids.clone().unwrap_or_default();
    if hits.is_empty() {
        info!(instance, reason = %stopped.reason, "paused");
        return;
    }
    for id in hits {
        match runtime.breakpoints.get(&id) {
            Some(info) => {
                let file = info
                    .source
                    .as_ref()
                    .and_then(|s| s.path.as_deref())
                    .unwrap_or("<unknown>");
                info!(instance, file, line = ?info.line, "paused at breakpoint");
            }
            None => warn!(instance, breakpoint_id = id, "stopped at unrecorded breakpoint"),
        }
    }
}

/// Breakpoints for one (instance, file) pair, in first-seen order.
#[derive(Debug, PartialEq)]
struct BreakpointGroup {
    instance: String,
    file: PathBuf,
    lines: Vec<i64>,
}

/// Group resolved pause lines by (instance, file), preserving the order in
/// which each pair first appears. One setBreakpoints call per group, since
/// the request replaces all breakpoints previously set in its file.
fn group_breakpoints(resolved: &[(String, PathBuf, i64)]) -> Vec<BreakpointGroup> {
    let mut groups: Vec<BreakpointGroup> = Vec::new();
    for (instance, file, line) in resolved {
        match groups
            .iter_mut()
            .find(|g| &g.instance == instance && &g.file == file)
        {
            Some(group) => group.lines.push(*line),
            None => groups.push(BreakpointGroup {
                instance: instance.clone(),
                file: file.clone(),
                lines: vec![*line],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use lockstep_config::AdapterKind;
    use lockstep_dap::transport;
    use lockstep_dap::{Event, Message, Request, Response};
    use tokio::io::{AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
    use tokio::net::TcpListener;

    fn instance(id: &str) -> Instance {
        Instance {
            id: id.into(),
            name: String::new(),
            adapter: AdapterKind::Delve,
            program: "./cmd/app".into(),
            env: String::new(),
            cwd: PathBuf::from("."),
        }
    }

    #[test]
    fn check_references_accepts_known_ids() {
        let scenario = Scenario {
            instances: vec![instance("a"), instance("b")],
            sequence: vec![
                Action::Run {
                    instance: "a".into(),
                },
                Action::Sleep { seconds: 1 },
                Action::Continue {
                    instance: "b".into(),
                },
            ],
        };
        assert!(check_references(&scenario).is_ok());
    }

    #[test]
    fn check_references_rejects_unknown_id() {
        let scenario = Scenario {
            instances: vec![instance("a")],
            sequence: vec![Action::Run {
                instance: "ghost".into(),
            }],
        };
        let err = check_references(&scenario).unwrap_err();
        match err {
            RunnerError::UnknownInstance { id } => assert_eq!(id, "ghost"),
            other => panic!("expected UnknownInstance, got {other}"),
        }
    }

    #[test]
    fn check_references_ignores_sleep() {
        let scenario = Scenario {
            instances: vec![],
            sequence: vec![Action::Sleep { seconds: 5 }],
        };
        assert!(check_references(&scenario).is_ok());
    }

    #[test]
    fn group_breakpoints_merges_same_instance_and_file() {
        let resolved = vec![
            ("a".to_string(), PathBuf::from("/w/main.go"), 47),
            ("b".to_string(), PathBuf::from("/w/main.go"), 47),
            ("a".to_string(), PathBuf::from("/w/main.go"), 80),
        ];
        let groups = group_breakpoints(&resolved);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].instance, "a");
        assert_eq!(groups[0].lines, vec![47, 80]);
        assert_eq!(groups[1].instance, "b");
        assert_eq!(groups[1].lines, vec![47]);
    }

    #[test]
    fn group_breakpoints_preserves_first_seen_order() {
        let resolved = vec![
            ("b".to_string(), PathBuf::from("/w/b.go"), 10),
            ("a".to_string(), PathBuf::from("/w/a.go"), 20),
            ("b".to_string(), PathBuf::from("/w/b.go"), 30),
        ];
        let groups = group_breakpoints(&resolved);
        assert_eq!(groups[0].instance, "b");
        assert_eq!(groups[0].lines, vec![10, 30]);
        assert_eq!(groups[1].instance, "a");
    }

    #[test]
    fn group_breakpoints_separates_files_within_instance() {
        let resolved = vec![
            ("a".to_string(), PathBuf::from("/w/x.go"), 1),
            ("a".to_string(), PathBuf::from("/w/y.go"), 2),
        ];
        let groups = group_breakpoints(&resolved);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn group_breakpoints_empty_input() {
        assert!(group_breakpoints(&[]).is_empty());
    }

    // -- fake adapters over arbitrary streams ------------------------------

    fn adapter_side<S>(stream: S) -> (BufReader<ReadHalf<S>>, WriteHalf<S>)
    where
        S: AsyncRead + AsyncWrite,
    {
        let (r, w) = tokio::io::split(stream);
        (BufReader::new(r), w)
    }

    async fn next_request<S>(reader: &mut BufReader<ReadHalf<S>>) -> Request
    where
        S: AsyncRead + AsyncWrite,
    {
        match transport::read_message(reader).await.unwrap() {
            Message::Request(req) => req,
            other => panic!("adapter expected a request, got {}", other.describe()),
        }
    }

    async fn send_message<S>(writer: &mut WriteHalf<S>, message: &Message)
    where
        S: AsyncRead + AsyncWrite,
    {
        writer
            .write_all(&transport::encode_message(message))
            .await
            .unwrap();
        writer.flush().await.unwrap();
    }

    fn response_to(req: &Request, body: Option<serde_json::Value>) -> Message {
        Message::Response(Response {
            seq: req.seq + 100,
            message_type: "response".into(),
            request_seq: req.seq,
            success: true,
            command: req.command.clone(),
            message: None,
            body,
        })
    }

    fn event(name: &str, body: Option<serde_json::Value>) -> Message {
        Message::Event(Event {
            seq: 0,
            message_type: "event".into(),
            event: name.into(),
            body,
        })
    }

    #[tokio::test]
    async fn action_run_waits_for_acknowledgment() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let mut client = DapClient::from_stream(ours);
        let (mut reader, mut writer) = adapter_side(theirs);

        let adapter = tokio::spawn(async move {
            let req = next_request(&mut reader).await;
            assert_eq!(req.command, "continue");
            assert_eq!(req.arguments.as_ref().unwrap()["threadId"], 7);
            send_message(&mut writer, &response_to(&req, None)).await;
        });

        action_run(&mut client, 7).await.unwrap();
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn action_continue_does_not_read() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let mut client = DapClient::from_stream(ours);
        let (mut reader, _writer) = adapter_side(theirs);

        // Completes even though the adapter never answers.
        action_continue(&mut client, 7).await.unwrap();

        let req = next_request(&mut reader).await;
        assert_eq!(req.command, "continue");
    }

    #[tokio::test]
    async fn action_pause_blocks_until_stopped() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let mut client = DapClient::from_stream(ours);
        let (_reader, mut writer) = adapter_side(theirs);

        let adapter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            send_message(
                &mut writer,
                &event(
                    "stopped",
                    Some(serde_json::json!({
                        "reason": "breakpoint",
                        "threadId": 7,
                        "hitBreakpointIds": [2]
                    })),
                ),
            )
            .await;
        });

        let stopped = action_pause(&mut client).await.unwrap();
        assert_eq!(stopped.reason, "breakpoint");
        assert_eq!(stopped.hit_breakpoint_ids, Some(vec![2]));
        adapter.await.unwrap();
    }

    /// The same action list always produces the same per-connection command
    /// sequence: the orchestrator holds exactly one in-flight request per
    /// connection and never reorders.
    #[tokio::test]
    async fn fixed_action_list_yields_deterministic_commands() {
        async fn drive_once() -> Vec<String> {
            let (ours, theirs) = tokio::io::duplex(4096);
            let mut client = DapClient::from_stream(ours);
            let (mut reader, mut writer) = adapter_side(theirs);

            let adapter = tokio::spawn(async move {
                let mut commands = Vec::new();
                // run
                let req = next_request(&mut reader).await;
                commands.push(req.command.clone());
                send_message(&mut writer, &response_to(&req, None)).await;
                // pause
                send_message(
                    &mut writer,
                    &event("stopped", Some(serde_json::json!({"reason": "breakpoint"}))),
                )
                .await;
                // continue
                let req = next_request(&mut reader).await;
                commands.push(req.command.clone());
                commands
            });

            action_run(&mut client, 1).await.unwrap();
            action_pause(&mut client).await.unwrap();
            action_continue(&mut client, 1).await.unwrap();
            adapter.await.unwrap()
        }

        let first = drive_once().await;
        let second = drive_once().await;
        assert_eq!(first, vec!["continue".to_string(), "continue".to_string()]);
        assert_eq!(first, second);
    }

    // -- launch failure and teardown ---------------------------------------

    struct ScriptedProcess {
        addr: String,
        label: &'static str,
        kills: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ProcessHandle for ScriptedProcess {
        fn addr(&self) -> &str {
            &self.addr
        }

        fn terminate(&mut self) -> std::io::Result<()> {
            self.kills.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    /// Hands out pre-scripted process handles in order; a `None` slot makes
    /// that spawn fail.
    struct ScriptedSpawner {
        slots: Vec<Option<(String, &'static str)>>,
        next: usize,
        kills: Arc<Mutex<Vec<&'static str>>>,
    }

    impl AdapterSpawner for ScriptedSpawner {
        type Process = ScriptedProcess;

        async fn spawn(
            &mut self,
            _kind: AdapterKind,
            _cwd: &Path,
        ) -> Result<ScriptedProcess, RunnerError> {
            let slot = self.slots[self.next].clone();
            self.next += 1;
            match slot {
                Some((addr, label)) => Ok(ScriptedProcess {
                    addr,
                    label,
                    kills: self.kills.clone(),
                }),
                None => Err(RunnerError::Spawn {
                    command: "dlv".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
                }),
            }
        }
    }

    /// Accept one TCP connection and play the adapter's side of a full
    /// launch handshake.
    async fn serve_launch_handshake(listener: TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = adapter_side(stream);

        let init = next_request(&mut reader).await;
        assert_eq!(init.command, "initialize");
        send_message(&mut writer, &response_to(&init, None)).await;

        let launch = next_request(&mut reader).await;
        assert_eq!(launch.command, "launch");
        send_message(&mut writer, &event("initialized", None)).await;
        send_message(&mut writer, &response_to(&launch, None)).await;
    }

    #[tokio::test]
    async fn spawn_failure_still_terminates_started_instances() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let adapter = tokio::spawn(serve_launch_handshake(listener));

        let kills = Arc::new(Mutex::new(Vec::new()));
        let spawner = ScriptedSpawner {
            slots: vec![Some((addr, "a")), None],
            next: 0,
            kills: kills.clone(),
        };
        let scenario = Scenario {
            instances: vec![instance("a"), instance("b")],
            sequence: vec![],
        };

        let err = run_with(&scenario, spawner).await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }), "got: {err}");
        // a's process is terminated exactly once; b never produced one.
        assert_eq!(*kills.lock().unwrap(), vec!["a"]);
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_failure_reaps_orphan_and_started_instances() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let adapter = tokio::spawn(serve_launch_handshake(listener));

        // An address nothing listens on: b's connect is refused after its
        // spawn succeeded.
        let vacant = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let vacant_addr = vacant.local_addr().unwrap().to_string();
        drop(vacant);

        let kills = Arc::new(Mutex::new(Vec::new()));
        let spawner = ScriptedSpawner {
            slots: vec![Some((addr, "a")), Some((vacant_addr, "b"))],
            next: 0,
            kills: kills.clone(),
        };
        let scenario = Scenario {
            instances: vec![instance("a"), instance("b")],
            sequence: vec![],
        };

        let err = run_with(&scenario, spawner).await.unwrap_err();
        assert!(
            matches!(err, RunnerError::Dap(lockstep_dap::DapError::Connect { .. })),
            "got: {err}"
        );
        // b's orphan is reaped at the failure site, then teardown kills a.
        // Each exactly once.
        assert_eq!(*kills.lock().unwrap(), vec!["b", "a"]);
        adapter.await.unwrap();
    }
}
