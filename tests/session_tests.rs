//! End-to-end shipping against a local collector.

mod test_utils;

use std::time::Duration;

use crossbeam_channel::Receiver;
use logship::{SessionEvent, SessionOutcome, ShippingSession, buffer::OverflowFile};
use rstest::rstest;
use test_utils::{Collector, Workspace, workspace};

fn wait_for(events: &Receiver<SessionEvent>, wanted: impl Fn(&SessionEvent) -> bool) {
    loop {
        let event = events
            .recv_timeout(Duration::from_secs(10))
            .expect("session event");
        if wanted(&event) {
            return;
        }
    }
}

#[rstest]
fn authenticated_session_ships_backlog_and_new_lines(workspace: Workspace) {
    let collector = Collector::start(Some("patata"));
    workspace.append("boot\nready\n");
    let session = workspace
        .session(collector.addr)
        .with_password("patata")
        .build()
        .expect("valid session");

    let handle = ShippingSession::new(session).spawn().expect("spawn");
    let tag = workspace.tag();
    assert_eq!(collector.next_line(), "[SYSTEM] MONITOR_START");
    assert_eq!(collector.next_line(), format!("[{tag}] boot"));
    assert_eq!(collector.next_line(), format!("[{tag}] ready"));

    workspace.append("request served\n");
    assert_eq!(collector.next_line(), format!("[{tag}] request served"));

    handle.stop();
    assert_eq!(handle.join(), Some(SessionOutcome::Stopped));
    assert_eq!(collector.next_line(), "[SYSTEM] MONITOR_STOP");
}

#[rstest]
fn lines_written_during_an_outage_arrive_in_order(workspace: Workspace) {
    let mut collector = Collector::start(None);
    let session = workspace
        .session(collector.addr)
        .with_max_reconnect_attempts(100)
        .build()
        .expect("valid session");
    let (tx, events) = crossbeam_channel::unbounded();
    let handle = ShippingSession::new(session)
        .with_events(tx)
        .spawn()
        .expect("spawn");
    let tag = workspace.tag();
    assert_eq!(collector.next_line(), "[SYSTEM] MONITOR_START");

    collector.kill();
    workspace.append("during 1\n");
    wait_for(&events, |e| matches!(e, SessionEvent::Disconnected { .. }));
    workspace.append("during 2\n");
    wait_for(&events, |e| matches!(e, SessionEvent::ConnectFailed { .. }));

    collector.restart();
    assert_eq!(collector.next_line(), format!("[{tag}] during 1"));
    assert_eq!(collector.next_line(), format!("[{tag}] during 2"));
    wait_for(&events, |e| *e == SessionEvent::Replayed);

    workspace.append("after\n");
    assert_eq!(collector.next_line(), format!("[{tag}] after"));
    drop(handle);
}

#[rstest]
fn rejected_password_gives_up_after_the_attempt_cap(workspace: Workspace) {
    let collector = Collector::start(Some("patata"));
    workspace.append("never shipped\n");
    let session = workspace
        .session(collector.addr)
        .with_password("wrong")
        .with_max_reconnect_attempts(3)
        .build()
        .expect("valid session");
    let overflow = OverflowFile::new(session.overflow_path());

    let outcome = ShippingSession::new(session).run().expect("run");
    assert_eq!(outcome, SessionOutcome::GaveUp { attempts: 3 });
    assert_eq!(collector.connections(), 3);

    let saved: Vec<String> = overflow
        .read_all()
        .expect("overflow readable")
        .into_iter()
        .map(|line| line.text)
        .collect();
    assert_eq!(saved, ["MONITOR_START", "never shipped"]);
}

#[rstest]
fn truncated_file_is_shipped_from_the_start(workspace: Workspace) {
    let collector = Collector::start(None);
    workspace.append("a fairly long first line\n");
    let session = workspace
        .session(collector.addr)
        .with_tail_lines(0)
        .build()
        .expect("valid session");
    let handle = ShippingSession::new(session).spawn().expect("spawn");
    let tag = workspace.tag();
    assert_eq!(collector.next_line(), "[SYSTEM] MONITOR_START");

    std::fs::write(&workspace.log, "").expect("truncate");
    // Give the poller a tick to observe the shrink before new content lands.
    std::thread::sleep(Duration::from_millis(100));
    workspace.append("fresh\n");
    assert_eq!(collector.next_line(), format!("[{tag}] fresh"));
    drop(handle);
}
