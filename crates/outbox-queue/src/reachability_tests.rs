use super::*;
use tokio::net::TcpListener;

fn probe_config(target: String, allow_cellular: bool) -> ReachabilityConfig {
    ReachabilityConfig {
        target,
        allow_cellular,
        probe_interval_secs: 3600,
        probe_timeout_ms: 1000,
    }
}

#[test]
fn test_evaluate_rules() {
    use ReachabilityState::*;

    assert_eq!(evaluate(LinkKind::Offline, true, true), Unreachable);
    assert_eq!(evaluate(LinkKind::Wifi, true, false), Reachable);
    assert_eq!(evaluate(LinkKind::Wifi, false, true), Unreachable);
    assert_eq!(evaluate(LinkKind::Cellular, true, true), Reachable);
    assert_eq!(evaluate(LinkKind::Cellular, true, false), Unreachable);
}

#[test]
fn test_manual_transitions() {
    let monitor = ManualReachability::unreachable(true);
    assert_eq!(monitor.current_state(), ReachabilityState::Unreachable);

    monitor.set_reachable(true);
    assert_eq!(monitor.current_state(), ReachabilityState::Reachable);
    assert_eq!(monitor.link(), LinkKind::Wifi);

    monitor.set_link(LinkKind::Offline);
    assert!(!monitor.current_state().is_reachable());
}

#[test]
fn test_manual_cellular_not_allowed() {
    let monitor = ManualReachability::new(LinkKind::Cellular, false);
    assert_eq!(monitor.current_state(), ReachabilityState::Unreachable);

    monitor.set_link(LinkKind::Wifi);
    assert_eq!(monitor.current_state(), ReachabilityState::Reachable);
}

#[test]
fn test_manual_only_notifies_on_transition() {
    let monitor = ManualReachability::reachable();
    let mut rx = monitor.subscribe();
    rx.borrow_and_update();

    monitor.set_reachable(true);
    monitor.set_link(LinkKind::Cellular);
    assert!(!rx.has_changed().unwrap());

    monitor.set_reachable(false);
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ReachabilityState::Unreachable);
}

#[tokio::test]
async fn test_probe_live_listener_is_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let monitor = ProbeReachability::spawn(&probe_config(addr.to_string(), true));
    assert_eq!(monitor.target(), addr.to_string());
    assert_eq!(monitor.probe_now().await, ReachabilityState::Reachable);
    assert_eq!(monitor.current_state(), ReachabilityState::Reachable);
}

#[tokio::test]
async fn test_probe_closed_port_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let monitor = ProbeReachability::spawn(&probe_config(addr.to_string(), true));
    assert_eq!(monitor.probe_now().await, ReachabilityState::Unreachable);
}

#[tokio::test]
async fn test_probe_respects_cellular_rule() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let monitor = ProbeReachability::spawn(&probe_config(addr.to_string(), false));
    assert_eq!(monitor.probe_now().await, ReachabilityState::Reachable);

    let mut rx = monitor.subscribe();
    rx.borrow_and_update();
    monitor.set_link(LinkKind::Cellular);

    assert!(rx.has_changed().unwrap());
    assert_eq!(monitor.current_state(), ReachabilityState::Unreachable);
    assert_eq!(monitor.probe_now().await, ReachabilityState::Unreachable);
}
