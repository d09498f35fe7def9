use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use http_load_tunnel_runner::prelude::{LoadTunnelScenarioCli, ReporterOpt, RunSummary};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: serde_json::Value,
}

pub type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    requests: Requests,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn redeem(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    state.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_string(),
        content_type: header(&headers, "content-type"),
        idempotency_key: header(&headers, "idempotency-key"),
        body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
    });
    state.status
}

/// Start a mock redemption API on its own runtime, separate from the one the run creates.
pub fn start_mock(status: StatusCode) -> (SocketAddr, Requests) {
    let requests = Requests::default();
    let state = MockState {
        status,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/users/:user_id/points/redeem", post(redeem))
        .with_state(state);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    (addr, requests)
}

fn cli(base_url: String, agents: usize) -> LoadTunnelScenarioCli {
    LoadTunnelScenarioCli {
        connection_string: Some(base_url),
        agents: Some(agents),
        behaviour: vec![],
        duration: Some(1),
        stages: vec![],
        start_agents: 0,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
        summary_json: false,
    }
}

static ENV: Once = Once::new();

/// Set the scenario environment before the first run in this test binary. Runs read the
/// environment from other threads, so it is never changed afterwards and every test in a binary
/// must pass the same values.
pub fn set_env_once(vars: &[(&str, &str)]) {
    ENV.call_once(|| {
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
    });
}

pub fn run_against(addr: String, agents: usize, env: &[(&str, &str)]) -> RunSummary {
    set_env_once(env);
    http_load_tunnel_runner::prelude::run(points_redeem::scenario(cli(addr, agents))).unwrap()
}
