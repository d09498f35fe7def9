use http_load_tunnel_runner::prelude::*;
use serde::Serialize;

use crate::config::RunConfiguration;
use crate::ScenarioValues;

/// Marks the traffic as synthetic load.
pub const MEMO: &str = "k6-perf";

pub const STATUS_CHECK: &str = "status is 200";

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Serialize)]
pub struct RedeemRequest {
    pub amount: i64,
    pub memo: &'static str,
}

impl RedeemRequest {
    pub fn new(amount: i64) -> Self {
        Self { amount, memo: MEMO }
    }
}

pub fn redeem_url(base_url: &str, user_id: &str) -> String {
    format!("{base_url}/api/users/{user_id}/points/redeem")
}

/// Extra headers for one redemption. `Content-Type` is always set by the client.
pub fn redeem_headers(config: &RunConfiguration) -> Vec<(&'static str, String)> {
    if config.idempotency_keys {
        vec![(IDEMPOTENCY_KEY_HEADER, nanoid::nanoid!())]
    } else {
        Vec::new()
    }
}

/// One iteration: redeem points, check for a 200 and pause.
///
/// A failed request or an unexpected status only fails the check.
pub fn agent_behaviour(
    ctx: &mut AgentContext<HttpRunnerContext<ScenarioValues>, HttpAgentContext>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let config = runner_context.get().scenario_values.config()?;

    let url = redeem_url(&config.base_url, &config.user_id);
    let headers = redeem_headers(config);
    let outcome = post_json(ctx, &url, &RedeemRequest::new(config.amount), &headers)?;

    check(ctx, STATUS_CHECK, outcome.is_status(200));

    pause(ctx, config.pause)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_interpolates_user_id() {
        assert_eq!(
            "http://localhost:8080/api/users/42/points/redeem",
            redeem_url("http://localhost:8080", "42")
        );
        assert_eq!(
            "https://points.example.com/v2/api/users/user-7/points/redeem",
            redeem_url("https://points.example.com/v2", "user-7")
        );
    }

    #[test]
    fn body_carries_amount_and_memo() {
        let body = serde_json::to_value(RedeemRequest::new(2500)).unwrap();
        assert_eq!(serde_json::json!({"amount": 2500, "memo": "k6-perf"}), body);

        let body = serde_json::to_string(&RedeemRequest::new(1000)).unwrap();
        assert_eq!(r#"{"amount":1000,"memo":"k6-perf"}"#, body);
    }

    #[test]
    fn idempotency_key_is_fresh_per_redemption() {
        let mut config = RunConfiguration::default();
        assert!(redeem_headers(&config).is_empty());

        config.idempotency_keys = true;
        let first = redeem_headers(&config);
        let second = redeem_headers(&config);
        assert_eq!(IDEMPOTENCY_KEY_HEADER, first[0].0);
        assert_ne!(first[0].1, second[0].1);
    }
}
