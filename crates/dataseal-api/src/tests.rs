// Router tests against an in-process protocol

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use dataseal_consensus::{attestation_key, sign_attestation, SigningKey};
    use dataseal_protocol::ProtocolConfig;
    use dataseal_types::{AccountId, Amount, CommitmentDigest, Score};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(grace: u64) -> (Router, Clock) {
        let mut config = ProtocolConfig::default();
        config.tasks.dispute_grace_window = grace;
        let clock = Clock::manual(1_000);
        let state = AppState::with_clock(config, clock.clone())
            .unwrap()
            .with_faucet(true);
        (create_app(state), clock)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn raw_units(n: i64) -> i64 {
        Amount::from_units(n).raw() as i64
    }

    fn signer(n: u8) -> SigningKey {
        SigningKey::from_bytes(&[n; 32])
    }

    async fn fund(app: &Router, account: &str, amount: &str) {
        let (status, _) = call(
            app,
            "POST",
            "/v1/accounts/deposit",
            Some(json!({ "account": account, "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn register_oracle(app: &Router, n: u8) -> String {
        let name = format!("oracle_{n}");
        fund(app, &name, "1000").await;
        let key = serde_json::to_value(attestation_key(&signer(n))).unwrap();
        let (status, body) = call(
            app,
            "POST",
            "/v1/oracles/register",
            Some(json!({ "sender": name, "value": "100", "attestation_key": key })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        name
    }

    async fn revealed_task(app: &Router) -> u64 {
        fund(app, "provider", "100").await;
        let commitment = serde_json::to_value(CommitmentDigest([4u8; 32])).unwrap();
        let (status, body) = call(
            app,
            "POST",
            "/v1/tasks/commit",
            Some(json!({
                "sender": "provider",
                "value": "10",
                "commitment": commitment,
                "market": 1,
                "stake": "10"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let task_id = body["task_id"].as_u64().unwrap();

        let (status, body) = call(
            app,
            "POST",
            &format!("/v1/tasks/{task_id}/reveal"),
            Some(json!({ "sender": "provider", "artifact_pointer": "ipfs://artifact" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        task_id
    }

    async fn submit(app: &Router, n: u8, task_id: u64, score: u8) -> (StatusCode, Value) {
        let oracle = AccountId::new(format!("oracle_{n}"));
        let score = Score::new(score).unwrap();
        let attestation =
            serde_json::to_value(sign_attestation(&signer(n), task_id, score, &oracle)).unwrap();
        call(
            app,
            "POST",
            &format!("/v1/tasks/{task_id}/verifications"),
            Some(json!({ "sender": oracle, "score": score, "attestation": attestation })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let (app, _) = app(0);
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, body) = call(&app, "GET", "/v1/info", None).await;
        assert_eq!(body["name"], "DataSeal");
    }

    #[tokio::test]
    async fn test_deposit_faucet_disabled_by_default() {
        let state = AppState::with_clock(ProtocolConfig::default(), Clock::manual(1_000)).unwrap();
        let app = create_app(state);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/accounts/deposit",
            Some(json!({ "account": "mallory", "amount": "1000" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["category"], "precondition");

        let (_, body) = call(&app, "GET", "/v1/accounts/mallory/balance", None).await;
        assert_eq!(body["balance"], 0);
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_http() {
        let (app, _) = app(0);
        register_oracle(&app, 1).await;
        register_oracle(&app, 2).await;
        let task_id = revealed_task(&app).await;

        let (status, body) = submit(&app, 1, task_id, 85).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["outcome"]["consensus"].is_null());

        let (status, body) = submit(&app, 2, task_id, 87).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["outcome"]["consensus"]["round"]["final_score"], 86);
        assert_eq!(body["payout"]["provider_amount"].as_i64(), Some(raw_units(10)));

        let (_, task) = call(&app, "GET", &format!("/v1/tasks/{task_id}"), None).await;
        assert_eq!(task["state"], "Settled");

        let (_, consensus) = call(&app, "GET", &format!("/v1/tasks/{task_id}/consensus"), None).await;
        assert_eq!(consensus["submission_count"], 2);
        assert_eq!(consensus["has_consensus"], true);

        let (_, balance) = call(&app, "GET", "/v1/accounts/provider/balance", None).await;
        assert_eq!(balance["balance"].as_i64(), Some(raw_units(100)));
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let (app, _) = app(0);

        let (status, body) = call(&app, "GET", "/v1/tasks/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["category"], "precondition");

        let (status, _) = call(
            &app,
            "POST",
            "/v1/markets",
            Some(json!({ "sender": "mallory", "market": 9 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/accounts/deposit",
            Some(json!({ "account": "a", "amount": "not-a-number" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        register_oracle(&app, 1).await;
        let task_id = revealed_task(&app).await;
        submit(&app, 1, task_id, 85).await;
        let (status, body) = submit(&app, 1, task_id, 85).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("already submitted"));
    }

    #[tokio::test]
    async fn test_time_remaining_follows_clock() {
        let (app, clock) = app(0);
        let task_id = revealed_task(&app).await;

        let (_, body) = call(&app, "GET", &format!("/v1/tasks/{task_id}/time-remaining"), None).await;
        assert_eq!(body["seconds"], 3_600);

        clock.advance(600);
        let (_, body) = call(&app, "GET", &format!("/v1/tasks/{task_id}/time-remaining"), None).await;
        assert_eq!(body["seconds"], 3_000);
        assert_eq!(body["now"], 1_600);
    }

    #[tokio::test]
    async fn test_cancel_expired_over_http() {
        let (app, clock) = app(0);
        let task_id = revealed_task(&app).await;

        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/tasks/{task_id}/cancel"),
            Some(json!({ "sender": "keeper" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        clock.advance(3_601);
        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/tasks/{task_id}/cancel"),
            Some(json!({ "sender": "keeper" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["state"], "Cancelled");

        let (_, escrow) = call(&app, "GET", &format!("/v1/tasks/{task_id}/escrow"), None).await;
        assert_eq!(escrow["status"], "Refunded");
    }

    #[tokio::test]
    async fn test_event_polling() {
        let (app, _) = app(0);
        revealed_task(&app).await;

        let (status, body) = call(&app, "GET", "/v1/events?after=0&limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(body["next"], 2);

        let (_, body) = call(&app, "GET", "/v1/events?after=2", None).await;
        let types: Vec<&str> = body["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|record| record["event"]["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["StakeLocked", "TaskRevealed"]);
    }

    #[tokio::test]
    async fn test_oracle_endpoints() {
        let (app, _) = app(0);
        let name = register_oracle(&app, 3).await;

        let (_, active) = call(&app, "GET", "/v1/oracles", None).await;
        assert_eq!(active.as_array().unwrap().len(), 1);

        let (status, record) = call(
            &app,
            "POST",
            "/v1/oracles/deactivate",
            Some(json!({ "sender": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["active"], false);

        let (status, _) = call(&app, "GET", "/v1/oracles/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
