use axum::{body::{to_bytes, Body}, http::{Request, StatusCode}, Router};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn gridworld_expert_episode_via_http() {
    gridworld_env::register_default_env();
    let app = env_service::make_app();

    // GET /envs
    let res = app.clone().oneshot(Request::builder().uri("/envs").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let arr: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert!(arr.contains(&"GridWorld".to_string()));

    // POST /initialize with the oracle driving the agent tool
    let init = json!({
        "env_type": "GridWorld",
        "config": {"policy": "expert", "seed": 11, "instruction": "pick up the blue block"}
    });
    let (status, body) = post(&app, "/initialize", init).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    let env_id = v["env_id"].as_str().unwrap().to_string();
    assert_eq!(v["observation"]["data"]["instruction"], "pick up the blue block");

    let mut last = Value::Null;
    for _ in 0..20 {
        let req = json!({"env_id": env_id, "tool_calls": [{"tool": "agent", "args": {}}]});
        let (status, body) = post(&app, "/step", req).await;
        assert_eq!(status, StatusCode::OK);
        last = serde_json::from_slice(&body).unwrap();
        if last["terminated"].as_bool().unwrap() || last["truncated"].as_bool().unwrap() {
            break;
        }
    }
    assert_eq!(last["terminated"], true);
    assert_eq!(last["data"]["holding"], "blue");

    // Further steps are refused once the goal is reached
    let req = json!({"env_id": env_id, "tool_calls": [{"tool": "interact", "args": {"action": "up"}}]});
    let (status, _) = post(&app, "/step", req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(&app, "/checkpoint", json!({"env_id": env_id})).await;
    assert_eq!(status, StatusCode::OK);
    let snap: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snap["engine"], "gridworld");

    let (status, _) = post(&app, "/terminate", json!({"env_id": env_id})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(&app, "/checkpoint", json!({"env_id": env_id})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_requests_map_to_status_codes() {
    gridworld_env::register_default_env();
    let app = env_service::make_app();

    let (status, _) = post(&app, "/initialize", json!({"env_type": "Chess"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/initialize", json!({"env_type": "GridWorld", "config": {"size": 2}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(&app, "/initialize", json!({"env_type": "GridWorld", "config": {"policy": "expert"}})).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    let env_id = v["env_id"].as_str().unwrap();

    let req = json!({"env_id": env_id, "tool_calls": [{"tool": "interact", "args": {"action": 6}}]});
    let (status, _) = post(&app, "/step", req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = json!({"env_id": "env-missing", "tool_calls": [{"tool": "agent", "args": {}}]});
    let (status, _) = post(&app, "/step", req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_configs_are_rejected_before_allocation() {
    gridworld_env::register_default_env();
    let app = env_service::make_app();

    for config in [json!({"size": 100_000}), json!({"size": 65}), json!({"demo_episodes": 10_000_000})] {
        let (status, body) = post(&app, "/initialize", json!({"env_type": "GridWorld", "config": config})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", String::from_utf8_lossy(&body));
    }

    // The service keeps serving after the rejections
    let (status, _) = post(&app, "/initialize", json!({"env_type": "GridWorld", "config": {"policy": "expert", "size": 64}})).await;
    assert_eq!(status, StatusCode::OK);
}
