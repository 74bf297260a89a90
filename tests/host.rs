use std::time::Duration;

use pixelweight_lib::{
    db::{AnalysisState, Database},
    host::{read_frame, serve, write_frame},
    settings::PipelineSettings,
};
use serde_json::{json, Value};
use tokio::{io::DuplexStream, time::timeout};

async fn next_frame(reader: &mut DuplexStream) -> Value {
    timeout(Duration::from_secs(5), read_frame(reader))
        .await
        .expect("host went quiet")
        .unwrap()
        .expect("host closed the pipe")
}

fn window(width: i64, height: i64) -> Value {
    json!({"id": 1, "state": "normal", "width": width, "height": height, "left": 0, "top": 0})
}

#[tokio::test]
async fn full_run_over_native_messaging() {
    let (mut to_host, host_in) = tokio::io::duplex(64 * 1024);
    let (host_out, mut from_host) = tokio::io::duplex(64 * 1024);

    let db = Database::in_memory().unwrap();
    let pipeline = PipelineSettings {
        settle_delay_ms: 300,
        ..PipelineSettings::default()
    };
    let server = tokio::spawn(serve(host_in, host_out, db, pipeline));

    write_frame(&mut to_host, &json!({"id": 1, "action": "contentReady", "elements": []}))
        .await
        .unwrap();
    assert_eq!(next_frame(&mut from_host).await, json!({"drained": 0, "id": 1}));

    write_frame(
        &mut to_host,
        &json!({"id": 2, "action": "sustainable-analysis", "width": "375", "height": "667"}),
    )
    .await
    .unwrap();

    let mut methods = Vec::new();
    let mut started = false;
    let surface = loop {
        let frame = next_frame(&mut from_host).await;
        if frame["type"] == "browserRequest" {
            let method = frame["method"].as_str().unwrap().to_string();
            let reply_window = match method.as_str() {
                "resizeWindow" => Some(window(375, 667)),
                "reloadTab" => None,
                _ => Some(window(1440, 900)),
            };
            write_frame(
                &mut to_host,
                &json!({
                    "action": "browserReply",
                    "requestId": frame["requestId"],
                    "ok": true,
                    "window": reply_window
                }),
            )
            .await
            .unwrap();

            match method.as_str() {
                "reloadTab" => {
                    write_frame(
                        &mut to_host,
                        &json!({
                            "id": 3,
                            "action": "logImageData",
                            "imageData": {"url": "https://a.test/hero.jpg", "size": 5000, "type": "image/jpeg"}
                        }),
                    )
                    .await
                    .unwrap();
                }
                "restoreWindow" => {
                    assert_eq!(frame["window"]["width"], 1440);
                    write_frame(&mut to_host, &json!({"id": 4, "action": "getState"}))
                        .await
                        .unwrap();
                }
                _ => {}
            }
            methods.push(method);
        } else if frame["id"] == 2 {
            assert_eq!(frame["started"], true);
            started = true;
        } else if frame["id"] == 4 {
            break frame;
        }
    };

    assert!(started);
    assert_eq!(methods, vec!["getWindow", "resizeWindow", "reloadTab", "restoreWindow"]);
    assert_eq!(surface["analysisState"], "completed");
    assert_eq!(surface["imageData"][0]["url"], "https://a.test/hero.jpg");

    drop(to_host);
    timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn malformed_message_gets_error_reply() {
    let (mut to_host, host_in) = tokio::io::duplex(4096);
    let (host_out, mut from_host) = tokio::io::duplex(4096);
    let db = Database::in_memory().unwrap();
    let server = tokio::spawn(serve(host_in, host_out, db, PipelineSettings::default()));

    write_frame(&mut to_host, &json!({"action": "launchRockets"}))
        .await
        .unwrap();
    let reply = next_frame(&mut from_host).await;
    assert!(reply["error"].as_str().unwrap().starts_with("unrecognised message"));

    write_frame(&mut to_host, &json!({"id": 9, "action": "getState"}))
        .await
        .unwrap();
    let reply = next_frame(&mut from_host).await;
    assert_eq!(reply["id"], 9);
    assert_eq!(reply["analysisState"], "idle");

    drop(to_host);
    timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn closing_pipe_mid_run_returns_promptly() {
    let (mut to_host, host_in) = tokio::io::duplex(64 * 1024);
    let (host_out, mut from_host) = tokio::io::duplex(64 * 1024);

    let db = Database::in_memory().unwrap();
    let pipeline = PipelineSettings {
        settle_delay_ms: 30_000,
        ..PipelineSettings::default()
    };
    let server = tokio::spawn(serve(host_in, host_out, db.clone(), pipeline));

    write_frame(
        &mut to_host,
        &json!({"id": 1, "action": "sustainable-analysis", "width": 375, "height": 667}),
    )
    .await
    .unwrap();

    loop {
        let frame = next_frame(&mut from_host).await;
        if frame["type"] != "browserRequest" {
            continue;
        }
        let method = frame["method"].as_str().unwrap().to_string();
        let reply_window = if method == "reloadTab" {
            None
        } else {
            Some(window(1440, 900))
        };
        write_frame(
            &mut to_host,
            &json!({
                "action": "browserReply",
                "requestId": frame["requestId"],
                "ok": true,
                "window": reply_window
            }),
        )
        .await
        .unwrap();
        if method == "reloadTab" {
            break;
        }
    }

    drop(to_host);
    timeout(Duration::from_secs(2), server)
        .await
        .expect("serve waited on a browser reply nobody can send")
        .unwrap()
        .unwrap();
    assert_eq!(db.get_analysis_state().await.unwrap(), AnalysisState::Stopped);
}
