//! Panel clients against a local HTTP stub.

mod common;

use common::fixtures::jpeg_image;
use common::stub_server::{StubServer, chat_reply};
use kitchen_capture::panels::local::{FreshnessClient, VolumeClient};
use kitchen_capture::panels::inventory::{self, DateKind, DetectionSource};
use kitchen_capture::panels::{VisionClient, expiry, food_waste, garbage, recognition};
use kitchen_capture::{PanelConfig, PanelError, Retryable};

fn vision_config(server: &StubServer) -> PanelConfig {
    PanelConfig {
        vision_endpoint: format!("{}/openai/v1/chat/completions", server.base_url),
        timeout_secs: 5,
        ..PanelConfig::default()
    }
}

fn vision_client(server: &StubServer) -> VisionClient {
    VisionClient::from_config(&vision_config(server))
        .unwrap()
        .with_api_key(Some("test-key".into()))
}

#[tokio::test]
async fn test_food_waste_uses_answer_line() {
    let server = StubServer::start(vec![(
        200,
        chat_reply("The bread has visible mold.\n*Answer:* Spoiled Food"),
    )])
    .await;
    let result = food_waste::classify(&vision_client(&server), &jpeg_image(16, 16)).await;

    assert_eq!(result.category.id, "spoiled");
    assert!(!result.simulated);
    assert!((80..=94).contains(&result.confidence));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/openai/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer test-key"));

    let body = request.json();
    assert_eq!(body["model"], "llama-3.2-90b-vision-preview");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["top_p"], 1.0);
    let parts = &body["messages"][0]["content"];
    assert!(parts[0]["text"].as_str().unwrap().contains("Stale Food"));
    assert!(
        parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,")
    );
}

#[tokio::test]
async fn test_food_waste_without_key_is_simulated_offline() {
    let server = StubServer::start(vec![(200, chat_reply("Answer: Fresh Food"))]).await;
    let client = VisionClient::from_config(&vision_config(&server))
        .unwrap()
        .with_api_key(None);

    let result = food_waste::classify(&client, &jpeg_image(16, 16)).await;
    assert!(result.simulated);
    assert!(result.notice.is_none());
    assert!((75..=94).contains(&result.confidence));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_food_waste_backend_failure_is_simulated_with_notice() {
    let server = StubServer::start(vec![(
        500,
        r#"{"error":{"message":"model overloaded"}}"#.to_string(),
    )])
    .await;
    let result = food_waste::classify(&vision_client(&server), &jpeg_image(16, 16)).await;

    assert!(result.simulated);
    let notice = result.notice.expect("notice");
    assert!(notice.starts_with("Failed to analyze image:"));
    assert!(notice.contains("model overloaded"));
}

#[tokio::test]
async fn test_garbage_yes_asks_for_description() {
    let server = StubServer::start(vec![
        (200, chat_reply("Yes, this is garbage.")),
        (200, chat_reply("Crumpled paper and an empty can.")),
    ])
    .await;
    let verdict = garbage::classify(&vision_client(&server), &jpeg_image(16, 16))
        .await
        .unwrap();

    assert!(verdict.is_garbage);
    assert_eq!(verdict.classification, "Yes, this is garbage.");
    assert_eq!(
        verdict.description.as_deref(),
        Some("Crumpled paper and an empty can.")
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    let first = requests[0].json();
    assert_eq!(
        first["messages"][0]["content"][0]["text"],
        garbage::CLASSIFY_PROMPT
    );
    let second = requests[1].json();
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Yes, this is garbage.");
    assert_eq!(messages[2]["content"], garbage::DESCRIBE_PROMPT);
    assert_eq!(second["temperature"], 0.7);
}

#[tokio::test]
async fn test_garbage_no_skips_description() {
    let server = StubServer::start(vec![(200, chat_reply("No."))]).await;
    let verdict = garbage::classify(&vision_client(&server), &jpeg_image(16, 16))
        .await
        .unwrap();

    assert!(!verdict.is_garbage);
    assert!(verdict.description.is_none());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_garbage_requires_credentials() {
    let server = StubServer::start(vec![(200, chat_reply("Yes"))]).await;
    let client = VisionClient::from_config(&vision_config(&server))
        .unwrap()
        .with_api_key(None);

    let err = garbage::classify(&client, &jpeg_image(16, 16)).await.unwrap_err();
    assert!(matches!(err, PanelError::MissingCredentials { .. }));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_expiry_default_and_custom_prompt() {
    let server = StubServer::start(vec![(200, chat_reply("12/31/2025"))]).await;
    let client = vision_client(&server);
    let image = jpeg_image(16, 16);

    assert_eq!(expiry::read_expiry(&client, &image, None).await.unwrap(), "12/31/2025");
    expiry::read_expiry(&client, &image, Some("What is the best-before date?"))
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(
        requests[0].json()["messages"][0]["content"][0]["text"],
        expiry::DEFAULT_PROMPT
    );
    assert_eq!(
        requests[1].json()["messages"][0]["content"][0]["text"],
        "What is the best-before date?"
    );
    assert_eq!(requests[0].json()["temperature"], 0.7);
}

#[tokio::test]
async fn test_inventory_detects_items_and_label_date() {
    let server = StubServer::start(vec![
        (
            200,
            chat_reply(r#"Detected: [{"name":"Merlot","quantity":4,"type":"vine"},{"name":"Chardonnay"}]"#),
        ),
        (200, chat_reply("The manufacturing date is 14/09/2023.")),
    ])
    .await;
    let client = vision_client(&server);
    let image = jpeg_image(16, 16);

    let detection = inventory::detect_items(&client, &image, "vine").await.unwrap();
    assert_eq!(detection.source, DetectionSource::Json);
    assert_eq!(detection.items.len(), 2);
    assert_eq!(detection.items[0].name, "Merlot");
    assert_eq!(detection.items[0].quantity, Some(4));
    assert_eq!(detection.items[1].quantity, None);
    assert_eq!(detection.items[1].material, "vine");

    let label = inventory::extract_date(&client, &image, DateKind::for_material("vine"))
        .await
        .unwrap();
    assert_eq!(label.kind, DateKind::Manufacturing);
    assert_eq!(label.date.as_deref(), Some("14/09/2023"));

    let requests = server.requests();
    let detect = requests[0].json();
    let prompt = detect["messages"][0]["content"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("products made of vine"));
    assert_eq!(detect["temperature"], 0.5);
    assert_eq!(detect["top_p"], 1.0);

    let date = requests[1].json();
    let prompt = date["messages"][0]["content"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("extract the manufacturing date"));
    assert_eq!(date["max_tokens"], 128);
    assert!((date["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn test_inventory_prose_reply_falls_back_to_counts() {
    let server = StubServer::start(vec![(200, chat_reply("I can see Chapati stack: 6"))]).await;
    let detection = inventory::detect_items(&vision_client(&server), &jpeg_image(16, 16), "chapati")
        .await
        .unwrap();

    assert_eq!(detection.source, DetectionSource::CountPairs);
    assert_eq!(detection.items[0].name, "Chapati stack");
    assert_eq!(detection.items[0].quantity, Some(6));
    assert_eq!(detection.items[0].material, "chapati");
}

#[tokio::test]
async fn test_vision_error_body_is_surfaced() {
    let server = StubServer::start(vec![(
        401,
        r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#.to_string(),
    )])
    .await;
    let err = expiry::read_expiry(&vision_client(&server), &jpeg_image(16, 16), None)
        .await
        .unwrap_err();

    match &err {
        PanelError::Status {
            status, message, ..
        } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Invalid API Key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_recognition_falls_back_when_unreachable() {
    let config = PanelConfig {
        vision_endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
        timeout_secs: 2,
        ..PanelConfig::default()
    };
    let client = VisionClient::from_config(&config)
        .unwrap()
        .with_api_key(Some("test-key".into()));

    let result = recognition::describe(&client, &jpeg_image(16, 16)).await;
    assert!(result.simulated);
    assert!(result.description.contains("simulated response"));
}

#[tokio::test]
async fn test_recognition_returns_model_text() {
    let server = StubServer::start(vec![(200, chat_reply("Two apples and a banana."))]).await;
    let result = recognition::describe(&vision_client(&server), &jpeg_image(16, 16)).await;
    assert!(!result.simulated);
    assert_eq!(result.description, "Two apples and a banana.");
    assert_eq!(
        server.requests()[0].json()["messages"][0]["content"][0]["text"],
        recognition::PROMPT
    );
}

#[tokio::test]
async fn test_large_upload_is_downscaled() {
    let server = StubServer::start(vec![(200, chat_reply("A plate."))]).await;
    let config = PanelConfig {
        max_upload_side: Some(64),
        ..vision_config(&server)
    };
    let client = VisionClient::from_config(&config)
        .unwrap()
        .with_api_key(Some("test-key".into()));

    recognition::describe(&client, &jpeg_image(256, 128)).await;
    let body = server.requests()[0].json();
    let url = body["messages"][0]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap()
        .to_string();
    let bytes = kitchen_capture::processing::DataUri::parse(&url).unwrap().bytes;
    let sent = image::load_from_memory(&bytes).unwrap();
    assert_eq!((sent.width(), sent.height()), (64, 32));
}

#[tokio::test]
async fn test_volume_estimate() {
    let server = StubServer::start(vec![(
        200,
        r#"{"success":true,"liquid_percentage":62.5,"remaining_volume_ml":312.5,"result_image":"AQID"}"#
            .to_string(),
    )])
    .await;
    let config = PanelConfig {
        volume_base_url: server.base_url.clone(),
        ..PanelConfig::default()
    };
    let estimate = VolumeClient::from_config(&config)
        .unwrap()
        .estimate(&jpeg_image(16, 16), 500.0)
        .await
        .unwrap();

    assert_eq!(estimate.liquid_percentage, 62.5);
    assert_eq!(estimate.remaining_volume_ml, 312.5);
    assert_eq!(estimate.result_image_bytes(), Some(Ok(vec![1, 2, 3])));

    let request = &server.requests()[0];
    assert_eq!(request.path, "/api/estimate-volume");
    assert!(
        request
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data")
    );
    let body = request.body_text();
    assert!(body.contains(r#"name="image""#));
    assert!(body.contains(r#"filename="file.jpg""#));
    assert!(body.contains(r#"name="capacity""#));
    assert!(body.contains("500"));
}

#[tokio::test]
async fn test_volume_backend_error_field() {
    let server = StubServer::start(vec![(
        400,
        r#"{"error":"Unable to detect liquid level reliably"}"#.to_string(),
    )])
    .await;
    let config = PanelConfig {
        volume_base_url: server.base_url.clone(),
        ..PanelConfig::default()
    };
    let err = VolumeClient::from_config(&config)
        .unwrap()
        .estimate(&jpeg_image(16, 16), 750.0)
        .await
        .unwrap_err();

    match err {
        PanelError::Backend { message, .. } => {
            assert_eq!(message, "Unable to detect liquid level reliably")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_freshness_prediction_and_health() {
    let server = StubServer::start(vec![
        (200, r#"{"fruit":"banana","freshness":"Fresh"}"#.to_string()),
        (200, r#"{"status":"healthy","model_loaded":true}"#.to_string()),
    ])
    .await;
    let config = PanelConfig {
        freshness_base_url: server.base_url.clone(),
        ..PanelConfig::default()
    };
    let client = FreshnessClient::from_config(&config).unwrap();

    let prediction = client.predict(&jpeg_image(16, 16)).await.unwrap();
    assert_eq!(prediction.fruit, "banana");
    assert_eq!(prediction.freshness, "Fresh");
    assert!(client.health().await.unwrap());

    let requests = server.requests();
    assert_eq!(requests[0].path, "/predict");
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path, "/health");
}

#[tokio::test]
async fn test_unreachable_service_is_retryable() {
    let config = PanelConfig {
        volume_base_url: "http://127.0.0.1:9".into(),
        timeout_secs: 2,
        ..PanelConfig::default()
    };
    let err = VolumeClient::from_config(&config)
        .unwrap()
        .health()
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}
