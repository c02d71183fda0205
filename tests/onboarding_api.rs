//! Integration tests for the onboarding REST API.
//!
//! Each test spins up an Axum server on a random port and drives the real
//! HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use coach_onboarding::onboarding::manager::WizardManager;
use coach_onboarding::onboarding::routes::onboarding_routes;
use coach_onboarding::onboarding::submission::{HttpSubmitter, StoreSubmitter, Submitter};
use coach_onboarding::onboarding::OnboardingType;
use coach_onboarding::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: axum::Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// Start the onboarding API backed by an in-memory store, return (base URL, db).
async fn start_server() -> (String, Arc<dyn Database>) {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let submitter: Arc<dyn Submitter> = Arc::new(StoreSubmitter::new(Arc::clone(&db)));
    let port = serve(onboarding_routes(Arc::new(WizardManager::new(submitter)))).await;
    (format!("http://127.0.0.1:{port}"), db)
}

/// Start the onboarding API with an HTTP submitter aimed at a backend that
/// always answers 503.
async fn start_server_with_failing_backend() -> String {
    let backend = axum::Router::new().route(
        "/applications",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let backend_port = serve(backend).await;

    let submitter: Arc<dyn Submitter> = Arc::new(HttpSubmitter::new(
        format!("http://127.0.0.1:{backend_port}/applications"),
        None,
    ));
    let port = serve(onboarding_routes(Arc::new(WizardManager::new(submitter)))).await;
    format!("http://127.0.0.1:{port}")
}

struct Api {
    base: String,
    client: reqwest::Client,
}

impl Api {
    fn new(base: String) -> Self {
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (u16, Value) {
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        self.send(self.client.get(format!("{}{path}", self.base))).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = self.client.post(format!("{}{path}", self.base));
        if let Some(body) = body {
            req = req.json(&body);
        }
        self.send(req).await
    }

    async fn patch(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(self.client.patch(format!("{}{path}", self.base)).json(&body))
            .await
    }

    async fn start(&self, kind: &str) -> String {
        let (status, body) = self
            .post("/api/onboarding/sessions", Some(json!({ "type": kind })))
            .await;
        assert_eq!(status, 201);
        body["id"].as_str().unwrap().to_string()
    }

    async fn fill(&self, id: &str, data: Value) -> Value {
        let (status, body) = self
            .patch(&format!("/api/onboarding/sessions/{id}/data"), data)
            .await;
        assert_eq!(status, 200, "patch failed: {body}");
        body
    }

    async fn select(&self, id: &str, field: &str, option: &str) -> Value {
        let (status, body) = self
            .post(
                &format!("/api/onboarding/sessions/{id}/select"),
                Some(json!({ "field": field, "option": option })),
            )
            .await;
        assert_eq!(status, 200, "select failed: {body}");
        body
    }

    async fn next(&self, id: &str) -> (u16, Value) {
        self.post(&format!("/api/onboarding/sessions/{id}/next"), None)
            .await
    }
}

/// Walk a client to the review step, selecting `insomnia` + `moderate`
/// on the health assessment.
async fn client_to_review(api: &Api) -> String {
    let id = api.start("client").await;
    api.fill(
        &id,
        json!({ "firstName": "Ana", "lastName": "Lima", "email": "ana@example.com" }),
    )
    .await;
    assert_eq!(api.next(&id).await.0, 200);

    api.select(&id, "healthConcerns", "insomnia").await;
    let body = api.fill(&id, json!({ "exerciseFrequency": "moderate" })).await;
    assert_eq!(body["can_go_next"], true);
    assert_eq!(api.next(&id).await.0, 200);

    api.fill(
        &id,
        json!({
            "wellnessGoals": ["better_sleep"],
            "goalTimeline": "three_months",
            "stressLevel": "high",
            "sleepHours": 5,
            "sessionFormat": "video",
            "availability": ["evenings"],
            "agreeTerms": true,
            "agreePrivacy": true
        }),
    )
    .await;
    for _ in 0..4 {
        let (status, body) = api.next(&id).await;
        assert_eq!(status, 200, "next failed: {body}");
    }

    let (_, snap) = api.get(&format!("/api/onboarding/sessions/{id}")).await;
    assert_eq!(snap["step"]["id"], "review");
    id
}

#[tokio::test]
async fn health_check() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let (status, body) = api.get("/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "onboarding");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn client_onboarding_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let (base, db) = start_server().await;
        let api = Api::new(base);
        let id = client_to_review(&api).await;

        let (status, review) = api
            .get(&format!("/api/onboarding/sessions/{id}/review"))
            .await;
        assert_eq!(status, 200);
        assert_eq!(review["data"]["healthConcerns"], json!(["insomnia"]));
        let health = review["sections"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["step"] == "health_assessment")
            .unwrap();
        assert_eq!(health["index"], 1);
        assert_eq!(health["entries"][0]["display"], "Sleep difficulties");

        let (status, body) = api
            .post(&format!("/api/onboarding/sessions/{id}/submit"), None)
            .await;
        assert_eq!(status, 200, "submit failed: {body}");
        assert_eq!(body["redirect"], "/client/dashboard");

        // Stored through the store submitter
        let stored = db
            .get_application(id.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.onboarding_type, OnboardingType::Client);
        assert_eq!(stored.data.selections("healthConcerns"), vec!["insomnia"]);
        assert_eq!(db.find_applications_by_email("ANA@example.com").await.unwrap().len(), 1);

        // Session is closed after success
        let (status, _) = api.get(&format!("/api/onboarding/sessions/{id}")).await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_submission_stays_on_review() {
    timeout(TEST_TIMEOUT, async {
        let api = Api::new(start_server_with_failing_backend().await);
        let id = client_to_review(&api).await;
        let (_, before) = api.get(&format!("/api/onboarding/sessions/{id}")).await;

        let (status, body) = api
            .post(&format!("/api/onboarding/sessions/{id}/submit"), None)
            .await;
        assert_eq!(status, 502);
        assert_eq!(body["error"], "Submission failed");

        let (status, after) = api.get(&format!("/api/onboarding/sessions/{id}")).await;
        assert_eq!(status, 200);
        assert_eq!(after["status"], "in_progress");
        assert_eq!(after["step"]["id"], "review");
        assert_eq!(after["last_error"], "Submission failed");
        assert_eq!(after["data"], before["data"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn coach_banking_rules() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let id = api.start("coach").await;
        let banking = 4;

        let body = api.fill(&id, json!({ "paymentMethod": "check" })).await;
        assert_eq!(body["steps"][banking]["valid"], true);

        let body = api
            .fill(&id, json!({ "paymentMethod": "direct_deposit" }))
            .await;
        assert_eq!(body["steps"][banking]["valid"], false);

        let body = api
            .fill(
                &id,
                json!({
                    "bankName": "First Credit Union",
                    "accountNumber": "000123456789",
                    "routingNumber": "021000021"
                }),
            )
            .await;
        assert_eq!(body["steps"][banking]["valid"], false, "holder name missing");

        let body = api
            .fill(&id, json!({ "accountHolderName": "Sam Okafor" }))
            .await;
        assert_eq!(body["steps"][banking]["valid"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn fifth_specialization_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let id = api.start("coach").await;

        for option in ["sleep", "nutrition", "fitness", "gut_health"] {
            let body = api.select(&id, "specializations", option).await;
            assert_eq!(body["selection"]["outcome"], "added");
            assert_eq!(body["steps"][2]["valid"], true);
        }

        let body = api.select(&id, "specializations", "mindfulness").await;
        assert_eq!(body["selection"]["outcome"], "rejected");
        assert_eq!(body["data"]["specializations"].as_array().unwrap().len(), 4);
        assert_eq!(body["steps"][2]["valid"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn repeated_specializations_are_ignored() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let id = api.start("coach").await;

        let body = api
            .fill(
                &id,
                json!({ "specializations": ["sleep", "sleep", "sleep", "sleep"] }),
            )
            .await;
        assert_eq!(body["ignored"][0]["field"], "specializations");
        assert!(body["data"].get("specializations").is_none());

        api.select(&id, "specializations", "sleep").await;
        let body = api.select(&id, "specializations", "nutrition").await;
        assert_eq!(body["selection"]["outcome"], "added");
        assert_eq!(body["steps"][2]["valid"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn navigation_guards() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let id = api.start("client").await;

        // Next blocked on an empty first step
        let (status, body) = api.next(&id).await;
        assert_eq!(status, 422);
        assert_eq!(body["step"], "personal_info");

        // Out-of-range jump
        let (status, _) = api
            .post(&format!("/api/onboarding/sessions/{id}/goto/42"), None)
            .await;
        assert_eq!(status, 400);

        // Back is clamped at the first step
        let (status, body) = api
            .post(&format!("/api/onboarding/sessions/{id}/back"), None)
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["current_step"], 0);

        // Bad and unknown ids
        let (status, _) = api.get("/api/onboarding/sessions/nope").await;
        assert_eq!(status, 400);
        let (status, _) = api
            .get(&format!("/api/onboarding/sessions/{}", uuid::Uuid::new_v4()))
            .await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn round_trip_preserves_data() {
    timeout(TEST_TIMEOUT, async {
        let (base, _db) = start_server().await;
        let api = Api::new(base);
        let id = client_to_review(&api).await;
        let (_, before) = api.get(&format!("/api/onboarding/sessions/{id}")).await;

        let (status, _) = api
            .post(&format!("/api/onboarding/sessions/{id}/goto/1"), None)
            .await;
        assert_eq!(status, 200);
        for _ in 0..5 {
            assert_eq!(api.next(&id).await.0, 200);
        }

        let (_, after) = api.get(&format!("/api/onboarding/sessions/{id}")).await;
        assert_eq!(after["step"]["id"], "review");
        assert_eq!(after["data"], before["data"]);
    })
    .await
    .expect("test timed out");
}
