//! HTTP API tests
//!
//! Drive the router in-process over the bundled catalog with `axum-test`.

use axum::http::StatusCode;
use axum_test::TestServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::{CompanyId, UserId};
use interface_api::auth::create_token;
use interface_api::config::ApiConfig;
use interface_api::seed::SeedIndex;
use interface_api::{build_state, create_router};

struct Api {
    server: TestServer,
    index: SeedIndex,
    token: String,
    secret: String,
    partner: String,
}

impl Api {
    fn new() -> Self {
        let config = ApiConfig::default();
        let secret = config.jwt_secret.clone();
        let state = build_state(config).unwrap();
        let index = state.index.as_ref().clone();
        let server = TestServer::new(create_router(state)).unwrap();
        let token = Self::token_for(&secret, vec!["admin".to_string()]);
        Self {
            server,
            index,
            token,
            secret,
            partner: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn token_for(secret: &str, roles: Vec<String>) -> String {
        create_token(UserId::new(), CompanyId::new(), roles, secret, 3600).unwrap()
    }

    fn method(&self, code: &str) -> String {
        self.index.methods[code].as_uuid().to_string()
    }

    fn journal(&self, code: &str) -> String {
        self.index.journals[code].as_uuid().to_string()
    }

    fn account(&self, code: &str) -> String {
        self.index.accounts[code].as_uuid().to_string()
    }

    fn payment_body(&self, method: &str, amount: &str) -> Value {
        json!({
            "method_id": self.method(method),
            "journal_id": self.journal("CHK"),
            "partner_id": self.partner,
            "direction": "inbound",
            "amount": amount,
            "counterpart_account": self.account("3421"),
            "transaction_number": "CHK-0001"
        })
    }

    async fn create_payment(&self, method: &str, amount: &str) -> String {
        let response = self
            .server
            .post("/api/v1/payments")
            .authorization_bearer(&self.token)
            .json(&self.payment_body(method, amount))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    async fn action(&self, payment: &str, action: &str) -> axum_test::TestResponse {
        self.server
            .post(&format!("/api/v1/payments/{}/{}", payment, action))
            .authorization_bearer(&self.token)
            .await
    }

    async fn payment(&self, payment: &str) -> Value {
        self.server
            .get(&format!("/api/v1/payments/{}", payment))
            .authorization_bearer(&self.token)
            .await
            .json::<Value>()
    }

    /// A deposited check posted, advanced into the bank and set unpaid
    async fn unpaid_check(&self, amount: &str) -> String {
        let id = self.create_payment("CHD", amount).await;
        self.action(&id, "post").await.assert_status_ok();
        self.action(&id, "advance").await.assert_status_ok();
        self.action(&id, "unpaid").await.assert_status_ok();
        id
    }
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

// ============================================================================
// Health and authentication
// ============================================================================

mod access {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let api = Api::new();
        let health = api.server.get("/health").await;
        health.assert_status_ok();
        assert!(!health.header("x-request-id").is_empty());

        let ready = api.server.get("/health/ready").await;
        ready.assert_status_ok();
        assert_eq!(ready.json::<Value>()["status"], "ready");
    }

    #[tokio::test]
    async fn test_missing_or_invalid_token_is_unauthorized() {
        let api = Api::new();
        api.server
            .get("/api/v1/payments")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let forged = Api::token_for("another-secret", vec!["admin".to_string()]);
        api.server
            .get("/api/v1/payments")
            .authorization_bearer(forged)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_read_only_role_cannot_write() {
        let api = Api::new();
        let reader = Api::token_for(&api.secret, vec!["payment:read".to_string()]);

        api.server
            .get("/api/v1/payments")
            .authorization_bearer(&reader)
            .await
            .assert_status_ok();

        let response = api
            .server
            .post("/api/v1/payments")
            .authorization_bearer(&reader)
            .json(&api.payment_body("CHD", "100"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"], "forbidden");
    }
}

// ============================================================================
// Payments
// ============================================================================

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_create_post_and_advance() {
        let api = Api::new();
        let id = api.create_payment("CHD", "1000").await;

        let draft = api.payment(&id).await;
        assert_eq!(draft["state"], "draft");
        assert!(draft["stage_id"].is_null());

        api.action(&id, "post").await.assert_status_ok();
        let advanced = api.action(&id, "advance").await;
        advanced.assert_status_ok();
        let outcome = advanced.json::<Value>();
        assert_eq!(outcome["is_paid"], false);

        let payment = api.payment(&id).await;
        assert_eq!(payment["state"], "posted");
        assert_eq!(payment["history"].as_array().unwrap().len(), 2);

        let entry_id = outcome["entry_id"].as_str().unwrap();
        let entry = api
            .server
            .get(&format!("/api/v1/entries/{}", entry_id))
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let lines = entry["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| decimal(&l["amount"]) == dec!(1000)));
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected_with_details() {
        let api = Api::new();
        let response = api
            .server
            .post("/api/v1/payments")
            .authorization_bearer(&api.token)
            .json(&api.payment_body("CHD", "-5"))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["error"], "validation_error");
        assert!(body["details"][0].as_str().unwrap().starts_with("amount"));
    }

    #[tokio::test]
    async fn test_unknown_payment_is_not_found() {
        let api = Api::new();
        let response = api.payment(&uuid::Uuid::new_v4().to_string()).await;
        assert_eq!(response["error"], "not_found");
    }

    #[tokio::test]
    async fn test_posting_twice_conflicts() {
        let api = Api::new();
        let id = api.create_payment("CHD", "250").await;
        api.action(&id, "post").await.assert_status_ok();
        api.action(&id, "post").await.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_check_must_be_sent_before_advancing() {
        let api = Api::new();
        let id = api.create_payment("CHK", "300").await;
        api.action(&id, "post").await.assert_status_ok();
        api.action(&id, "advance")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_exception_filter_lists_unpaid_checks() {
        let api = Api::new();
        let unpaid = api.unpaid_check("400").await;
        let _clean = api.create_payment("CHD", "100").await;

        let listed = api
            .server
            .get("/api/v1/payments")
            .add_query_param("exception", "unpaid")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let ids: Vec<&str> = listed.as_array().unwrap().iter().map(|p| p["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![unpaid.as_str()]);
    }

    #[tokio::test]
    async fn test_entry_date_override() {
        let api = Api::new();
        let id = api.create_payment("CHD", "100").await;
        let posted = api
            .server
            .post(&format!("/api/v1/payments/{}/post", id))
            .add_query_param("entry_date", "2024-01-31")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();

        let entry = api
            .server
            .get(&format!("/api/v1/entries/{}", posted["entry_id"].as_str().unwrap()))
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        assert_eq!(entry["date"], "2024-01-31");
    }
}

// ============================================================================
// Replacements
// ============================================================================

mod replacements {
    use super::*;

    #[tokio::test]
    async fn test_replace_and_unwind() {
        let api = Api::new();
        let original = api.unpaid_check("1000").await;
        let replacement = api.create_payment("CHD", "1000").await;

        let response = api
            .server
            .post("/api/v1/replacements")
            .authorization_bearer(&api.token)
            .json(&json!({ "original_ids": [original], "replacement_id": replacement }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let outcome = response.json::<Value>();
        assert_eq!(decimal(&outcome["consumed"]), dec!(1000));
        assert_eq!(decimal(&outcome["excess"]), dec!(0));
        assert_eq!(api.payment(&original).await["is_replaced"], true);

        api.server
            .delete(&format!("/api/v1/replacements/{}", replacement))
            .authorization_bearer(&api.token)
            .await
            .assert_status_ok();

        let links = api
            .server
            .get("/api/v1/replacements")
            .add_query_param("payment_id", &original)
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let links = links.as_array().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["active"], false);
        assert_eq!(api.payment(&original).await["is_replaced"], false);
    }

    #[tokio::test]
    async fn test_empty_originals_rejected() {
        let api = Api::new();
        let replacement = api.create_payment("CHD", "100").await;
        api.server
            .post("/api/v1/replacements")
            .authorization_bearer(&api.token)
            .json(&json!({ "original_ids": [], "replacement_id": replacement }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}

// ============================================================================
// Batches
// ============================================================================

mod batches {
    use super::*;

    #[tokio::test]
    async fn test_batch_switch_hands_checks_to_the_bank() {
        let api = Api::new();
        let check = api.create_payment("CHK", "700").await;
        api.action(&check, "post").await.assert_status_ok();

        let created = api
            .server
            .post("/api/v1/batches")
            .authorization_bearer(&api.token)
            .json(&json!({
                "name": "Remittance",
                "journal_id": api.journal("CHK"),
                "destination_journal_id": api.journal("BNK"),
                "payment_ids": [check]
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let batch = created.json::<Value>()["id"].as_str().unwrap().to_string();

        api.server
            .put(&format!("/api/v1/batches/{}/reference", batch))
            .authorization_bearer(&api.token)
            .json(&json!({ "external_ref": "REM-001" }))
            .await
            .assert_status_ok();
        api.server
            .post(&format!("/api/v1/batches/{}/validate", batch))
            .authorization_bearer(&api.token)
            .await
            .assert_status_ok();

        let switched = api
            .server
            .post(&format!("/api/v1/batches/{}/switch", batch))
            .authorization_bearer(&api.token)
            .await;
        switched.assert_status_ok();
        let report = switched.json::<Value>();
        assert_eq!(report["switched"].as_array().unwrap().len(), 1);

        let batch = api
            .server
            .get(&format!("/api/v1/batches/{}", batch))
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        assert_eq!(batch["state"], "sent");
        assert_eq!(batch["external_ref"], "REM-001");
        assert_eq!(batch["bank_side_payments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_reference_rejected() {
        let api = Api::new();
        api.server
            .put(&format!("/api/v1/batches/{}/reference", uuid::Uuid::new_v4()))
            .authorization_bearer(&api.token)
            .json(&json!({ "external_ref": "   " }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}

// ============================================================================
// Catalog
// ============================================================================

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_catalog_lists_methods_in_code_order() {
        let api = Api::new();
        let catalog = api
            .server
            .get("/api/v1/catalog")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();

        let codes: Vec<&str> = catalog["methods"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["CHD", "CHK"]);

        let stages = api
            .server
            .get(&format!("/api/v1/catalog/{}/stages", api.method("CHK")))
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let sequences: Vec<u64> = stages
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![10, 20, 30, 40, 50, 60]);
    }
}
