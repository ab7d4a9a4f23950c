use actix_web::{App, http::StatusCode, test, web};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use securebank::application::session::SessionManager;
use securebank::data::session_store::InMemorySessionStore;
use securebank::data::transaction_repository::InMemoryTransactionRepository;
use securebank::data::user_repository::InMemoryUserRepository;
use securebank::domain::models::AccountNumber;
use securebank::domain::user::{LoginRequest, SeedUser};
use securebank::infrastructure::geolocation::DisabledGeoLocator;
use securebank::presentation::handlers::{
    AppState, cancel_transaction, confirm_transaction, initiate_transaction, list_transactions,
    me, pending_transaction,
};
use securebank::presentation::middleware::JwtAuthMiddleware;

const ALICE_ACCOUNT: &str = "1234567890";
const BOB_ACCOUNT: &str = "9876543210";

fn seed(name: &str, email: &str, password: &str, account: &str, balance: &str) -> SeedUser {
    SeedUser {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        account_number: AccountNumber::parse(account).ok(),
        balance: Some(balance.to_string()),
        is_admin: false,
    }
}

macro_rules! setup_transaction_test {
    () => {{
        let sessions = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
        let jwt_secret = "test-secret-key-for-transaction-tests".to_string();
        let state = web::Data::new(AppState::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryTransactionRepository::new()),
            sessions.clone(),
            Arc::new(DisabledGeoLocator),
            Duration::from_millis(50),
            jwt_secret.clone(),
        ));

        state
            .auth_service
            .seed_user(seed("Alice Doe", "alice@example.com", "alice-pass", ALICE_ACCOUNT, "2500.75"))
            .await
            .unwrap();
        state
            .auth_service
            .seed_user(seed("Bob Roe", "bob@example.com", "bob-pass", BOB_ACCOUNT, "100"))
            .await
            .unwrap();

        let alice = state
            .auth_service
            .login(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "alice-pass".to_string(),
            })
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(JwtAuthMiddleware::new(jwt_secret, sessions))
                .service(
                    web::scope("/api")
                        .route("/me", web::get().to(me))
                        .route("/transactions", web::get().to(list_transactions))
                        .route("/transactions/initiate", web::post().to(initiate_transaction))
                        .route("/transactions/pending", web::get().to(pending_transaction))
                        .route("/transactions/confirm", web::post().to(confirm_transaction))
                        .route("/transactions/cancel", web::post().to(cancel_transaction)),
                ),
        )
        .await;

        (app, state, format!("Bearer {}", alice.access_token))
    }};
}

#[actix_web::test]
async fn test_deposit_is_confirmed_and_shows_first_in_history() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "type": "deposit", "amount": "100", "description": "Paycheck" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["pending"]["type"], "deposit");
    assert_eq!(body["pending"]["amount"], 10_000);
    assert_eq!(
        body["prompt"],
        "Enter your password to confirm the deposit of $100.00"
    );

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let settlement: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(settlement["balance"], 260_075);
    assert_eq!(settlement["balance_display"], "$2,600.75");
    assert_eq!(settlement["message"], "$100.00 has been deposited to your account.");
    assert_eq!(settlement["transactions"][0]["type"], "deposit");
    assert_eq!(settlement["transactions"][0]["amount_display"], "$100.00");

    let req = test::TestRequest::get()
        .uri("/api/transactions")
        .insert_header(("Authorization", auth.clone()))
        .to_request();
    let history: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["description"], "Paycheck");

    // Back to idle
    let req = test::TestRequest::get()
        .uri("/api/transactions/pending")
        .insert_header(("Authorization", auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_withdrawal_above_balance_is_rejected_before_confirmation() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "type": "withdrawal", "amount": "2500.76", "description": "Too much" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["details"]["message"],
        "You don't have enough balance for this transaction."
    );

    let req = test::TestRequest::get()
        .uri("/api/transactions/pending")
        .insert_header(("Authorization", auth))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_withdrawal_of_entire_balance_is_allowed() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "type": "withdrawal", "amount": "2,500.75", "description": "Close out" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    let settlement: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(settlement["balance"], 0);
    assert_eq!(
        settlement["message"],
        "$2,500.75 has been withdrawn from your account."
    );
}

#[actix_web::test]
async fn test_invalid_amounts_and_missing_description_are_rejected() {
    let (app, _state, auth) = setup_transaction_test!();

    for (amount, description) in [("0", "Zero"), ("-5", "Negative"), ("abc", "Garbage"), ("10", "  ")] {
        let req = test::TestRequest::post()
            .uri("/api/transactions/initiate")
            .insert_header(("Authorization", auth.clone()))
            .set_json(json!({ "type": "deposit", "amount": amount, "description": description }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "amount '{}' / description '{}' should be rejected",
            amount,
            description
        );
    }
}

#[actix_web::test]
async fn test_self_transfer_is_rejected() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({
            "type": "transfer",
            "amount": "10",
            "recipient_account": ALICE_ACCOUNT,
            "description": "To myself"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/transactions/pending")
        .insert_header(("Authorization", auth))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_transfer_recipient_must_be_valid_and_exist() {
    let (app, _state, auth) = setup_transaction_test!();

    let cases = [
        (json!(null), StatusCode::BAD_REQUEST),
        (json!("12345"), StatusCode::BAD_REQUEST),
        (json!("5555555555"), StatusCode::NOT_FOUND),
    ];
    for (recipient, expected) in cases {
        let req = test::TestRequest::post()
            .uri("/api/transactions/initiate")
            .insert_header(("Authorization", auth.clone()))
            .set_json(json!({
                "type": "transfer",
                "amount": "10",
                "recipient_account": recipient,
                "description": "Rent"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected, "recipient {}", recipient);
    }
}

#[actix_web::test]
async fn test_wrong_password_keeps_pending_and_writes_nothing() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "type": "withdrawal", "amount": "50", "description": "ATM" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "password": "not-my-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["details"]["message"],
        "Please enter the correct password to proceed."
    );

    let req = test::TestRequest::get()
        .uri("/api/transactions/pending")
        .insert_header(("Authorization", auth.clone()))
        .to_request();
    let pending: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(pending["type"], "withdrawal");
    assert_eq!(pending["description"], "ATM");

    let req = test::TestRequest::get()
        .uri("/api/transactions")
        .insert_header(("Authorization", auth.clone()))
        .to_request();
    let history: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(history.as_array().unwrap().is_empty());

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", auth.clone()))
        .to_request();
    let profile: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["balance"], 250_075);

    // A retry with the right password still settles
    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    let settlement: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(settlement["balance_display"], "$2,450.75");
}

#[actix_web::test]
async fn test_confirm_without_pending_is_a_conflict() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_cancel_discards_pending_transaction() {
    let (app, _state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "type": "deposit", "amount": "5", "description": "Coins" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

    let req = test::TestRequest::post()
        .uri("/api/transactions/cancel")
        .insert_header(("Authorization", auth.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_new_initiate_replaces_pending_transaction() {
    let (app, _state, auth) = setup_transaction_test!();

    for (amount, description) in [("5", "First"), ("7", "Second")] {
        let req = test::TestRequest::post()
            .uri("/api/transactions/initiate")
            .insert_header(("Authorization", auth.clone()))
            .set_json(json!({ "type": "deposit", "amount": amount, "description": description }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
    }

    let req = test::TestRequest::get()
        .uri("/api/transactions/pending")
        .insert_header(("Authorization", auth))
        .to_request();
    let pending: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(pending["description"], "Second");
    assert_eq!(pending["amount"], 700);
}

#[actix_web::test]
async fn test_transfer_credits_recipient_with_mirrored_deposit() {
    let (app, state, auth) = setup_transaction_test!();

    let req = test::TestRequest::post()
        .uri("/api/transactions/initiate")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({
            "type": "transfer",
            "amount": "250.50",
            "recipient_account": BOB_ACCOUNT,
            "description": "Rent"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["pending"]["recipient_name"], "Bob Roe");

    let req = test::TestRequest::post()
        .uri("/api/transactions/confirm")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "password": "alice-pass" }))
        .to_request();
    let settlement: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(settlement["balance_display"], "$2,250.25");
    assert_eq!(
        settlement["message"],
        "$250.50 has been transferred to account ****3210."
    );
    assert_eq!(settlement["transaction"]["type"], "transfer");
    assert_eq!(settlement["transaction"]["recipient_account_number"], BOB_ACCOUNT);

    let bob = state
        .auth_service
        .login(LoginRequest {
            email: "bob@example.com".to_string(),
            password: "bob-pass".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(bob.user.balance.to_string(), "$350.50");

    let req = test::TestRequest::get()
        .uri("/api/transactions")
        .insert_header(("Authorization", format!("Bearer {}", bob.access_token)))
        .to_request();
    let history: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["type"], "deposit");
    assert_eq!(history[0]["amount"], 25_050);
    assert_eq!(history[0]["description"], "Rent (from ****7890)");
}
