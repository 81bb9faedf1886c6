use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use casahub_api::app::{build_app, services::AppServices};
use casahub_auth::{Hs256Jwt, JwtClaims, Role};
use casahub_core::UserId;
use casahub_infra::{NewUser, Stores, seed::seed};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";
const ADMIN_EMAIL: &str = "admin@casahub.local";
const ADMIN_PASSWORD: &str = "admin123";

struct TestServer {
    base_url: String,
    stores: Stores,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let stores = Stores::in_memory();
        seed(&stores, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("seeding failed");
        let services = Arc::new(AppServices::new(
            stores.clone(),
            Arc::new(Hs256Jwt::new(JWT_SECRET)),
            ChronoDuration::minutes(30),
        ));
        let app = build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            stores,
            handle,
        }
    }

    /// Create an account holding `roles` straight in the store and mint a
    /// token for it.
    async fn token_for(&self, roles: Vec<Role>) -> (UserId, String) {
        let mut role_ids = Vec::new();
        for role in &roles {
            let record = self.stores.roles.find_role_by_name(role).await.unwrap().unwrap();
            role_ids.push(record.id);
        }
        let id = UserId::new();
        self.stores
            .users
            .insert_user(NewUser {
                id,
                name: "Member".into(),
                email: format!("member-{id}@casahub.local"),
                password_hash: "not-a-login-account".into(),
                phone: None,
                image: None,
                created_at: Utc::now(),
                role_ids,
            })
            .await
            .unwrap();
        (id, mint_jwt(id, roles))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims::for_user(
        sub,
        "member@casahub.local",
        "Member",
        roles,
        now,
        ChronoDuration::minutes(10),
    );

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn first_location(client: &reqwest::Client, srv: &TestServer, token: &str) -> String {
    let meta: Value = client
        .get(srv.url("/kitchen/metadata"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    meta["locations"][0]["id"].as_str().unwrap().to_string()
}

async fn role_id(client: &reqwest::Client, srv: &TestServer, token: &str, name: &str) -> String {
    let roles: Value = client
        .get(srv.url("/admin/roles"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == name)
        .map(|r| r["id"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = client
        .get(srv.url("/kitchen/products"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_whoami() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let session: Value = res.json().await.unwrap();
    let token = session["token"].as_str().unwrap();
    assert_eq!(session["user"]["roles"], json!(["ADMIN"]));

    let me: Value = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert_eq!(me["name"], "Admin CasaHub");
    assert_eq!(me["roles"], json!(["ADMIN"]));
}

#[tokio::test]
async fn wrong_password_gets_a_generic_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for body in [
        json!({"email": ADMIN_EMAIL, "password": "wrong-one"}),
        json!({"email": "ghost@casahub.local", "password": ADMIN_PASSWORD}),
    ] {
        let res = client.post(srv.url("/auth/login")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_credentials");
        assert_eq!(body["message"], "invalid credentials");
    }
}

#[tokio::test]
async fn product_lifecycle_and_alerts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;
    let location = first_location(&client, &srv, &token).await;

    let res = client
        .post(srv.url("/kitchen/products"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Leche",
            "quantity": 1.0,
            "unit": "l",
            "location_id": location,
            "min_stock": 2.0,
            "expiry_date": (Utc::now() + ChronoDuration::days(1)).to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let product: Value = res.json().await.unwrap();
    let id = product["id"].as_str().unwrap().to_string();

    let list: Value = client
        .get(srv.url("/kitchen/products?search=LEC"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["location"]["id"], location.as_str());

    let alerts: Value = client
        .get(srv.url("/kitchen/alerts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alerts["expiring_soon"][0]["id"], id.as_str());
    assert_eq!(alerts["low_stock"][0]["id"], id.as_str());
    assert!(alerts["opened_long_ago"].as_array().unwrap().is_empty());

    let res = client
        .post(srv.url(&format!("/kitchen/products/{id}/open")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let opened: Value = res.json().await.unwrap();
    assert!(opened["opened_at"].is_string());

    let res = client
        .delete(srv.url(&format!("/kitchen/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .delete(srv.url(&format!("/kitchen/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;
    let location = first_location(&client, &srv, &token).await;

    let res = client
        .post(srv.url("/kitchen/products"))
        .bearer_auth(&token)
        .json(&json!({"name": "  ", "quantity": 1.0, "unit": "ud", "location_id": location}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .get(srv.url("/recipes/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn recipe_availability_is_yellow_when_half_is_in_stock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;
    let location = first_location(&client, &srv, &token).await;

    let mut ids = Vec::new();
    for (name, qty) in [("Huevos", 6.0), ("Patatas", 0.5)] {
        let product: Value = client
            .post(srv.url("/kitchen/products"))
            .bearer_auth(&token)
            .json(&json!({"name": name, "quantity": qty, "unit": "ud", "location_id": location}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(product["id"].as_str().unwrap().to_string());
    }

    let res = client
        .post(srv.url("/recipes"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Tortilla de patatas",
            "servings": 4,
            "ingredients": [
                {"name": "Huevos", "quantity": 4.0, "unit": "ud", "product_id": ids[0]},
                {"name": "Patatas", "quantity": 2.0, "unit": "ud", "product_id": ids[1]},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let recipe: Value = res.json().await.unwrap();
    let recipe_id = recipe["id"].as_str().unwrap().to_string();

    let availability: Value = client
        .get(srv.url(&format!("/recipes/{recipe_id}/availability")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(availability["status"], "yellow");
    assert_eq!(availability["ingredients"][0]["status"], "available");
    assert_eq!(availability["ingredients"][1]["status"], "insufficient");
    assert_eq!(availability["ingredients"][1]["missing"], 1.5);

    let res = client
        .put(srv.url(&format!("/recipes/{recipe_id}")))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Tortilla francesa",
            "ingredients": [
                {"name": "Huevos", "quantity": 2.0, "unit": "ud", "product_id": ids[0]},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let availability: Value = client
        .get(srv.url(&format!("/recipes/{recipe_id}/availability")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(availability["status"], "green");

    let res = client
        .delete(srv.url(&format!("/recipes/{recipe_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/recipes/{recipe_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_reject_plain_users() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;

    for path in ["/admin/users", "/admin/roles"] {
        let res = client.get(srv.url(path)).bearer_auth(&token).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn user_administration() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, admin) = srv.token_for(vec![Role::ADMIN]).await;
    let user_role = role_id(&client, &srv, &admin, "USER").await;

    let body = json!({
        "name": "Ana",
        "email": "ana@casahub.local",
        "password": "secret1",
        "phone": "",
        "image": "",
        "role_ids": [user_role],
    });
    let res = client
        .post(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert!(created.get("password_hash").is_none());
    assert!(created["phone"].is_null());
    assert_eq!(created["roles"][0]["name"], "USER");

    let res = client
        .post(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["message"], "email already in use");

    // The new account can log in with its own password.
    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({"email": "ana@casahub.local", "password": "secret1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let users: Value = client
        .get(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users[0]["email"], "ana@casahub.local");
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn role_administration_protects_roles_in_use() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, admin) = srv.token_for(vec![Role::ADMIN]).await;

    let admin_role = role_id(&client, &srv, &admin, "ADMIN").await;
    let res = client
        .delete(srv.url(&format!("/admin/roles/{admin_role}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/admin/roles"))
        .bearer_auth(&admin)
        .json(&json!({"name": "cocinero", "description": "Plans the menu"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let role: Value = res.json().await.unwrap();
    assert_eq!(role["name"], "COCINERO");
    let cook = role["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/admin/roles"))
        .bearer_auth(&admin)
        .json(&json!({"name": "Cocinero"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Chef",
            "email": "chef@casahub.local",
            "password": "secret1",
            "role_ids": [cook],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .delete(srv.url(&format!("/admin/roles/{cook}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let err: Value = res.json().await.unwrap();
    assert!(err["message"].as_str().unwrap().contains("1 users"));
}

#[tokio::test]
async fn undecodable_bodies_and_queries_get_the_json_error_shape() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;
    let location = first_location(&client, &srv, &token).await;

    let res = client
        .post(srv.url("/kitchen/products"))
        .bearer_auth(&token)
        .json(&json!({"name": "Leche", "quantity": -1.0, "unit": "l", "location_id": location}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("negative"));

    let res = client
        .post(srv.url("/recipes"))
        .bearer_auth(&token)
        .json(&json!({"name": "Tortilla", "servings": -2}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .get(srv.url("/kitchen/products?location_id=nope"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(srv.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn editing_an_opened_product_keeps_its_alert() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, token) = srv.token_for(vec![Role::USER]).await;
    let location = first_location(&client, &srv, &token).await;
    let opened_at = (Utc::now() - ChronoDuration::days(10)).to_rfc3339();

    let product: Value = client
        .post(srv.url("/kitchen/products"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Tomate frito",
            "quantity": 1.0,
            "unit": "bote",
            "location_id": location,
            "opened_at": opened_at,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = product["id"].as_str().unwrap().to_string();

    let res = client
        .put(srv.url(&format!("/kitchen/products/{id}")))
        .bearer_auth(&token)
        .json(&json!({"name": "Tomate frito", "quantity": 0.5, "unit": "bote", "location_id": location}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["quantity"], 0.5);
    assert_eq!(updated["opened_at"], product["opened_at"]);

    let alerts: Value = client
        .get(srv.url("/kitchen/alerts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alerts["opened_long_ago"][0]["id"], id.as_str());
}

#[tokio::test]
async fn revoked_admin_rights_apply_to_live_tokens() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, admin) = srv.token_for(vec![Role::ADMIN]).await;
    let (boss_id, boss) = srv.token_for(vec![Role::ADMIN]).await;
    let user_role = role_id(&client, &srv, &admin, "USER").await;

    let res = client.get(srv.url("/admin/users")).bearer_auth(&boss).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(srv.url(&format!("/admin/users/{boss_id}")))
        .bearer_auth(&admin)
        .json(&json!({"role_ids": [user_role]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/admin/users")).bearer_auth(&boss).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let me: Value = client
        .get(srv.url("/whoami"))
        .bearer_auth(&boss)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["roles"], json!(["USER"]));

    let res = client
        .delete(srv.url(&format!("/admin/users/{boss_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(srv.url("/whoami")).bearer_auth(&boss).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
