mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

fn startup_body(name: &str, industry: &str, years: i64) -> Value {
    json!({
        "name": name,
        "tagline": "Textbooks, shared",
        "industry": industry,
        "yearsInIndustry": years,
        "problem": "Books are expensive",
        "vision": "Every course, affordable",
        "contactEmail": "founders@example.com",
        "founders": [{ "name": "Grace", "role": "CEO" }]
    })
}

#[tokio::test]
async fn saving_a_profile_twice_keeps_one_row() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("ada@campus.edu", "student").await;

    let (status, _) = app
        .put(
            "/api/profile/student",
            &token,
            json!({ "name": "Ada", "tagline": "Systems", "skills": ["Rust", " Rust ", "SQL"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, profile) = app
        .put(
            "/api/profile/student",
            &token,
            json!({ "name": "Ada Lovelace", "socials": { "githubUrl": "github.com/ada" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Ada Lovelace");
    assert_eq!(profile["tagline"], "Systems");
    assert_eq!(profile["skills"], json!(["Rust", "SQL"]));
    assert_eq!(profile["socials"]["githubUrl"], "https://github.com/ada");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_profiles WHERE user_id = ?")
        .bind(&user_id)
        .fetch_one(&app.db.pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let (status, body) = app.get("/api/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "student");
    assert_eq!(body["profile"]["name"], "Ada Lovelace");
}

#[tokio::test]
async fn client_accounts_cannot_write_student_profiles() {
    let app = TestApp::new().await;
    let (token, _) = app.register("acme@corp.com", "client").await;

    let (status, _) = app
        .put("/api/profile/student", &token, json!({ "name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = app
        .put(
            "/api/profile/client",
            &token,
            json!({ "companyName": "Acme", "contactName": "Wile" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["companyName"], "Acme");
}

#[tokio::test]
async fn freelancing_toggle_controls_listing() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("ada@campus.edu", "student").await;

    app.put(
        "/api/profile/student",
        &token,
        json!({ "name": "Ada", "skills": ["Rust"], "isFreelancing": true }),
    )
    .await;

    let (status, body) = app.get("/api/freelancers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["freelancers"]), vec![user_id.clone()]);

    let (_, body) = app.get("/api/freelancers?q=rust", None).await;
    assert_eq!(body["freelancers"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/freelancers?availability=Busy", None).await;
    assert!(body["freelancers"].as_array().unwrap().is_empty());

    let (status, _) = app.get(&format!("/api/freelancers/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    app.put(
        "/api/profile/student",
        &token,
        json!({ "isFreelancing": false }),
    )
    .await;

    let (_, body) = app.get("/api/freelancers", None).await;
    assert!(body["freelancers"].as_array().unwrap().is_empty());

    let (status, _) = app.get(&format!("/api/freelancers/{user_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn startup_writes_are_owner_only() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("grace@campus.edu", "student").await;
    let (other, _) = app.register("mallory@campus.edu", "student").await;

    let (status, startup) = app
        .post("/api/startups", Some(&owner), startup_body("BookSwap", "EdTech", 2))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(startup["location"], "Not specified");
    assert_eq!(startup["fundingStage"], "Pre-Seed");
    assert_eq!(startup["status"], "Accepting Partnerships");
    let id = startup["id"].as_str().unwrap().to_string();
    let uri = format!("/api/startups/{id}");

    let (_, detail) = app.get(&uri, Some(&other)).await;
    assert_eq!(detail["isOwner"], false);
    let (_, detail) = app.get(&uri, Some(&owner)).await;
    assert_eq!(detail["isOwner"], true);
    let (_, detail) = app.get(&uri, None).await;
    assert_eq!(detail["isOwner"], false);

    let (status, _) = app.delete(&uri, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .put(&uri, &other, json!({ "tagline": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .put(&uri, &owner, json!({ "status": "Hiring" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "Hiring");
    assert_eq!(updated["tagline"], "Textbooks, shared");

    let (status, _) = app.delete(&uri, &owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn startup_filters_and_industries() {
    let app = TestApp::new().await;
    let (token, _) = app.register("grace@campus.edu", "student").await;

    app.post("/api/startups", Some(&token), startup_body("BookSwap", "EdTech", 2))
        .await;
    app.post("/api/startups", Some(&token), startup_body("GreenGrid", "Energy", 6))
        .await;

    let (status, missing) = app
        .post(
            "/api/startups",
            Some(&token),
            json!({ "name": "", "tagline": "x", "industry": "x", "problem": "x",
                    "vision": "x", "contactEmail": "a@b.co" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(missing["error"], "Please fill out the \"name\" field.");

    let (_, body) = app.get("/api/startups/industries", None).await;
    assert_eq!(body["industries"], json!(["All", "EdTech", "Energy"]));

    let (_, body) = app.get("/api/startups?industry=Energy", None).await;
    assert_eq!(body["startups"][0]["name"], "GreenGrid");
    assert_eq!(body["startups"].as_array().unwrap().len(), 1);

    let (_, body) = app.get("/api/startups?max_years=3", None).await;
    assert_eq!(body["startups"].as_array().unwrap().len(), 1);
    assert_eq!(body["startups"][0]["name"], "BookSwap");

    let (_, body) = app.get("/api/startups?industry=All", None).await;
    assert_eq!(body["startups"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn hackathon_mode_filter() {
    let app = TestApp::new().await;
    let (token, _) = app.register("org@campus.edu", "student").await;

    let online = app.create_hackathon(&token, "Remote Rumble", "Online").await;
    app.create_hackathon(&token, "Campus Clash", "Offline").await;

    let (status, body) = app.get("/api/hackathons?mode=Online", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["hackathons"]), vec![online]);

    let (_, body) = app.get("/api/hackathons?mode=All", None).await;
    assert_eq!(body["hackathons"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/hackathons?q=clash", None).await;
    assert_eq!(body["hackathons"][0]["title"], "Campus Clash");
}

#[tokio::test]
async fn hackathon_delete_is_owner_only() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("org@campus.edu", "student").await;
    let (other, _) = app.register("mallory@campus.edu", "student").await;

    let id = app.create_hackathon(&owner, "Remote Rumble", "Online").await;
    let uri = format!("/api/hackathons/{id}");

    let (status, _) = app.delete(&uri, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, detail) = app.get(&uri, Some(&other)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["isOwner"], false);
    assert!(detail["teams"].as_array().unwrap().is_empty());

    let (status, _) = app.delete(&uri, &owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn matching_validates_then_returns_model_output() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/match",
            None,
            json!({ "studentProfile": "short", "availableOpportunities": "tiny" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["issues"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .post(
            "/api/match",
            None,
            json!({
                "studentProfile": "Second-year student who writes Rust and SQL",
                "availableOpportunities": "Team Ferris needs a backend developer"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendedOpportunities"], "Team Ferris");
    assert_eq!(body["reasoning"], "Strong Rust background");
}
