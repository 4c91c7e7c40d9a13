mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

async fn register_team(app: &TestApp, token: &str, hackathon_id: &str, body: Value) -> String {
    let (status, team) = app
        .post(
            &format!("/api/hackathons/{hackathon_id}/teams"),
            Some(token),
            body,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "register team failed: {team}");
    team["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_team_shows_team_full_and_rejects_joins() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let (joiner, _) = app.register("joiner@campus.edu", "student").await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Byte Me",
            "description": "Compilers all the way down",
            "teamSize": 2,
            "members": [
                { "name": "Bo", "role": "Designer", "skills": ["Figma"] },
                { "name": "", "role": "Ignored" }
            ]
        }),
    )
    .await;

    let (status, detail) = app.get(&format!("/api/teams/{team}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["members"].as_array().unwrap().len(), 2);
    assert_eq!(detail["members"][0]["role"], "Team Lead");
    assert_eq!(detail["isFull"], true);
    assert_eq!(detail["rolesNeeded"], 0);
    assert_eq!(detail["contactLabel"], "Team Full");
    assert!(detail["contactEmail"].is_null());
    assert_eq!(detail["hackathon"]["id"], hackathon);

    let (status, body) = app
        .post(&format!("/api/teams/{team}/join"), Some(&joiner), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Team is full");
}

#[tokio::test]
async fn open_team_offers_lead_contact() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    app.put(
        "/api/profile/student",
        &lead,
        json!({ "name": "Lena Lead", "skills": ["Rust"] }),
    )
    .await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({ "name": "Byte Me", "description": "Compilers", "teamSize": 3 }),
    )
    .await;

    let (_, detail) = app.get(&format!("/api/teams/{team}"), None).await;
    assert_eq!(detail["isFull"], false);
    assert_eq!(detail["rolesNeeded"], 2);
    assert_eq!(detail["contactLabel"], "Contact Team Lead");
    assert_eq!(detail["contactEmail"], "lead@campus.edu");
    assert_eq!(detail["members"][0]["name"], "Lena Lead");
    assert_eq!(detail["lead"]["name"], "Lena Lead");
    assert_eq!(detail["lookingFor"].as_array().unwrap().len(), 2);
    assert_eq!(detail["lookingFor"][0]["role"], "Any Role");

    let (_, hackathon_detail) = app.get(&format!("/api/hackathons/{hackathon}"), None).await;
    assert_eq!(hackathon_detail["teams"][0]["id"], team);
}

#[tokio::test]
async fn oversized_member_list_is_rejected() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;

    let (status, _) = app
        .post(
            &format!("/api/hackathons/{hackathon}/teams"),
            Some(&lead),
            json!({
                "name": "Crowd",
                "description": "Too many",
                "teamSize": 1,
                "members": [{ "name": "Bo", "role": "Designer" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/hackathons/missing/teams",
            Some(&lead),
            json!({ "name": "Ghost", "description": "No event" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_size_outside_bounds_is_rejected() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;

    for size in [json!(0), json!(51), json!(200_000), json!(i64::MAX)] {
        let (status, body) = app
            .post(
                &format!("/api/hackathons/{hackathon}/teams"),
                Some(&lead),
                json!({ "name": "Huge", "description": "Everyone", "teamSize": size }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "size {size} accepted");
        assert_eq!(body["error"], "Team size must be between 1 and 50");
    }

    register_team(
        &app,
        &lead,
        &hackathon,
        json!({ "name": "Max", "description": "Just fits", "teamSize": 50 }),
    )
    .await;
}

#[tokio::test]
async fn explicit_openings_stop_at_open_spots() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;

    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Duo",
            "description": "Two seats",
            "teamSize": 2,
            "lookingFor": [
                { "role": "Designer" },
                { "role": "Backend" },
                { "role": "Frontend" },
                { "role": "ML" },
                { "role": "PM" }
            ]
        }),
    )
    .await;

    let (_, detail) = app.get(&format!("/api/teams/{team}"), None).await;
    let openings = detail["lookingFor"].as_array().unwrap();
    assert_eq!(openings.len(), 1);
    assert_eq!(openings[0]["role"], "Designer");
    assert_eq!(detail["rolesNeeded"], 1);
}

#[tokio::test]
async fn joins_stop_at_team_size() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let (bo, bo_id) = app.register("bo@campus.edu", "student").await;
    let (cy, _) = app.register("cy@campus.edu", "student").await;
    let (di, _) = app.register("di@campus.edu", "student").await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Byte Me",
            "description": "Compilers",
            "teamSize": 3,
            "lookingFor": [{ "role": "Designer", "skills": ["Figma"] }]
        }),
    )
    .await;
    let join = format!("/api/teams/{team}/join");

    let (status, joined) = app
        .post(&join, Some(&bo), json!({ "role": "Designer" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["members"].as_array().unwrap().len(), 2);
    assert!(joined["memberIds"]
        .as_array()
        .unwrap()
        .iter()
        .any(|id| id == &json!(bo_id)));
    assert!(joined["lookingFor"].as_array().unwrap().is_empty());

    let (status, body) = app.post(&join, Some(&bo), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "You are already on this team");

    let (status, _) = app.post(&join, Some(&cy), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post(&join, Some(&di), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Team is full");

    let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
        .bind(&team)
        .fetch_one(&app.db.pool)
        .await
        .unwrap();
    assert_eq!(members, 3);

    let (status, detail) = app.get(&format!("/api/teams/{team}"), Some(&bo)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["isMember"], true);
    assert_eq!(detail["contactLabel"], "Team Full");
}

#[tokio::test]
async fn members_can_leave_but_the_lead_cannot() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let (bo, _) = app.register("bo@campus.edu", "student").await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({ "name": "Byte Me", "description": "Compilers", "teamSize": 2 }),
    )
    .await;

    app.post(&format!("/api/teams/{team}/join"), Some(&bo), json!({ "role": "Backend" }))
        .await;

    let leave = format!("/api/teams/{team}/members/me");
    let (status, _) = app.delete(&leave, &lead).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, after) = app.delete(&leave, &bo).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["members"].as_array().unwrap().len(), 1);
    assert_eq!(after["lookingFor"][0]["role"], "Backend");

    let (status, _) = app.delete(&leave, &bo).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_listing_filters_by_role_and_deletes_with_hackathon() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let (other, _) = app.register("other@campus.edu", "student").await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let design = register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Pixel Pushers",
            "description": "UI heavy",
            "teamSize": 3,
            "lookingFor": [{ "role": "Designer" }]
        }),
    )
    .await;
    register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Kernel Panic",
            "description": "Low level",
            "teamSize": 3,
            "lookingFor": [{ "role": "Backend" }]
        }),
    )
    .await;

    let (_, roles) = app.get("/api/teams/roles", None).await;
    assert_eq!(roles["roles"], json!(["All", "Backend", "Designer"]));

    let (_, body) = app.get("/api/teams?role=Designer", None).await;
    let teams = body["teams"].as_array().unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0]["id"], design);

    let (status, _) = app.delete(&format!("/api/teams/{design}"), &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/hackathons/{hackathon}"), &lead)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/teams", None).await;
    assert!(body["teams"].as_array().unwrap().is_empty());
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members")
        .fetch_one(&app.db.pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn leaving_reopens_only_the_leavers_role() {
    let app = TestApp::new().await;
    let (lead, _) = app.register("lead@campus.edu", "student").await;
    let (bo, _) = app.register("bo@campus.edu", "student").await;
    let (cy, _) = app.register("cy@campus.edu", "student").await;

    let hackathon = app.create_hackathon(&lead, "Remote Rumble", "Online").await;
    let team = register_team(
        &app,
        &lead,
        &hackathon,
        json!({
            "name": "Trio",
            "description": "Three seats",
            "teamSize": 3,
            "lookingFor": [{ "role": "Designer" }, { "role": "Backend" }]
        }),
    )
    .await;

    let join = format!("/api/teams/{team}/join");
    let (status, _) = app
        .post(&join, Some(&bo), json!({ "role": "Designer", "skills": ["Figma"] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, after_joins) = app
        .post(&join, Some(&cy), json!({ "role": "Backend" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(after_joins["lookingFor"].as_array().unwrap().is_empty());

    let (status, after) = app
        .delete(&format!("/api/teams/{team}/members/me"), &bo)
        .await;
    assert_eq!(status, StatusCode::OK);
    let openings = after["lookingFor"].as_array().unwrap();
    assert_eq!(openings.len(), 1);
    assert_eq!(openings[0]["role"], "Designer");
    assert_eq!(openings[0]["skills"], json!(["Figma"]));
    assert_eq!(after["members"].as_array().unwrap().len(), 2);
}
