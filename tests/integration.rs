use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use nectar_server::{
    keys::ServerKeys,
    nectar::{router, AppState},
    session::{now_ms, sweeper::ExpirySweeper, SessionTable},
    token::{sign_es384, verify_es384, SessionClaims, TOKEN_TTL_MS},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestServer {
    app: Router,
    state: Arc<AppState>,
    _fts_dir: tempfile::TempDir,
}

fn test_server() -> Result<TestServer> {
    let fts_dir = tempfile::tempdir()?;
    std::fs::create_dir_all(fts_dir.path().join("public"))?;
    std::fs::write(fts_dir.path().join("public/motd.txt"), b"welcome")?;

    let state = Arc::new(AppState {
        keys: ServerKeys::generate(),
        sessions: Arc::new(SessionTable::new()),
        fts_root: fts_dir.path().to_path_buf(),
        info: nectar_server::nectar::handlers::info::ServerInfo::collect(false),
    });

    Ok(TestServer {
        app: router(state.clone()),
        state,
        _fts_dir: fts_dir,
    })
}

// Just enough escaping for JSON payloads in query strings.
fn urlencode(raw: &str) -> String {
    raw.replace('{', "%7B")
        .replace('}', "%7D")
        .replace('"', "%22")
        .replace(' ', "%20")
}

async fn get(app: &Router, uri: &str) -> Result<(StatusCode, String)> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

async fn issue_token(server: &TestServer, uuid: &str) -> Result<String> {
    let (status, body) = get(
        &server.app,
        &format!("/nectar/api/1/2/auth/tokenRequest?uuid={uuid}&info=test-client"),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::OK, "token request failed: {body}");
    Ok(body)
}

#[tokio::test]
async fn issue_ping_revoke_flow() -> Result<()> {
    let server = test_server()?;
    let token = issue_token(&server, "u1").await?;

    // Ping with a security counter: acknowledged and stored.
    let data = urlencode(r#"{"securityUpdates": 5}"#);
    let (status, _) = get(
        &server.app,
        &format!("/nectar/api/1/2/client/ping?token={token}&data={data}"),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        server.state.sessions.get("u1").and_then(|s| s.security_updates),
        Some(5)
    );

    // Sleep state revokes the session.
    let (status, _) = get(
        &server.app,
        &format!("/nectar/api/1/2/client/switchState?token={token}&state=1"),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(server.state.sessions.get("u1").is_none());

    // Same token afterwards: forbidden, not a signature problem.
    let (status, body) = get(
        &server.app,
        &format!("/nectar/api/1/2/client/ping?token={token}&data=%7B%7D"),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Token Expired!");
    Ok(())
}

#[tokio::test]
async fn swept_session_yields_forbidden_not_bad_request() -> Result<()> {
    let server = test_server()?;

    // Register a session that expires almost immediately and sign a token
    // matching its claims.
    let session = server.state.sessions.insert_if_absent("u2", 20, now_ms())?;
    let claims = SessionClaims {
        uuid: "u2".to_string(),
        issued_at: session.issued_at,
        ttl_ms: session.ttl_ms,
    };
    let token = sign_es384(server.state.keys.signing(), &claims)?;

    let sweeper = ExpirySweeper::spawn(server.state.sessions.clone(), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    sweeper.shutdown().await;

    assert!(server.state.sessions.get("u2").is_none());

    // The token itself still verifies; only the session is gone.
    assert!(verify_es384(&token, server.state.keys.verifying()).is_ok());

    let (status, body) = get(
        &server.app,
        &format!("/nectar/api/1/2/client/ping?token={token}&data=%7B%7D"),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Token Expired!");

    // The identity is free again after the sweep.
    let token = issue_token(&server, "u2").await?;
    assert!(verify_es384(&token, server.state.keys.verifying()).is_ok());
    Ok(())
}

#[tokio::test]
async fn token_request_validates_inputs() -> Result<()> {
    let server = test_server()?;

    let (status, body) = get(&server.app, "/nectar/api/1/2/auth/tokenRequest?uuid=u3").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing query items: uuid, info");

    issue_token(&server, "u3").await?;
    let (status, body) = get(
        &server.app,
        "/nectar/api/1/2/auth/tokenRequest?uuid=u3&info=again",
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "A token has already been issued to this UUID!");
    Ok(())
}

#[tokio::test]
async fn issued_token_claims_match_session() -> Result<()> {
    let server = test_server()?;
    let token = issue_token(&server, "u4").await?;

    let claims = verify_es384(&token, server.state.keys.verifying())?;
    assert_eq!(claims.uuid, "u4");
    assert_eq!(claims.ttl_ms, TOKEN_TTL_MS);

    let session = server.state.sessions.get("u4").expect("session registered");
    assert_eq!(session.issued_at, claims.issued_at);
    assert!(session.online);
    assert!(!session.authenticated);
    Ok(())
}

#[tokio::test]
async fn forged_token_is_bad_request() -> Result<()> {
    let server = test_server()?;
    let (status, body) = get(
        &server.app,
        "/nectar/api/1/2/client/switchState?token=forged&state=0",
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Failed to verify token.");
    Ok(())
}

#[tokio::test]
async fn download_serves_public_files_only() -> Result<()> {
    let server = test_server()?;
    let token = issue_token(&server, "u5").await?;

    let (status, body) = get(
        &server.app,
        &format!("/nectar/api/1/2/fts/download?token={token}&path=/public/motd.txt"),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "welcome");

    let (status, _) = get(
        &server.app,
        &format!("/nectar/api/1/2/fts/download?token={token}&path=/public/absent.txt"),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(
        &server.app,
        &format!("/nectar/api/1/2/fts/download?token={token}&path=/users/u5/file"),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, "User based FTS and authentication is not implemented.");
    Ok(())
}

#[tokio::test]
async fn info_and_health_are_open() -> Result<()> {
    let server = test_server()?;

    let (status, body) = get(&server.app, "/nectar/api/1/2/infoRequest").await?;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(value["software"], "Nectar-Server");
    assert_eq!(value["apiMajor"], "1");
    assert_eq!(value["apiMinor"], "2");
    assert!(value.get("system").is_none());

    let (status, body) = get(&server.app, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(value["name"], "nectar-server");
    Ok(())
}
