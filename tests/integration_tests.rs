use snsapi::{ApiClient, Config, Params, SnsError, Time};

/// Client for the live provider, authenticated with SNS_ACCESS_TOKEN
fn live_client() -> ApiClient {
    let config = Config::from_env().expect("SNS_APP_KEY and SNS_APP_SECRET must be set");
    let client = ApiClient::new(config).expect("failed to build client");
    let token = std::env::var("SNS_ACCESS_TOKEN").expect("SNS_ACCESS_TOKEN must be set");
    client.set_access_token(&token, Time::now().plus_seconds(3600));
    client
}

#[test]
#[ignore] // Run with: cargo test --test integration_tests -- --ignored
fn test_get_uid() {
    let client = live_client();

    let result = client
        .api("account")
        .at("get_uid")
        .get(Params::new())
        .expect("failed to call account/get_uid");

    assert!(result.get_str("uid").is_some(), "expected uid, got {:?}", result);
    println!("get_uid test passed: {:?}", result.get_str("uid"));
}

#[test]
#[ignore]
fn test_home_timeline() {
    let client = live_client();

    let result = client
        .get("statuses/home_timeline", Params::new().set("count", 2))
        .expect("failed to call statuses/home_timeline");

    assert!(result.get("statuses").is_some(), "expected statuses, got {:?}", result);
}

#[test]
#[ignore]
fn test_remind_host() {
    let client = live_client();

    let result = client.get("remind/unread_count", Params::new());
    match result {
        Ok(counts) => println!("unread counts: {:?}", counts),
        // Unapproved apps are refused the remind API; the refusal must still be structured.
        Err(SnsError::Api { code, message, .. }) => println!("remind refused: {} {}", code, message),
        Err(other) => panic!("expected result or SnsError::Api, got {:?}", other),
    }
}

#[test]
#[ignore]
fn test_invalid_token() {
    let config = Config::from_env().expect("SNS_APP_KEY and SNS_APP_SECRET must be set");
    let client = ApiClient::new(config).expect("failed to build client");
    client.set_access_token("not-a-token", Time::now().plus_seconds(3600));

    let result = client.get("account/get_uid", Params::new());

    match result.unwrap_err() {
        SnsError::Api { code, .. } => println!("invalid token rejected with {}", code),
        other => panic!("expected SnsError::Api, got {:?}", other),
    }
}

#[test]
#[ignore]
fn test_authorize_url() {
    let config = Config::from_env().expect("SNS_APP_KEY and SNS_APP_SECRET must be set");
    let client = ApiClient::new(config.clone()).expect("failed to build client");

    let url = client
        .get_authorize_url(Some("https://api.weibo.com/oauth2/default.html"), &Params::new())
        .expect("failed to build authorize URL");

    assert!(url.starts_with(&config.provider.authorize_url));
    assert!(url.contains(&format!("client_id={}", config.app_key)));
}
