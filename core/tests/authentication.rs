//! Basic and Digest authentication against the live mock server.

mod common;

use std::sync::mpsc;

use common::{wait, Server};
use courier_core::auth::basic_authorization;
use courier_core::{
    AuthDisposition, AuthScheme, Authenticator, Credential, DataResponse, Persistence, ProtectionSpace, Session,
};
use mock_server::Authenticated;

fn fetch(request: courier_core::DataRequest) -> DataResponse {
    let (tx, rx) = mpsc::channel();
    let _request = request.response(move |r| tx.send(r).unwrap());
    wait(&rx)
}

fn authenticated(response: &DataResponse) -> Authenticated {
    serde_json::from_slice(response.data().expect("response body")).unwrap()
}

#[test]
fn basic_auth_with_valid_credentials() {
    let server = Server::start();
    let response = fetch(
        Session::new()
            .request(server.endpoint("/basic-auth/user/password"))
            .authenticate("user", "password"),
    );

    assert!(response.request.is_some());
    assert_eq!(response.status(), Some(200));
    assert!(response.error().is_none());
    assert!(authenticated(&response).authenticated);
}

#[test]
fn basic_auth_with_invalid_credentials() {
    let server = Server::start();
    let response = fetch(
        Session::new()
            .request(server.endpoint("/basic-auth/user/password"))
            .authenticate("invalid", "credentials"),
    );

    assert!(response.request.is_some());
    assert_eq!(response.status(), Some(401));
    assert_eq!(response.result, Ok(None));
}

#[test]
fn basic_auth_without_credentials() {
    let server = Server::start();
    let response = fetch(Session::new().request(server.endpoint("/basic-auth/user/password")));

    assert_eq!(response.status(), Some(401));
    assert!(response.data().is_none());
    assert!(response.error().is_none());
}

#[test]
fn basic_auth_with_stored_credentials() {
    let server = Server::start();
    let session = Session::new();
    let endpoint = server.endpoint("/basic-auth/user/password");
    session.credential_store().store(
        Credential::new("user", "password", Persistence::ForSession),
        ProtectionSpace {
            host: endpoint.host().unwrap().to_string(),
            port: endpoint.port().unwrap(),
            protocol: "http".to_string(),
            realm: Some(mock_server::BASIC_REALM.to_string()),
            scheme: AuthScheme::Basic,
            proxy: false,
        },
    );

    let response = fetch(session.request(endpoint));
    assert_eq!(response.status(), Some(200));
    assert_eq!(authenticated(&response).user, "user");
}

#[test]
fn hidden_basic_auth_with_preemptive_header() {
    let server = Server::start();
    let endpoint = server
        .endpoint("/hidden-basic-auth/user/password")
        .header("Authorization", &basic_authorization("user", "password"));
    let response = fetch(Session::new().request(endpoint));

    assert_eq!(response.status(), Some(200));
    assert!(authenticated(&response).authenticated);
}

#[test]
fn digest_auth_with_valid_credentials() {
    let server = Server::start();
    let response = fetch(
        Session::new()
            .request(server.endpoint("/digest-auth/auth/user/password"))
            .authenticate("user", "password"),
    );

    assert_eq!(response.status(), Some(200));
    assert!(response.error().is_none());
    assert!(authenticated(&response).authenticated);
}

#[test]
fn digest_auth_with_invalid_credentials() {
    let server = Server::start();
    let response = fetch(
        Session::new()
            .request(server.endpoint("/digest-auth/auth/user/password"))
            .authenticate("user", "wrong"),
    );

    assert_eq!(response.status(), Some(401));
    assert_eq!(response.result, Ok(None));
}

#[test]
fn session_authenticator_can_decline() {
    let server = Server::start();
    let session = Session::builder()
        .authenticator(Authenticator::DoNotAuthenticate)
        .build();
    let response = fetch(
        session
            .request(server.endpoint("/basic-auth/user/password"))
            .authenticate("user", "password"),
    );

    assert_eq!(response.status(), Some(401));
}

#[test]
fn request_authenticator_overrides_session_authenticator() {
    let server = Server::start();
    let session = Session::builder()
        .authenticator(Authenticator::DoNotAuthenticate)
        .build();
    let authenticator = Authenticator::custom(|challenge, _| {
        assert_eq!(challenge.realm.as_deref(), Some(mock_server::BASIC_REALM));
        AuthDisposition::UseCredential(Credential::new("user", "password", Persistence::None))
    });
    let response = fetch(
        session
            .request(server.endpoint("/basic-auth/user/password"))
            .authenticator(authenticator),
    );

    assert_eq!(response.status(), Some(200));
}
