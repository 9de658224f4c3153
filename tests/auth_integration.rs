// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the certification client using wiremock.

use gridwatch::{AuthClient, AuthError, Credentials, Transport};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_credentials() -> Credentials {
    Credentials::User {
        username: "user@example.com".to_string(),
        password: "hunter2".to_string(),
        device_serial: "R331ZEB4ZEAL0528".to_string(),
    }
}

fn access_key_credentials() -> Credentials {
    Credentials::AccessKey {
        access_key: "AKIAEXAMPLE".to_string(),
        secret_key: "sekrit".to_string(),
        device_serial: "R331ZEB4ZEAL0528".to_string(),
    }
}

fn certification_data() -> serde_json::Value {
    json!({
        "url": "mqtt.example.com",
        "port": "8883",
        "protocol": "mqtts",
        "certificateAccount": "open-cert-account",
        "certificatePassword": "open-cert-password",
    })
}

mod login_strategy {
    use super::*;

    async fn mount_login(server: &MockServer) {
        // "hunter2" base64-encoded.
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_partial_json(json!({
                "email": "user@example.com",
                "password": "aHVudGVyMg==",
                "scene": "IOT_APP",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "data": {
                    "token": "bearer-token",
                    "user": {"userId": "1234567", "name": "Example"},
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_flow_yields_broker_info() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("GET"))
            .and(path("/iot-auth/app/certification"))
            .and(query_param("userId", "1234567"))
            .and(header("authorization", "Bearer bearer-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": "0", "data": certification_data()})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let info = client
            .certify(&user_credentials(), "prefix-1234")
            .await
            .unwrap();

        assert_eq!(info.host, "mqtt.example.com");
        assert_eq!(info.port, 8883);
        assert_eq!(info.transport, Transport::Mqtts);
        assert_eq!(info.username, "open-cert-account");
        assert_eq!(info.password, "open-cert-password");
        assert_eq!(info.topic_filter, "/app/device/property/R331ZEB4ZEAL0528");
        assert_eq!(info.client_id, "ANDROID_PREFIX-1234_1234567");
    }

    #[tokio::test]
    async fn login_rejection_is_an_envelope_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "1001",
                "message": "password error",
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let err = client
            .certify(&user_credentials(), "prefix")
            .await
            .unwrap_err();

        match err {
            AuthError::Envelope { code, message } => {
                assert_eq!(code, "1001");
                assert_eq!(message, "password error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_missing_field_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "data": {"user": {"userId": "1"}},
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let err = client
            .certify(&user_credentials(), "prefix")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingField("token")));
    }

    #[tokio::test]
    async fn insecure_protocol_fails_the_cycle() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        let mut data = certification_data();
        data["protocol"] = json!("mqtt");
        Mock::given(method("GET"))
            .and(path("/iot-auth/app/certification"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": "0", "data": data})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let err = client
            .certify(&user_credentials(), "prefix")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsecureProtocol(_)));
    }

    #[tokio::test]
    async fn http_failure_is_fatal_for_the_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let err = client
            .certify(&user_credentials(), "prefix")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Http(_)));
    }
}

mod signed_request_strategy {
    use super::*;

    #[tokio::test]
    async fn signed_request_yields_broker_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/iot-open/sign/certification"))
            .and(header("accessKey", "AKIAEXAMPLE"))
            .and(header_exists("nonce"))
            .and(header_exists("timestamp"))
            .and(header_exists("sign"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": "0", "data": certification_data()})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let info = client
            .certify(&access_key_credentials(), "prefix-abcd")
            .await
            .unwrap();

        assert_eq!(
            info.topic_filter,
            "/open/open-cert-account/R331ZEB4ZEAL0528/quota"
        );
        assert_eq!(info.client_id, "ANDROID_PREFIX-ABCD");
        assert_eq!(info.transport, Transport::Mqtts);
    }

    #[tokio::test]
    async fn missing_certificate_account_is_reported() {
        let server = MockServer::start().await;
        let mut data = certification_data();
        data.as_object_mut().unwrap().remove("certificateAccount");
        Mock::given(method("GET"))
            .and(path("/iot-open/sign/certification"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": "0", "data": data})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri()).unwrap();
        let err = client
            .certify(&access_key_credentials(), "prefix")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingField("certificateAccount")));
    }
}
