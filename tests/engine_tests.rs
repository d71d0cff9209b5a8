//! End-to-end tests: configuration file -> engine -> dispatch -> verification.

use std::path::PathBuf;
use tokio_test::{assert_err, assert_ok};
use ws_mock_server::xml::Element;
use ws_mock_server::{InboundRequest, MockEngine, MockError, MockResponse, ResponseBody};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn engine() -> MockEngine {
    MockEngine::from_file(&fixture("mock.yaml")).unwrap()
}

fn soap(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Header/>
  <soapenv:Body>{}</soapenv:Body>
</soapenv:Envelope>"#,
        body
    )
}

#[test]
fn test_load_fixture_configuration() {
    let engine = engine();
    let configuration = engine.configuration();
    assert_eq!(configuration.service_count(), 7);

    assert_eq!(configuration.service("broken").unwrap().operation_count(), 0);
    assert_eq!(configuration.service("empty").unwrap().operation_count(), 0);
    assert!(engine.wsdl("hello").unwrap().contains("HelloService"));

    let books = configuration.service("books").unwrap();
    assert_eq!(books.operation_at(0).unwrap().name(), "cancelRequest");
    assert_eq!(books.operation_at(1).unwrap().name(), "Reservation");
}

#[test]
fn test_wsdl_default_responses() {
    let engine = engine();

    let hello = engine.configuration().operation("hello", "sayHello").unwrap();
    let envelope = Element::parse(hello.default_response().body.as_text().unwrap()).unwrap();
    let greeting = envelope.find_path("Body/sayHelloResponse/greeting").unwrap();
    assert_eq!(greeting.text, "?");

    let reservation = engine.configuration().operation("books", "Reservation").unwrap();
    let envelope = Element::parse(reservation.default_response().body.as_text().unwrap()).unwrap();
    let response = envelope.find_path("Body/ReservationResponse").unwrap();
    assert_eq!(response.namespace.as_deref(), Some("http://example.com/books"));
    assert_eq!(response.child("Status").unwrap().text, "DefStatus");
    assert_eq!(response.child("BookingId").unwrap().text, "0");
    assert_eq!(response.child("Format").unwrap().text, "HARDCOVER");
    assert_eq!(response.find_path("Pickup/Date").unwrap().text, "2000-01-01");
}

#[tokio::test]
async fn test_soap_dispatch_by_body() {
    let engine = engine();
    let request = soap(r#"<b:Reservation xmlns:b="http://example.com/books"><b:Isbn>123</b:Isbn></b:Reservation>"#);
    let response = engine
        .dispatch_soap("books", InboundRequest::new().body(request))
        .await
        .unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.content_type, "text/xml");
    assert!(response.body.as_text().unwrap().contains("DefStatus"));

    let recorded = engine.recorded_bodies("books", "Reservation").await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(!recorded[0].starts_with("<?xml"));

    let unmatched = engine
        .dispatch_soap("books", InboundRequest::new().body(soap("<somethingElse/>")))
        .await
        .unwrap_err();
    assert_eq!(
        unmatched,
        MockError::OperationNotMatched {
            service: "books".to_string()
        }
    );
}

#[tokio::test]
async fn test_soap_dispatch_in_schema_namespace() {
    let engine = engine();
    let request = soap(r#"<b:Reservation xmlns:b="urn:books-types"><b:Isbn>123</b:Isbn></b:Reservation>"#);
    let response = engine
        .dispatch_soap("catalogue", InboundRequest::new().body(request))
        .await
        .unwrap();
    assert!(response.body.as_text().unwrap().contains("Reserved"));
    assert_eq!(engine.calls("catalogue", "Reservation").await.unwrap(), 1);

    // The definitions namespace is still accepted.
    let request = soap(r#"<w:Reservation xmlns:w="urn:books-wsdl"/>"#);
    assert_ok!(engine.dispatch_soap("catalogue", InboundRequest::new().body(request)).await);

    let request = soap(r#"<x:Reservation xmlns:x="urn:elsewhere"/>"#);
    assert_eq!(
        engine
            .dispatch_soap("catalogue", InboundRequest::new().body(request))
            .await
            .unwrap_err(),
        MockError::OperationNotMatched {
            service: "catalogue".to_string()
        }
    );
}

#[tokio::test]
async fn test_ticketing_scenario() {
    let engine = engine();
    assert_ok!(engine.init_mock("ticketing", "reserveRequest").await);
    engine
        .set_custom_response(
            "ticketing",
            "reserveRequest",
            5,
            MockResponse::text("<dummyResponse>abc123</dummyResponse>").code(200),
        )
        .await
        .unwrap();

    let mut bodies = Vec::new();
    for call in 1..=5 {
        let request = InboundRequest::new().body(format!("<reserveRequest>{}</reserveRequest>", call));
        let response = engine
            .dispatch("ticketing", "reserveRequest", request)
            .await
            .unwrap();
        bodies.push(response.body);
    }

    let default = ResponseBody::Text("<reserveResponse><status>RESERVED</status></reserveResponse>\n".to_string());
    assert!(bodies[..4].iter().all(|body| *body == default));
    assert_eq!(bodies[4].as_text(), Some("<dummyResponse>abc123</dummyResponse>"));

    let recorded = engine.recorded_bodies("ticketing", "reserveRequest").await.unwrap();
    assert_eq!(recorded[0], "<reserveRequest>1</reserveRequest>");
    assert_eq!(recorded.len(), 5);
}

#[tokio::test]
async fn test_rest_resource_paths() {
    let engine = engine();
    let response = engine
        .dispatch(
            "orders",
            "GET",
            InboundRequest::new()
                .resource_path("/id1/id2/id3")
                .query_string("msg=ABC"),
        )
        .await
        .unwrap();
    assert_eq!(response.content_type, "application/json");
    assert_eq!(response.body.as_text(), Some(r#"{"status":"ok"}"#));

    assert_eq!(
        engine.recorded_resource_paths("orders", "GET").await.unwrap(),
        vec![Some("id1/id2/id3".to_string())]
    );
    assert_err!(engine.recorded_resource_ids("orders", "GET").await);
}

#[test]
fn test_properties_format_matches_yaml() {
    let engine = MockEngine::from_file(&fixture("mock.properties")).unwrap();
    let configuration = engine.configuration();
    assert_eq!(configuration.service_count(), 3);
    assert_ok!(configuration.operation("hello", "sayHello"));

    let reserve = configuration.operation("ticketing", "reserveRequest").unwrap();
    assert!(reserve
        .default_response()
        .body
        .as_text()
        .unwrap()
        .contains("RESERVED"));
    assert!(configuration.service("orders").unwrap().resource_paths_enabled());
}

#[test]
fn test_missing_configuration_file() {
    assert!(MockEngine::from_file(&fixture("does-not-exist.yaml")).is_err());
}
