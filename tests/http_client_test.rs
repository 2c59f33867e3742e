//! `HttpLabApi` against a stubbed laboratory API.

use std::time::Duration;

use assert_matches::assert_matches;
use labdesk::{
    client::{HttpLabApi, LabApi},
    errors::ServiceError,
    models::{Attachment, NewOrderParameter, NewQuotation, OrderForm, ParameterLine, ResultUpdate},
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::{
    matchers::{body_json, body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn client(server: &MockServer) -> HttpLabApi {
    HttpLabApi::new(&server.uri(), Duration::from_secs(5)).expect("client builds")
}

#[tokio::test]
async fn parameters_tolerate_loose_field_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parameter/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Water Tests", "parent_id": null, "price": "None", "unit": "" },
            { "id": 2, "name": "pH", "parent_id": 1, "price": "100", "unit": "null",
              "min_range": "6.5", "max_range": 8.5, "is_3025_method": "IS:3025 (Part 11)",
              "apha_24th_edition_method": "None" }
        ])))
        .mount(&server)
        .await;

    let parameters = client(&server).await.list_parameters().await.unwrap();

    assert_eq!(parameters.len(), 2);
    assert!(parameters[0].is_category());
    assert_eq!(parameters[0].unit, None);
    assert_eq!(parameters[1].price, Some(dec!(100)));
    assert_eq!(parameters[1].min_range, Some(6.5));
    assert_eq!(parameters[1].protocol_options(), vec!["IS:3025 (Part 11)"]);
}

#[tokio::test]
async fn missing_parameter_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parameter/p_id/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found" })))
        .mount(&server)
        .await;

    assert_eq!(client(&server).await.get_parameter(9).await.unwrap(), None);
}

#[tokio::test]
async fn single_record_endpoints_accept_a_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/order/order_id/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 4, "customer_id": 3, "order_number": "Ravi/01032024/ORDERNo3",
            "order_req_comment": "None", "order_req_doc": null, "status": "Quotation Check"
        }])))
        .mount(&server)
        .await;

    let order = client(&server).await.get_order(4).await.unwrap().unwrap();
    assert_eq!(order.customer_id, 3);
    assert_eq!(order.order_req_comment, None);
}

#[tokio::test]
async fn quotation_id_is_read_from_the_response() {
    let server = MockServer::start().await;
    let quotation = NewQuotation {
        customer_id: 3,
        order_id: 4,
        parameter_info: vec![ParameterLine {
            parameter_id: 2,
            name: "pH".into(),
            cost: dec!(100),
            quantity: 2,
        }],
    };
    Mock::given(method("POST"))
        .and(path("/quotations/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "quotation_id": 17 })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server).await.create_quotation(&quotation).await.unwrap();
    assert_eq!(id, 17);
}

#[tokio::test]
async fn new_order_parameters_are_posted_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/order_parameters/"))
        .and(body_json(json!({
            "quotation_id": 17,
            "parameter_id": 2,
            "cost": "100",
            "result": "None",
            "is_delete": false,
            "is_active": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "message": "created" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .create_order_parameter(&NewOrderParameter::pending(17, 2, dec!(100)))
        .await
        .unwrap();
}

#[tokio::test]
async fn order_is_sent_as_multipart_with_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/order/"))
        .and(body_string_contains("name=\"docfile\"; filename=\"request.txt\""))
        .and(body_string_contains("Ravi/01032024/ORDERNo3"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 8 })))
        .expect(1)
        .mount(&server)
        .await;

    let form = OrderForm {
        customer_id: 3,
        order_req_comment: None,
        status: "Quotation Check".into(),
        order_number: "Ravi/01032024/ORDERNo3".into(),
    };
    let document = Attachment::new("request.txt", b"pH and iron".to_vec()).unwrap();
    let order = client(&server)
        .await
        .create_order(&form, Some(&document))
        .await
        .unwrap();

    assert_eq!(order.id, 8);
    assert_eq!(order.order_req_doc.as_deref(), Some("request.txt"));
}

#[tokio::test]
async fn rejected_requests_keep_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/order_parameters/result/17/2"))
        .respond_with(ResponseTemplate::new(422).set_body_string("{\"detail\":\"bad result\"}"))
        .mount(&server)
        .await;

    let update = ResultUpdate {
        result: "7.1".into(),
        protocol_used: Some("IS:3025 (Part 11)".into()),
        home_protocol: None,
    };
    let err = client(&server)
        .await
        .update_result(17, 2, &update)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Api { status: 422, ref body } if body.contains("bad result"));
    assert!(err.is_remote());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let api = HttpLabApi::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let err = api.list_orders().await.unwrap_err();
    assert_matches!(err, ServiceError::Network(_));
}
