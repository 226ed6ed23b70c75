use order_fulfillment_api::health::health_check;

#[tokio::test]
async fn health_check_reports_ok() {
    let response = health_check().await;
    assert_eq!(response.0.status, "ok");
}
