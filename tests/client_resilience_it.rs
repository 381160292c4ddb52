// crates.io
use httpmock::prelude::*;
// self
use cloudgate::{_preludet::*, store::MemoryTokenStore, token::TokenRecord};

async fn token_endpoint<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
	let body =
		format!("{{\"access_token\":\"{token}\",\"token_type\":\"bearer\",\"expires_in\":3600}}");

	server
		.mock_async(move |when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Store seeded with a record that is usable (outside the expiry buffer) but
/// will be rejected by the mock API, so 401 handling runs in isolation.
fn store_with_stale_token() -> Arc<MemoryTokenStore> {
	let store = Arc::new(MemoryTokenStore::default());
	let now = OffsetDateTime::now_utc();

	store.seed(
		TokenRecord::new("stale-token", now, now + Duration::hours(1))
			.expect("Seed record should build successfully."),
	);

	store
}

fn empty_store() -> Arc<MemoryTokenStore> {
	Arc::new(MemoryTokenStore::default())
}

#[tokio::test]
async fn rate_limit_budget_allows_exactly_four_attempts() {
	let server = MockServer::start_async().await;
	let _token = token_endpoint(&server, "fresh-token").await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/monitoring/devices");
			then.status(429).body("{\"error\":\"rate limit exceeded\"}");
		})
		.await;
	let client =
		build_test_client(&server.base_url(), &server.url("/oauth2/token"), empty_store()).await;
	let err = client
		.get("/monitoring/devices", &[])
		.await
		.expect_err("An unbroken run of 429s must exhaust the budget.");

	assert!(matches!(err, Error::RateLimit { attempts: 4 }));

	api.assert_calls_async(4).await;
}

#[tokio::test]
async fn first_401_forces_one_refresh_and_one_retry() {
	let server = MockServer::start_async().await;
	let token = token_endpoint(&server, "fresh-token").await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/monitoring/devices")
				.header("authorization", "Bearer stale-token");
			then.status(401).body("{\"error\":\"token expired\"}");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/monitoring/devices")
				.header("authorization", "Bearer fresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"devices\":[\"ap-1\"]}");
		})
		.await;
	let client = build_test_client(
		&server.base_url(),
		&server.url("/oauth2/token"),
		store_with_stale_token(),
	)
	.await;
	let value = client
		.get("/monitoring/devices", &[])
		.await
		.expect("The retried call should succeed with the fresh credential.");

	assert_eq!(value, serde_json::json!({ "devices": ["ap-1"] }));

	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn second_401_surfaces_auth_without_a_third_attempt() {
	let server = MockServer::start_async().await;
	let token = token_endpoint(&server, "fresh-token").await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/monitoring/devices");
			then.status(401).body("{\"error\":\"credential revoked\"}");
		})
		.await;
	let client = build_test_client(
		&server.base_url(),
		&server.url("/oauth2/token"),
		store_with_stale_token(),
	)
	.await;
	let err = client
		.get("/monitoring/devices", &[])
		.await
		.expect_err("Two consecutive 401s must surface an auth failure.");

	assert!(matches!(err, Error::Auth { .. }));

	api.assert_calls_async(2).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn empty_success_bodies_decode_as_an_empty_object() {
	let server = MockServer::start_async().await;
	let _token = token_endpoint(&server, "fresh-token").await;
	let _api = server
		.mock_async(|when, then| {
			when.method(POST).path("/configuration/wlans");
			then.status(200);
		})
		.await;
	let client =
		build_test_client(&server.base_url(), &server.url("/oauth2/token"), empty_store()).await;
	let value = client
		.post("/configuration/wlans", Some(&serde_json::json!({ "ssid": "lab" })))
		.await
		.expect("An empty 2xx body should decode successfully.");

	assert_eq!(value, serde_json::json!({}));
}

#[tokio::test]
async fn statuses_map_deterministically_to_the_taxonomy() {
	let server = MockServer::start_async().await;
	let _token = token_endpoint(&server, "fresh-token").await;
	let _not_found = server
		.mock_async(|when, then| {
			when.method(GET).path("/monitoring/devices/missing");
			then.status(404).body("{\"error\":\"no such device\"}");
		})
		.await;
	let _forbidden = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/configuration/roles/admin");
			then.status(403).body("{\"error\":\"role is protected\"}");
		})
		.await;
	let _bad_request = server
		.mock_async(|when, then| {
			when.method(POST).path("/configuration/scope-maps");
			then.status(400).body("{\"error\":\"bad scope-map definition\"}");
		})
		.await;
	let client =
		build_test_client(&server.base_url(), &server.url("/oauth2/token"), empty_store()).await;

	assert!(matches!(
		client.get("/monitoring/devices/missing", &[]).await,
		Err(Error::NotFound { .. }),
	));
	assert!(matches!(
		client.delete("/configuration/roles/admin").await,
		Err(Error::Forbidden { .. }),
	));

	// The upstream's own wording survives the mapping.
	let err = client
		.post("/configuration/scope-maps", Some(&serde_json::json!({})))
		.await
		.expect_err("A 400 must map to BadRequest.");

	assert!(matches!(err, Error::BadRequest { message } if message == "bad scope-map definition"));
}

#[tokio::test]
async fn cold_start_end_to_end_mints_then_proxies() {
	let server = MockServer::start_async().await;
	let token = token_endpoint(&server, "minted-token").await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/resource").header("authorization", "Bearer minted-token");
			then.status(200).header("content-type", "application/json").body("{\"items\":[]}");
		})
		.await;
	let client =
		build_test_client(&server.base_url(), &server.url("/oauth2/token"), empty_store()).await;
	let value =
		client.get("/resource", &[]).await.expect("The cold-start read should succeed end to end.");

	assert_eq!(value, serde_json::json!({ "items": [] }));

	token.assert_calls_async(1).await;
	api.assert_calls_async(1).await;
}

#[tokio::test]
async fn query_parameters_reach_the_upstream() {
	let server = MockServer::start_async().await;
	let _token = token_endpoint(&server, "fresh-token").await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/monitoring/devices")
				.query_param("limit", "20")
				.query_param("offset", "40");
			then.status(200).header("content-type", "application/json").body("{\"devices\":[]}");
		})
		.await;
	let client =
		build_test_client(&server.base_url(), &server.url("/oauth2/token"), empty_store()).await;

	client
		.get("/monitoring/devices", &[("limit", "20"), ("offset", "40")])
		.await
		.expect("The filtered read should succeed.");

	api.assert_calls_async(1).await;
}
