//! Hyperion API client
//!
//! [`HyperionClient`] owns the transport and the base URL and exposes one
//! method per service endpoint. Paginated endpoints return a [`ResultSet`];
//! the lookup endpoints return their rows directly.

use crate::config::ClientConfig;
use crate::engine::{PageFetcher, ProgressReporter, ResultSet};
use crate::error::Result;
use crate::http::{HttpClient, Transport, TransportRequest};
use crate::pagination::extract_rows;
use crate::payload::{Endpoint, FilterField, FilterSpec, Query};
use crate::types::JsonValue;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Client for the Hyperion analytics API
pub struct HyperionClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    fetcher: PageFetcher,
}

macro_rules! endpoint_query {
    ($(#[$doc:meta] $name:ident => $endpoint:ident),* $(,)?) => {
        $(
            #[$doc]
            pub async fn $name(&self, filter: &FilterSpec) -> Result<ResultSet> {
                self.query(Endpoint::$endpoint, filter).await
            }
        )*
    };
}

impl HyperionClient {
    /// Build a client with its own HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        if config.resolve_access_key().is_none() {
            warn!("No access key configured and $access_token is unset; requests will be rejected");
        }

        let transport: Arc<dyn Transport> = Arc::new(HttpClient::with_config(config.http_config())?);
        Self::with_transport(&config, transport)
    }

    /// Production defaults with the key taken from `$access_token`
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Build a client over an existing transport
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let base_url = config.base_url()?;
        info!("Hyperion client for {base_url} ({} mode)", config.fetch.mode);

        Ok(Self {
            fetcher: PageFetcher::new(Arc::clone(&transport), config.fetch_config()),
            transport,
            base_url,
        })
    }

    /// Report page progress to `progress` instead of the log
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.fetcher = self.fetcher.with_progress(progress);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch every page of `endpoint` matching `filter`
    ///
    /// The filter is checked against the endpoint before any request is
    /// sent.
    pub async fn query(&self, endpoint: Endpoint, filter: &FilterSpec) -> Result<ResultSet> {
        let query = Query::new(endpoint, filter)?;
        let url = query.endpoint().url(&self.base_url)?;
        debug!("Querying {endpoint} at {url}");
        self.fetcher.fetch_all(url.as_str(), query.filter()).await
    }

    endpoint_query! {
        /// Daily fracked feet
        daily_fracked_feet => DailyFrackedFeet,
        /// Long term production forecast
        long_term_forecast => LongTermForecast,
        /// Well completions
        well_completion => Completions,
        /// Drilled but uncompleted wells by operator
        ducs_by_operator => DucsByOperator,
        /// Frac crew activity
        frac_crews => FracCrews,
        /// Monthly production by well
        production_by_well => ProductionByWell,
        /// Rig activity
        rigs => Rigs,
        /// Well records
        wells => Wells,
        /// Short term production forecast
        short_term_forecast => ShortTermForecast,
        /// Past short term forecast runs
        short_term_forecast_history => ShortTermForecastHistory,
        /// Daily production
        daily_production => DailyProduction,
    }

    /// Region lookup table
    pub async fn fetch_regions(&self) -> Result<Vec<JsonValue>> {
        self.lookup(Endpoint::Regions).await
    }

    /// Operator classification lookup table
    pub async fn fetch_operator_classification(&self) -> Result<Vec<JsonValue>> {
        self.lookup(Endpoint::OperatorClassification).await
    }

    async fn lookup(&self, endpoint: Endpoint) -> Result<Vec<JsonValue>> {
        let url = endpoint.url(&self.base_url)?;
        let response = self.transport.send(TransportRequest::get(url.as_str())).await?;
        let rows = extract_rows(response.body)?;
        debug!("{endpoint}: {} rows", rows.len());
        Ok(rows)
    }

    /// Values of `field` that `target` can be filtered on
    pub async fn dropdown_selection(
        &self,
        target: Endpoint,
        field: FilterField,
    ) -> Result<Vec<JsonValue>> {
        let url = Endpoint::DropdownSelection.url(&self.base_url)?;
        let body = json!({
            "filter_type": field.name(),
            "target_function": target_function(target),
        });

        let response = self
            .transport
            .send(TransportRequest::post(url.as_str(), body))
            .await?;
        extract_rows(response.body)
    }

    /// `filter`, narrowed to every known value of the geographic `field`
    /// when it has no geographic restriction of its own
    ///
    /// A filter that is already restricted is returned unchanged without
    /// contacting the service.
    pub async fn with_implicit_filter(
        &self,
        target: Endpoint,
        filter: &FilterSpec,
        field: FilterField,
    ) -> Result<FilterSpec> {
        if filter.has_sufficient_filters() {
            return Ok(filter.clone());
        }

        let values: Vec<String> = self
            .dropdown_selection(target, field)
            .await?
            .into_iter()
            .filter_map(|row| match row {
                JsonValue::String(s) => Some(s),
                JsonValue::Object(mut obj) => match obj.remove(field.name()) {
                    Some(JsonValue::String(s)) => Some(s),
                    _ => None,
                },
                _ => None,
            })
            .collect();

        if values.is_empty() {
            warn!("No {field} values offered for {target}; leaving the filter as is");
            return Ok(filter.clone());
        }

        debug!("Restricting {target} query to {} {field} value(s)", values.len());
        filter.with_implicit_filter(field, values)
    }
}

/// Name the dropdown service uses for an endpoint (`ShortTermForecast`)
fn target_function(endpoint: Endpoint) -> String {
    endpoint
        .name()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FetchOutcome;
    use crate::error::Error;
    use crate::types::FetchMode;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> ClientConfig {
        let mut config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_access_key("test-key");
        config.http.max_retries = 0;
        config.fetch.mode = FetchMode::Sequential;
        config
    }

    fn page(start: u64, rows: u64, total: u64) -> serde_json::Value {
        let data: Vec<_> = (start..start + rows).map(|i| json!({"id": i})).collect();
        json!({
            "data": data,
            "pagination": {"total_count": total, "start": start, "page_size": 100}
        })
    }

    #[test]
    fn test_target_function_name() {
        assert_eq!(target_function(Endpoint::ShortTermForecast), "ShortTermForecast");
        assert_eq!(target_function(Endpoint::Rigs), "Rigs");
        assert_eq!(target_function(Endpoint::DucsByOperator), "DucsByOperator");
    }

    #[tokio::test]
    async fn test_query_walks_pages() {
        let server = MockServer::start().await;
        for start in [0, 100] {
            let rows = if start == 0 { 100 } else { 50 };
            Mock::given(method("POST"))
                .and(path("/v3/wells"))
                .and(header("access_key", "test-key"))
                .and(body_partial_json(json!({"pagination": {"start": start}})))
                .respond_with(ResponseTemplate::new(200).set_body_json(page(start, rows, 150)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let filter = FilterSpec::builder().state_code("TX").build().unwrap();
        let result = client.wells(&filter).await.unwrap();

        assert_eq!(result.len(), 150);
        assert_eq!(result.total_count(), 150);
        assert_eq!(result.outcome(), FetchOutcome::Complete);
        assert_eq!(result.rows()[149], json!({"id": 149}));
    }

    #[tokio::test]
    async fn test_query_rejects_unaccepted_filter_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let filter = FilterSpec::builder().rig_class("oil").build().unwrap();

        let err = client.wells(&filter).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFilter { .. }));

        let err = client
            .query(Endpoint::Regions, &FilterSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_query_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/rigs"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let result = client.rigs(&FilterSpec::default()).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(result.outcome(), FetchOutcome::Unauthorized);
    }

    #[tokio::test]
    async fn test_fetch_regions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/regions"))
            .and(header("access_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"region": "permian"}, {"region": "gulf"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let rows = client.fetch_regions().await.unwrap();
        assert_eq!(rows, vec![json!({"region": "permian"}), json!({"region": "gulf"})]);
    }

    #[tokio::test]
    async fn test_fetch_operator_classification_error_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/operatorclassification"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "maintenance"})),
            )
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let err = client.fetch_operator_classification().await.unwrap_err();
        assert!(matches!(err, Error::Api { ref message } if message == "maintenance"));
    }

    #[tokio::test]
    async fn test_dropdown_selection_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/exl_dropdownselection"))
            .and(body_json(json!({
                "filter_type": "sub_region",
                "target_function": "ShortTermForecast"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": ["Delaware", "Midland"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();
        let values = client
            .dropdown_selection(Endpoint::ShortTermForecast, FilterField::SubRegion)
            .await
            .unwrap();
        assert_eq!(values, vec![json!("Delaware"), json!("Midland")]);
    }

    #[tokio::test]
    async fn test_with_implicit_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/exl_dropdownselection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"sub_region": "Delaware"}, {"sub_region": "Midland"}, 7]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HyperionClient::new(test_config(&server)).unwrap();

        let broad = FilterSpec::builder().operator("ACME").build().unwrap();
        let narrowed = client
            .with_implicit_filter(Endpoint::Wells, &broad, FilterField::SubRegion)
            .await
            .unwrap();
        assert_eq!(
            narrowed.sub_region.as_ref().map(|list| list.values().to_vec()),
            Some(vec!["Delaware".to_string(), "Midland".to_string()])
        );
        assert_eq!(broad.sub_region, None);

        // already restricted: no second dropdown request
        let narrow = FilterSpec::builder().county("Reeves").build().unwrap();
        let unchanged = client
            .with_implicit_filter(Endpoint::Wells, &narrow, FilterField::SubRegion)
            .await
            .unwrap();
        assert_eq!(unchanged, narrow);
    }

    #[tokio::test]
    async fn test_base_url_with_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hyperion/v3/fraccrews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 3, 3)))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.base_url = format!("{}/hyperion", server.uri());
        let client = HyperionClient::new(config).unwrap();

        assert!(client.base_url().as_str().ends_with("/hyperion/"));
        let result = client.frac_crews(&FilterSpec::default()).await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig::default().with_base_url("::nope::");
        assert!(HyperionClient::new(config).is_err());
    }
}
