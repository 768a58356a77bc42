use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::TelemetrySource;
use crate::{config::InfluxConfig, sample::RawSample, Error, FeedResult, FetchError};

/// InfluxDB 1.x HTTP query adapter.
///
/// Each flight is its own measurement, named `<measurement_prefix><flight>`, carrying `lat`,
/// `lon`, `altitude` (feet) and `track` (degrees) fields.
pub struct InfluxSource {
    client: reqwest::Client,
    endpoint: String,
    config: InfluxConfig,
}

impl InfluxSource {
    pub fn new(config: InfluxConfig) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Use a preconfigured HTTP client. `config.timeout` is ignored.
    pub fn with_client(config: InfluxConfig, client: reqwest::Client) -> Self {
        let endpoint = format!("{}/query", config.url.trim_end_matches('/'));
        Self {
            client,
            endpoint,
            config,
        }
    }
}

impl TelemetrySource for InfluxSource {
    async fn fetch_latest(&mut self, flight: &str) -> FeedResult<RawSample> {
        let query = latest_query(&self.config.measurement_prefix, flight);
        debug!("influx query: {}", query);

        let mut params = vec![("db", self.config.database.as_str()), ("q", query.as_str())];
        if let Some(user) = &self.config.username {
            params.push(("u", user.as_str()));
        }
        if let Some(password) = &self.config.password {
            params.push(("p", password.as_str()));
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::QueryFailed(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::QueryFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::QueryFailed(format!("HTTP {status}: {}", body.trim())).into());
        }
        trace!("influx response: {}", body);
        Ok(parse_latest(flight, &body)?)
    }
}

/// Build the "latest point" statement. Regex metacharacters in the prefix and flight name are
/// escaped so the name only matches itself literally.
pub fn latest_query(prefix: &str, flight: &str) -> String {
    format!(
        "SELECT lat, lon, altitude, track FROM /^{}{}/ ORDER BY time DESC LIMIT 1",
        regex_escape(prefix),
        regex_escape(flight)
    )
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Extract the single latest sample for `flight` from a `/query` response body.
pub fn parse_latest(flight: &str, body: &str) -> Result<RawSample, FetchError> {
    let resp: QueryResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::QueryFailed(format!("unreadable response: {e}")))?;
    if let Some(err) = resp.error {
        return Err(FetchError::QueryFailed(err));
    }
    let statement = resp
        .results
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::QueryFailed("response has no statement result".into()))?;
    if let Some(err) = statement.error {
        return Err(FetchError::QueryFailed(err));
    }

    let series = match statement.series.len() {
        0 => {
            return Err(FetchError::NotFound {
                flight: flight.to_string(),
            })
        }
        1 => &statement.series[0],
        n => {
            return Err(FetchError::Ambiguous {
                flight: flight.to_string(),
                series: n,
            })
        }
    };
    let row = series.values.first().ok_or_else(|| FetchError::NotFound {
        flight: flight.to_string(),
    })?;
    debug!("latest row from {}: {:?}", series.name, row);

    let field = |name: &str| -> Result<f64, FetchError> {
        let idx = series
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FetchError::MalformedRecord(format!("missing column {name}")))?;
        row.get(idx)
            .and_then(Value::as_f64)
            .ok_or_else(|| FetchError::MalformedRecord(format!("{name} is not a number")))
    };

    let time = series
        .columns
        .iter()
        .position(|c| c == "time")
        .and_then(|idx| row.get(idx))
        .and_then(Value::as_str)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(RawSample {
        time,
        latitude: field("lat")?,
        longitude: field("lon")?,
        altitude_ft: field("altitude")?,
        heading_deg: field("track")?,
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::lazy_init_tracing;

    const ONE_ROW: &str = r#"{"results":[{"statement_id":0,"series":[{"name":"flight.ROF123",
        "columns":["time","lat","lon","altitude","track"],
        "values":[["2015-06-11T20:46:02Z",47.6062,-122.3321,35000,270.0]]}]}]}"#;

    #[test]
    fn test_latest_query() {
        assert_eq!(
            latest_query("flight.", "ROF123"),
            "SELECT lat, lon, altitude, track FROM /^flight\\.ROF123/ ORDER BY time DESC LIMIT 1"
        );
        assert_eq!(
            latest_query("", "a/b(c)*"),
            "SELECT lat, lon, altitude, track FROM /^a\\/b\\(c\\)\\*/ ORDER BY time DESC LIMIT 1"
        );
    }

    #[test]
    fn test_parse_one_row() {
        lazy_init_tracing();
        let s = parse_latest("ROF123", ONE_ROW).unwrap();
        assert_eq!(s.latitude, 47.6062);
        assert_eq!(s.longitude, -122.3321);
        assert_eq!(s.altitude_ft, 35000.0);
        assert_eq!(s.heading_deg, 270.0);
        assert_eq!(
            s.time.unwrap(),
            DateTime::parse_from_rfc3339("2015-06-11T20:46:02Z").unwrap()
        );
    }

    #[test]
    fn test_parse_columns_by_name() {
        let body = r#"{"results":[{"series":[{"name":"flight.X",
            "columns":["track","altitude","lon","lat"],
            "values":[[90.5,1200.0,16.37,48.21]]}]}]}"#;
        let s = parse_latest("X", body).unwrap();
        assert_eq!(s.time, None);
        assert_eq!(s.latitude, 48.21);
        assert_eq!(s.longitude, 16.37);
        assert_eq!(s.altitude_ft, 1200.0);
        assert_eq!(s.heading_deg, 90.5);
    }

    #[test]
    fn test_parse_no_series() {
        let err = parse_latest("ROF999", r#"{"results":[{"statement_id":0}]}"#).unwrap_err();
        assert!(matches!(err, FetchError::NotFound { ref flight } if flight == "ROF999"));

        let empty = r#"{"results":[{"series":[{"name":"flight.ROF999",
            "columns":["time","lat","lon","altitude","track"],"values":[]}]}]}"#;
        let err = parse_latest("ROF999", empty).unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn test_parse_ambiguous() {
        let body = r#"{"results":[{"series":[
            {"name":"flight.ROF1","columns":["lat","lon","altitude","track"],"values":[[1,2,3,4]]},
            {"name":"flight.ROF12","columns":["lat","lon","altitude","track"],"values":[[1,2,3,4]]}
        ]}]}"#;
        let err = parse_latest("ROF1", body).unwrap_err();
        assert!(matches!(err, FetchError::Ambiguous { series: 2, .. }));
    }

    #[test]
    fn test_parse_malformed() {
        let null_alt = r#"{"results":[{"series":[{"name":"flight.A",
            "columns":["lat","lon","altitude","track"],"values":[[1.0,2.0,null,4.0]]}]}]}"#;
        assert!(matches!(
            parse_latest("A", null_alt),
            Err(FetchError::MalformedRecord(_))
        ));

        let text_lat = r#"{"results":[{"series":[{"name":"flight.A",
            "columns":["lat","lon","altitude","track"],"values":[["n/a",2.0,3.0,4.0]]}]}]}"#;
        assert!(matches!(
            parse_latest("A", text_lat),
            Err(FetchError::MalformedRecord(_))
        ));

        let no_track = r#"{"results":[{"series":[{"name":"flight.A",
            "columns":["lat","lon","altitude"],"values":[[1.0,2.0,3.0]]}]}]}"#;
        assert!(matches!(
            parse_latest("A", no_track),
            Err(FetchError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_parse_store_errors() {
        let stmt = r#"{"results":[{"statement_id":0,"error":"database not found: flightdata"}]}"#;
        assert!(matches!(
            parse_latest("A", stmt),
            Err(FetchError::QueryFailed(ref e)) if e.contains("database not found")
        ));
        assert!(matches!(
            parse_latest("A", r#"{"error":"authorization failed"}"#),
            Err(FetchError::QueryFailed(_))
        ));
        assert!(matches!(
            parse_latest("A", "<html>bad gateway</html>"),
            Err(FetchError::QueryFailed(_))
        ));
    }

    /// Serve a single canned HTTP response and hand back the request head.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client hung up");
                head.extend_from_slice(&buf[..n]);
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(resp.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (url, handle)
    }

    fn local_source(url: String) -> InfluxSource {
        let config = InfluxConfig {
            url,
            username: Some("pilot".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        // Loopback test server; keep any proxy from the environment out of the way.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        InfluxSource::with_client(config, client)
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        lazy_init_tracing();
        let (url, server) = serve_once("200 OK", ONE_ROW).await;
        let mut source = local_source(url);
        let s = source.fetch_latest("ROF123").await.unwrap();
        assert_eq!(s.altitude_ft, 35000.0);

        let head = server.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /query?"), "{}", request_line);
        assert!(request_line.contains("db=flightdata"), "{}", request_line);
        assert!(request_line.contains("u=pilot"), "{}", request_line);
        assert!(request_line.contains("p=hunter2"), "{}", request_line);
        assert!(request_line.contains("ROF123"), "{}", request_line);
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let (url, server) =
            serve_once("401 Unauthorized", r#"{"error":"authorization failed"}"#).await;
        let mut source = local_source(url);
        let err = source.fetch_latest("ROF123").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::QueryFailed(ref e)) if e.contains("401")));
        server.await.unwrap();
    }
}
