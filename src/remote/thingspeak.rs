//! ThingSpeak channel protocol: command read from the control channel's last
//! entry, telemetry and alerts written through the `/update` endpoint.
//!
//! URL building and response parsing are transport independent; the HTTP GET
//! itself sits behind [`HttpGet`] so the ESP32 client and test doubles can
//! share the same protocol code.

use super::{CommandFetchError, CommandSource, Publish, PublishError};
use crate::system::config::ThingSpeakConfig;
use crate::types::{AlertRecord, RemoteCommand, TelemetryRecord};
use log::{debug, warn};
use std::fmt::Write;

/// Columns before the first field in a `feeds/last.csv` row: `created_at`
/// and `entry_id`.
const FIELD_OFFSET: usize = 2;
const MIN_HEADER_COLUMNS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A single blocking HTTP GET. Errors are transport failures only; any
/// received status code is a successful response.
pub trait HttpGet: Send {
    fn get(&mut self, url: &str) -> Result<HttpResponse, String>;
}

pub fn command_url(config: &ThingSpeakConfig) -> String {
    format!(
        "{}/channels/{}/feeds/last.csv?api_key={}&results=1",
        config.base_url, config.control_channel_id, config.control_read_key
    )
}

pub fn telemetry_url(config: &ThingSpeakConfig, record: &TelemetryRecord) -> String {
    let mut url = format!(
        "{}/update?api_key={}&field1={:.2}&field2={}&field3={}&field4={}&field5={}&field6={}&field7={}&field8={:.2}",
        config.base_url,
        config.data_write_key,
        record.temperature,
        flag(record.heater_on),
        flag(record.jets),
        flag(record.light),
        flag(record.cold_blower),
        flag(record.hot_blower),
        query_escape(&record.status_message),
        record.heat_rate,
    );
    if let Some(reason) = &record.tripped {
        let _ = write!(url, "&status={}", query_escape(&format!("TRIPPED: {}", reason)));
    }
    url
}

pub fn alert_url(config: &ThingSpeakConfig, record: &AlertRecord) -> String {
    format!(
        "{}/update?api_key={}&field1={}",
        config.base_url,
        config.alert_write_key,
        query_escape(&record.message)
    )
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

/// Form-style query escaping: unreserved characters pass through, space
/// becomes `+`, everything else is percent-encoded per UTF-8 byte.
pub fn query_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Splits one CSV record, honouring double-quoted fields and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parses a `feeds/last.csv` body: a header of at least eight columns and
/// exactly one data row whose fields 1..=5 carry the command.
pub fn parse_commands(body: &str) -> Result<RemoteCommand, CommandFetchError> {
    let records: Vec<Vec<String>> = body
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(split_record)
        .collect();

    if records.len() != 2 || records[0].len() < MIN_HEADER_COLUMNS {
        return Err(CommandFetchError::Malformed(format!(
            "expected header of {}+ columns and one row, got {:?}",
            MIN_HEADER_COLUMNS, body
        )));
    }
    let row = &records[1];
    let field = |n: usize| -> Result<&str, CommandFetchError> {
        row.get(FIELD_OFFSET + n - 1)
            .map(|value| value.trim())
            .ok_or_else(|| CommandFetchError::Malformed(format!("row has no field{}", n)))
    };
    let boolean = |n: usize| -> Result<bool, CommandFetchError> {
        let raw = field(n)?;
        parse_flag(raw)
            .ok_or_else(|| CommandFetchError::Malformed(format!("field{}: bad flag {:?}", n, raw)))
    };

    let raw_target = field(1)?;
    let target_temperature = raw_target.parse::<f32>().map_err(|_| {
        CommandFetchError::Malformed(format!("field1: bad temperature {:?}", raw_target))
    })?;

    Ok(RemoteCommand {
        target_temperature,
        jets: boolean(2)?,
        light: boolean(3)?,
        cold_blower: boolean(4)?,
        hot_blower: boolean(5)?,
    })
}

fn publish_status(response: &HttpResponse) -> Result<(), PublishError> {
    match response.status {
        429 => Err(PublishError::RateLimited),
        200..=299 if response.body.trim() == "0" => Err(PublishError::Rejected),
        200..=299 => Ok(()),
        code => Err(PublishError::Status(code)),
    }
}

/// ThingSpeak endpoints over an injected HTTP transport.
pub struct ThingSpeakClient<H> {
    config: ThingSpeakConfig,
    http: H,
}

impl<H: HttpGet> ThingSpeakClient<H> {
    pub fn new(config: ThingSpeakConfig, http: H) -> Self {
        Self { config, http }
    }

    fn update(&mut self, url: &str) -> Result<(), PublishError> {
        let response = self.http.get(url).map_err(PublishError::Transport)?;
        debug!("Update returned {} ({} bytes)", response.status, response.body.len());
        publish_status(&response)
    }
}

impl<H: HttpGet> CommandSource for ThingSpeakClient<H> {
    fn fetch_commands(&mut self) -> Result<RemoteCommand, CommandFetchError> {
        let url = command_url(&self.config);
        let response = self.http.get(&url).map_err(CommandFetchError::Transport)?;
        match response.status {
            200..=299 => parse_commands(&response.body),
            429 => {
                warn!("ThingSpeak rate limit exceeded on command read");
                Err(CommandFetchError::RateLimited)
            }
            code => Err(CommandFetchError::Status(code)),
        }
    }
}

impl<H: HttpGet> Publish<TelemetryRecord> for ThingSpeakClient<H> {
    fn publish(&mut self, record: &TelemetryRecord) -> Result<(), PublishError> {
        let url = telemetry_url(&self.config, record);
        self.update(&url)
    }
}

impl<H: HttpGet> Publish<AlertRecord> for ThingSpeakClient<H> {
    fn publish(&mut self, record: &AlertRecord) -> Result<(), PublishError> {
        let url = alert_url(&self.config, record);
        self.update(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const LAST_CSV: &str = "created_at,entry_id,field1,field2,field3,field4,field5,field6\n\
        2024-01-06 18:20:01 UTC,4213,101.5,1,0,false,True,\n";

    struct ScriptedHttp {
        responses: VecDeque<Result<HttpResponse, String>>,
        requested: Vec<String>,
    }

    impl ScriptedHttp {
        fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
            Self {
                responses: responses.into(),
                requested: Vec::new(),
            }
        }
    }

    impl HttpGet for ScriptedHttp {
        fn get(&mut self, url: &str) -> Result<HttpResponse, String> {
            self.requested.push(url.to_string());
            self.responses.pop_front().unwrap()
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn config() -> ThingSpeakConfig {
        ThingSpeakConfig {
            base_url: "https://api.thingspeak.com".to_string(),
            control_channel_id: "390551".to_string(),
            control_read_key: "READ".to_string(),
            data_write_key: "DATA".to_string(),
            alert_write_key: "ALERT".to_string(),
        }
    }

    fn telemetry(tripped: Option<&str>) -> TelemetryRecord {
        TelemetryRecord {
            temperature: 101.456,
            heater_on: true,
            jets: false,
            light: true,
            cold_blower: false,
            hot_blower: false,
            status_message: "Heating normally".to_string(),
            heat_rate: 6.0,
            tripped: tripped.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_last_csv() {
        let command = parse_commands(LAST_CSV).unwrap();
        assert_eq!(
            command,
            RemoteCommand {
                target_temperature: 101.5,
                jets: true,
                light: false,
                cold_blower: false,
                hot_blower: true,
            }
        );
    }

    #[test]
    fn test_parse_rejects_narrow_header() {
        let body = "created_at,entry_id,field1\n2024,1,100\n";
        assert!(matches!(parse_commands(body), Err(CommandFetchError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_wrong_row_count() {
        let header_only = "created_at,entry_id,field1,field2,field3,field4,field5,field6\n";
        assert!(matches!(parse_commands(header_only), Err(CommandFetchError::Malformed(_))));
        assert!(matches!(parse_commands(""), Err(CommandFetchError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let bad_flag = "created_at,entry_id,field1,field2,field3,field4,field5,field6\n\
            x,1,101.5,yes,0,0,0,\n";
        assert!(matches!(parse_commands(bad_flag), Err(CommandFetchError::Malformed(_))));
        let bad_target = "created_at,entry_id,field1,field2,field3,field4,field5,field6\n\
            x,1,,0,0,0,0,\n";
        assert!(matches!(parse_commands(bad_target), Err(CommandFetchError::Malformed(_))));
        let short_row = "created_at,entry_id,field1,field2,field3,field4,field5,field6\n\
            x,1,101.5,0\n";
        assert!(matches!(parse_commands(short_row), Err(CommandFetchError::Malformed(_))));
    }

    #[test]
    fn test_parse_quoted_fields() {
        let body = "\"created_at\",entry_id,field1,field2,field3,field4,field5,field6\r\n\
            \"2024-01-06, 18:20\",7,\"99.0\",0,1,0,0,\"say \"\"hi\"\"\"\r\n";
        let command = parse_commands(body).unwrap();
        assert_eq!(command.target_temperature, 99.0);
        assert!(command.light);
    }

    #[test]
    fn test_query_escape() {
        assert_eq!(query_escape("Heating normally"), "Heating+normally");
        assert_eq!(
            query_escape("Temperature exceeds limit (103.50)"),
            "Temperature+exceeds+limit+%28103.50%29"
        );
        assert_eq!(query_escape("a/b?c=d&e"), "a%2Fb%3Fc%3Dd%26e");
        assert_eq!(query_escape("°"), "%C2%B0");
    }

    #[test]
    fn test_command_url() {
        assert_eq!(
            command_url(&config()),
            "https://api.thingspeak.com/channels/390551/feeds/last.csv?api_key=READ&results=1"
        );
    }

    #[test]
    fn test_telemetry_url() {
        assert_eq!(
            telemetry_url(&config(), &telemetry(None)),
            "https://api.thingspeak.com/update?api_key=DATA&field1=101.46&field2=1&field3=0\
             &field4=1&field5=0&field6=0&field7=Heating+normally&field8=6.00"
        );
    }

    #[test]
    fn test_telemetry_url_carries_trip_status() {
        let url = telemetry_url(&config(), &telemetry(Some("Heat rate exceeds 9deg/hr")));
        assert!(url.ends_with("&status=TRIPPED%3A+Heat+rate+exceeds+9deg%2Fhr"));
    }

    #[test]
    fn test_alert_url() {
        let url = alert_url(&config(), &AlertRecord::new("Cooling too fast"));
        assert_eq!(
            url,
            "https://api.thingspeak.com/update?api_key=ALERT&field1=Cooling+too+fast"
        );
    }

    #[test]
    fn test_fetch_maps_status_codes() {
        let http = ScriptedHttp::new(vec![
            ok(LAST_CSV),
            Ok(HttpResponse {
                status: 429,
                body: String::new(),
            }),
            Ok(HttpResponse {
                status: 500,
                body: String::new(),
            }),
            Err("connection reset".to_string()),
        ]);
        let mut client = ThingSpeakClient::new(config(), http);
        assert!(client.fetch_commands().is_ok());
        assert_eq!(client.fetch_commands(), Err(CommandFetchError::RateLimited));
        assert_eq!(client.fetch_commands(), Err(CommandFetchError::Status(500)));
        assert_eq!(
            client.fetch_commands(),
            Err(CommandFetchError::Transport("connection reset".to_string()))
        );
        assert_eq!(client.http.requested.len(), 4);
    }

    #[test]
    fn test_publish_rejected_entry() {
        let http = ScriptedHttp::new(vec![ok("4214"), ok("0")]);
        let mut client = ThingSpeakClient::new(config(), http);
        assert_eq!(client.publish(&telemetry(None)), Ok(()));
        assert_eq!(
            client.publish(&AlertRecord::new("Heating too slowly")),
            Err(PublishError::Rejected)
        );
        assert!(client.http.requested[1].contains("api_key=ALERT"));
    }
}
