//! HTTPS GET through the ESP-IDF HTTP client.

use super::thingspeak::{HttpGet, HttpResponse};
use embedded_svc::http::client::Client;
use embedded_svc::http::Status;
use embedded_svc::io::Read;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use std::time::Duration;

const READ_CHUNK: usize = 256;
/// ThingSpeak answers are a handful of lines; anything larger is truncated.
const MAX_BODY: usize = 4096;

pub struct EspHttpGet {
    timeout: Duration,
}

impl EspHttpGet {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HttpGet for EspHttpGet {
    fn get(&mut self, url: &str) -> Result<HttpResponse, String> {
        // A fresh connection per request; the client handle is not `Send`.
        let config = Configuration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|e| format!("{:?}", e))?;
        let mut client = Client::wrap(connection);

        let request = client.get(url).map_err(|e| format!("{:?}", e))?;
        let mut response = request.submit().map_err(|e| format!("{:?}", e))?;
        let status = response.status();

        let mut body = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = response.read(&mut chunk).map_err(|e| format!("{:?}", e))?;
            if read == 0 || body.len() >= MAX_BODY {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
