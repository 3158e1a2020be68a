use std::time::Duration;

use async_trait::async_trait;
use marmita_core::shipping::{DistanceLookup, DistanceQuote, LookupError, PostalCode};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const METERS_PER_KM: i64 = 1_000;

#[derive(Debug, Deserialize)]
struct PostalAddress {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

impl PostalAddress {
    /// `Av. Paulista - Bela Vista, São Paulo/SP`
    fn display(&self) -> String {
        let street = [self.logradouro.as_str(), self.bairro.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" - ");
        let city = match (self.localidade.is_empty(), self.uf.is_empty()) {
            (false, false) => format!("{}/{}", self.localidade, self.uf),
            (false, true) => self.localidade.clone(),
            _ => String::new(),
        };
        [street, city].into_iter().filter(|part| !part.is_empty()).collect::<Vec<_>>().join(", ")
    }
}

/// ViaCEP answers unknown codes with `200 {"erro": true}` (or `"true"`).
fn parse_postal_address(
    postal_code: &PostalCode,
    body: &Value,
) -> Result<PostalAddress, LookupError> {
    let flagged = match body.get("erro") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        _ => false,
    };
    if flagged {
        return Err(LookupError::NotFound(postal_code.formatted()));
    }
    PostalAddress::deserialize(body)
        .map_err(|error| LookupError::Provider(format!("unexpected postal lookup body: {error}")))
}

/// Reads the first element of a distance matrix response, in kilometers with one decimal.
fn parse_distance_km(body: &Value) -> Result<Decimal, LookupError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "OK" {
        return Err(LookupError::Provider(format!("distance matrix status `{status}`")));
    }
    let element = body
        .pointer("/rows/0/elements/0")
        .ok_or_else(|| LookupError::Provider("distance matrix has no elements".to_owned()))?;
    let element_status = element.get("status").and_then(Value::as_str).unwrap_or_default();
    if element_status != "OK" {
        return Err(LookupError::Provider(format!("distance element status `{element_status}`")));
    }
    let meters = element
        .pointer("/distance/value")
        .and_then(Value::as_i64)
        .ok_or_else(|| LookupError::Provider("distance element has no value".to_owned()))?;

    Ok((Decimal::from(meters) / Decimal::from(METERS_PER_KM)).round_dp(1))
}

/// Postal code to street address through ViaCEP, then driving distance from
/// the kitchen through a distance matrix API.
pub struct ViaCepDistanceLookup {
    client: Client,
    postal_lookup_url: String,
    distance_url: String,
    api_key: Option<SecretString>,
    origin: String,
}

impl ViaCepDistanceLookup {
    pub fn new(
        postal_lookup_url: impl Into<String>,
        distance_url: impl Into<String>,
        api_key: Option<SecretString>,
        origin: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            postal_lookup_url: postal_lookup_url.into(),
            distance_url: distance_url.into(),
            api_key,
            origin: origin.into(),
        })
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> Result<Value, LookupError> {
        let response =
            request.send().await.map_err(|error| LookupError::Provider(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Provider(format!("provider answered {status}")));
        }
        response.json::<Value>().await.map_err(|error| LookupError::Provider(error.to_string()))
    }
}

#[async_trait]
impl DistanceLookup for ViaCepDistanceLookup {
    async fn lookup(&self, postal_code: &PostalCode) -> Result<DistanceQuote, LookupError> {
        let url = format!(
            "{}/{}/json/",
            self.postal_lookup_url.trim_end_matches('/'),
            postal_code.as_str()
        );
        let body = self.get_json(self.client.get(url)).await?;
        let address = parse_postal_address(postal_code, &body)?;
        let resolved_address = address.display();

        let Some(api_key) = &self.api_key else {
            return Err(LookupError::Provider("distance api key is not configured".to_owned()));
        };
        let destination = format!("{}, {}", postal_code.formatted(), resolved_address);
        let body = self
            .get_json(self.client.get(&self.distance_url).query(&[
                ("origins", self.origin.as_str()),
                ("destinations", destination.as_str()),
                ("units", "metric"),
                ("mode", "driving"),
                ("key", api_key.expose_secret()),
            ]))
            .await?;
        let distance_km = parse_distance_km(&body)?;

        debug!(
            event_name = "egress.shipping.distance_resolved",
            postal_code = %postal_code,
            distance_km = %distance_km,
            "distance resolved"
        );
        Ok(DistanceQuote { distance_km, resolved_address })
    }
}

#[cfg(test)]
mod tests {
    use marmita_core::shipping::{LookupError, PostalCode};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{parse_distance_km, parse_postal_address};

    fn cep() -> PostalCode {
        PostalCode::parse("01310-100").expect("postal code")
    }

    #[test]
    fn postal_lookup_body_becomes_a_display_address() {
        let address = parse_postal_address(
            &cep(),
            &json!({
                "cep": "01310-100",
                "logradouro": "Avenida Paulista",
                "bairro": "Bela Vista",
                "localidade": "São Paulo",
                "uf": "SP"
            }),
        )
        .expect("address");

        assert_eq!(address.display(), "Avenida Paulista - Bela Vista, São Paulo/SP");
    }

    #[test]
    fn flagged_postal_codes_are_not_found() {
        for body in [json!({"erro": true}), json!({"erro": "true"})] {
            assert_eq!(
                parse_postal_address(&cep(), &body).err(),
                Some(LookupError::NotFound("01310-100".to_owned()))
            );
        }
    }

    #[test]
    fn distance_is_rounded_to_one_decimal_km() {
        let body = json!({
            "status": "OK",
            "rows": [{"elements": [{"status": "OK", "distance": {"value": 4_237, "text": "4.2 km"}}]}]
        });

        assert_eq!(parse_distance_km(&body), Ok(Decimal::new(42, 1)));
    }

    #[test]
    fn distance_failures_are_provider_errors() {
        let denied = json!({"status": "REQUEST_DENIED", "rows": []});
        let no_route = json!({"status": "OK", "rows": [{"elements": [{"status": "ZERO_RESULTS"}]}]});

        assert!(matches!(parse_distance_km(&denied), Err(LookupError::Provider(_))));
        assert!(matches!(parse_distance_km(&no_route), Err(LookupError::Provider(_))));
    }
}
